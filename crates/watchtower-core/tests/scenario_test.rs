
use chrono::{Duration, Utc};
use std::sync::Arc;
use test_helpers::{batch, build_engine, test_config, RecordingNotifier};
use watchtower_core::EngineError;
use watchtower_metrics::{AlertError, AlertEvent, AlertLevel, EmergencyKind};
use watchtower_notify::{NotificationTask, Notifier, NotifyChannel, Priority, TaskKind};
use watchtower_timeseries::{DataArchiver, MetricKey};

fn cpu() -> MetricKey {
    MetricKey::new("performance", "cpu_usage")
}

/// 警告级别告警生成 normal 优先级通知
#[tokio::test]
async fn test_warning_breach_creates_single_alert() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let now = Utc::now();

    let report = engine
        .ingest("performance", &batch(&[("cpu_usage", 85.0)]), now)
        .await
        .unwrap();

    assert_eq!(report.alert_events.len(), 1);
    let alert = report.alert_events[0].alert().clone();
    assert_eq!(alert.level, AlertLevel::Warning);
    assert_eq!(alert.context.threshold, 80.0);
    assert_eq!(alert.context.value, 85.0);

    let tasks = engine.queued_tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Alert);
    assert_eq!(tasks[0].priority, Priority::Normal);
}

/// 严重告警生成 high 通知；窗口内多个严重告警只产生一次紧急事件
#[tokio::test]
async fn test_critical_breaches_raise_one_emergency() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let t0 = Utc::now();

    let first = engine
        .ingest("performance", &batch(&[("cpu_usage", 97.0)]), t0)
        .await
        .unwrap();
    assert_eq!(first.alert_events[0].alert().level, AlertLevel::Critical);
    assert!(first.emergency.is_none());
    assert_eq!(engine.queued_tasks().await[0].priority, Priority::High);

    let second = engine
        .ingest("application", &batch(&[("response_time", 6000.0)]), t0 + Duration::seconds(30))
        .await
        .unwrap();
    let emergency = second.emergency.expect("two core critical alerts");
    assert_eq!(emergency.kind, EmergencyKind::SystemFailure);
    assert_eq!(emergency.alert_ids.len(), 2);

    let third = engine
        .ingest("performance", &batch(&[("memory_usage", 97.0)]), t0 + Duration::seconds(60))
        .await
        .unwrap();
    assert!(third.emergency.is_none());

    let sweep = engine.sweep(t0 + Duration::seconds(90)).await.unwrap();
    assert!(sweep.emergency.is_none());
    assert_eq!(engine.emergencies_raised().await, 1);

    let tasks = engine.queued_tasks().await;
    let emergencies: Vec<&NotificationTask> = tasks.iter().filter(|t| t.kind == TaskKind::Emergency).collect();
    assert_eq!(emergencies.len(), 1);
    assert_eq!(emergencies[0].priority, Priority::High);
    assert_eq!(tasks[0].kind, TaskKind::Emergency);
}

/// 最新采样回落且超过宽限期后自动恢复
#[tokio::test]
async fn test_auto_resolve_after_grace_period() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let t0 = Utc::now();

    let report = engine
        .ingest("performance", &batch(&[("cpu_usage", 85.0)]), t0)
        .await
        .unwrap();
    let alert_id = report.alert_events[0].alert().id.clone();

    engine
        .ingest("performance", &batch(&[("cpu_usage", 50.0)]), t0 + Duration::seconds(60))
        .await
        .unwrap();
    let early = engine.sweep(t0 + Duration::seconds(60)).await.unwrap();
    assert!(early.events.is_empty());
    assert!(engine.open_alert_for(&cpu()).await.is_some());

    let sweep = engine.sweep(t0 + Duration::seconds(130)).await.unwrap();
    assert_eq!(sweep.events.len(), 1);
    assert!(matches!(sweep.events[0], AlertEvent::Resolved(_)));

    let alert = engine.alert(&alert_id).await.unwrap();
    assert!(alert.resolved);
    assert_eq!(alert.resolved_reason.as_deref(), Some("auto-resolved"));

    let resolved: Vec<NotificationTask> = engine
        .queued_tasks()
        .await
        .into_iter()
        .filter(|t| t.kind == TaskKind::AlertResolved)
        .collect();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].priority, Priority::Low);
}

/// 未确认的严重告警只升级一次
#[tokio::test]
async fn test_escalation_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let t0 = Utc::now();

    let report = engine
        .ingest("performance", &batch(&[("cpu_usage", 97.0)]), t0)
        .await
        .unwrap();
    let alert_id = report.alert_events[0].alert().id.clone();

    assert!(engine.sweep(t0 + Duration::seconds(200)).await.unwrap().events.is_empty());

    let sweep = engine.sweep(t0 + Duration::seconds(301)).await.unwrap();
    assert_eq!(sweep.events.len(), 1);
    assert!(matches!(sweep.events[0], AlertEvent::Escalated(_)));

    for offset in [400, 500, 900] {
        let sweep = engine.sweep(t0 + Duration::seconds(offset)).await.unwrap();
        assert!(sweep.events.is_empty());
    }

    assert!(engine.alert(&alert_id).await.unwrap().escalated);
    let escalations = engine
        .queued_tasks()
        .await
        .iter()
        .filter(|t| t.kind == TaskKind::AlertEscalated)
        .count();
    assert_eq!(escalations, 1);
}

/// 确认只抑制升级通知
#[tokio::test]
async fn test_acknowledged_alert_is_not_escalated() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let t0 = Utc::now();

    let report = engine
        .ingest("performance", &batch(&[("cpu_usage", 97.0)]), t0)
        .await
        .unwrap();
    let alert_id = report.alert_events[0].alert().id.clone();

    assert!(engine.acknowledge(&alert_id, t0).await.unwrap().is_some());
    assert!(engine.acknowledge(&alert_id, t0).await.unwrap().is_none());

    let sweep = engine.sweep(t0 + Duration::seconds(600)).await.unwrap();
    assert!(sweep.events.is_empty());
    assert!(!engine.alert(&alert_id).await.unwrap().escalated);
}

/// 重复手动恢复返回错误且不再通知
#[tokio::test]
async fn test_manual_resolve_twice_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(test_config(temp_dir.path()), Vec::new());
    let now = Utc::now();

    let report = engine
        .ingest("application", &batch(&[("error_rate", 7.0)]), now)
        .await
        .unwrap();
    let alert_id = report.alert_events[0].alert().id.clone();

    engine.resolve(&alert_id, "fixed by deploy", now).await.unwrap();
    let queued = engine.queue_len().await;

    let err = engine.resolve(&alert_id, "again", now).await.unwrap_err();
    assert!(matches!(err, EngineError::Alert(AlertError::AlreadyResolved(_))));
    assert_eq!(engine.queue_len().await, queued);

    assert!(matches!(
        engine.resolve("alert_missing", "x", now).await,
        Err(EngineError::Alert(AlertError::NotFound(_)))
    ));
}

/// 每轮最多 10 个任务，高优先级与普通优先级先于低优先级投递
#[tokio::test]
async fn test_dispatch_respects_priority_tiers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let slack = RecordingNotifier::new(NotifyChannel::Slack, false);
    let engine = build_engine(test_config(temp_dir.path()), vec![slack.clone() as Arc<dyn Notifier>]);

    for _ in 0..5 {
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            engine
                .enqueue_notification(NotificationTask::new(TaskKind::Alert, priority, serde_json::json!({})))
                .await;
        }
    }

    let first = engine.dispatch_notifications().await;
    assert_eq!(first.processed, 10);
    assert_eq!(first.delivered, 10);
    let sent = slack.sent();
    assert_eq!(sent.iter().filter(|t| t.priority == Priority::High).count(), 5);
    assert_eq!(sent.iter().filter(|t| t.priority == Priority::Normal).count(), 5);
    assert!(sent.iter().all(|t| t.priority != Priority::Low));

    let second = engine.dispatch_notifications().await;
    assert_eq!(second.processed, 5);
    assert!(slack.sent()[10..].iter().all(|t| t.priority == Priority::Low));
    assert_eq!(engine.queue_len().await, 0);
}

/// 聚合桶统计并归档
#[tokio::test]
async fn test_five_minute_aggregation_archive() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let archive_dir = config.paths.archive_dir.clone();
    let engine = build_engine(config, Vec::new());
    let t0 = Utc::now();

    for (offset, value) in [(240, 10.0), (120, 20.0), (10, 30.0)] {
        engine
            .ingest("performance", &batch(&[("cpu_usage", value)]), t0 - Duration::seconds(offset))
            .await
            .unwrap();
    }

    let stats = engine.aggregate(300, t0).await.unwrap().expect("bucket written");
    assert_eq!(stats.archived_keys, 1);
    assert!(stats.path.starts_with(archive_dir.join("300s")));

    let record = DataArchiver::new(&archive_dir).restore_from_file(&stats.path).await.unwrap();
    let cpu_stats = record.data["performance.cpu_usage"];
    assert_eq!(cpu_stats.count, 3);
    assert_eq!(cpu_stats.avg, 20.0);
    assert_eq!(cpu_stats.min, 10.0);
    assert_eq!(cpu_stats.max, 30.0);
    assert_eq!(cpu_stats.median, 20.0);

    assert!(engine.aggregate(300, t0 + Duration::days(1)).await.unwrap().is_none());
}
