
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{batch, test_config, FakeCollector};
use watchtower_config::{CollectorKind, SystemConfig};
use watchtower_core::{CollectionOutcome, Engine, EventJournal, ReportFlushHook, SnapshotFlushHook};
use watchtower_logging::{EventLog, LogStream};
use watchtower_shutdown::{FlushManager, InflightTracker, ShutdownCoordinator, ShutdownSignal, SignalHandler};

/// 排空期间完成的采集照常写入事件日志，随后落盘最终快照与报告
#[tokio::test]
async fn test_events_during_drain_are_journaled_before_final_flush() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.systems = vec![SystemConfig::new(
        "performance",
        "Performance",
        60,
        &["cpu_usage"],
        CollectorKind::Http,
    )];
    let log_dir = config.logging.directory.clone();
    let dashboard_dir = config.paths.dashboard_dir.clone();
    let reports_dir = config.paths.reports_dir.clone();

    let inflight = InflightTracker::new();
    let collector = Arc::new(
        FakeCollector::new(batch(&[("cpu_usage", 97.0)])).with_delay(Duration::from_millis(300)),
    );
    let engine = Arc::new(
        Engine::builder(config)
            .with_notifiers(Vec::new())
            .with_collector("performance", collector.clone())
            .with_inflight_tracker(inflight.clone())
            .build()
            .unwrap(),
    );

    let journal = EventJournal::new(EventLog::new(&log_dir)).spawn(engine.bus().subscribe());

    let collecting_engine = engine.clone();
    let collection = tokio::spawn(async move { collecting_engine.collect_system("performance").await });
    while collector.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut flush = FlushManager::new();
    flush.register(Arc::new(SnapshotFlushHook::new(engine.clone())));
    flush.register(Arc::new(ReportFlushHook::new(engine.clone())));
    let (signals, _rx) = SignalHandler::new();
    let report = ShutdownCoordinator::builder()
        .with_signal_handler(signals)
        .with_inflight_tracker(inflight)
        .with_flush_manager(flush)
        .with_drain_timeout(Duration::from_secs(5))
        .build()
        .shutdown(ShutdownSignal::Manual)
        .await;

    assert!(report.drained);
    assert_eq!(report.flush.succeeded, vec!["dashboard-snapshot", "monitoring-report"]);
    assert!(matches!(collection.await.unwrap().unwrap(), CollectionOutcome::Collected(_)));

    journal.close().await.unwrap();

    let alerts = EventLog::new(&log_dir).read_stream(LogStream::Alerts).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["event"], "alert_triggered");

    let snapshot: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dashboard_dir.join("current_dashboard.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot["alerts"].as_array().unwrap().len(), 1);

    let reports: Vec<_> = std::fs::read_dir(&reports_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("monitoring_report_"))
        .collect();
    assert_eq!(reports.len(), 1);
}

/// 关闭开始后不再发起新的采集
#[tokio::test]
async fn test_collection_cancelled_after_shutdown_started() {
    let temp_dir = tempfile::tempdir().unwrap();
    let inflight = InflightTracker::new();
    let collector = Arc::new(FakeCollector::new(batch(&[("cpu_usage", 30.0)])));
    let engine = Engine::builder(test_config(temp_dir.path()))
        .with_notifiers(Vec::new())
        .with_collector("performance", collector.clone())
        .with_inflight_tracker(inflight.clone())
        .build()
        .unwrap();

    inflight.start_shutdown();
    let outcome = engine.collect_system("performance").await.unwrap();
    assert!(matches!(outcome, CollectionOutcome::Cancelled));
    assert_eq!(collector.calls(), 0);
}
