use crate::bus::{EngineEvent, EventBus};
use crate::dashboard::{DashboardSnapshot, FileSnapshotSink, OverallHealth, PerformanceSummary, SnapshotSink, MAX_SNAPSHOT_ALERTS};
use crate::error::{EngineError, Result};
use crate::registry::{MonitoredSystem, SystemRegistry};
use crate::report::{write_report, MonitoringReport, ReportStatistics};
use crate::responder::{execute_procedures, EmergencyResponder, LoggingResponder};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use watchtower_config::{validate, CollectorKind, MonitorConfig, SystemConfig};
use watchtower_logging::{Logger, TracingLogger};
use watchtower_metrics::{
    Alert, AlertEngine, AlertEvent, AlertLevel, CollectError, Collector, EmergencyDetector, EmergencyEvent,
    EmergencyPolicy, EngineTelemetry, HealthNotice, HealthPolicy, HealthScorer, HostCollector, HttpCollector,
    LifecyclePolicy, MetricBatch, ThresholdRule,
};
use watchtower_notify::{
    build_notifiers, Dispatcher, DrainReport, NotificationQueue, NotificationTask, Notifier, Priority, TaskKind,
};
use watchtower_shutdown::InflightTracker;
use watchtower_timeseries::{
    ArchiveStats, CleanupStats, DataArchiver, MetricKey, MetricSample, MetricStore, RecentWindow, RollupPolicy,
    StorePolicy,
};

/// 一次成功采集的处理结果
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub system_id: String,
    pub accepted: usize,
    pub rejected: usize,
    pub recovered: bool,
    pub health_score: u8,
    pub alert_events: Vec<AlertEvent>,
    pub health: Option<HealthNotice>,
    pub emergency: Option<EmergencyEvent>,
}

/// 一次失败采集的处理结果
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub system_id: String,
    pub consecutive_errors: u32,
    pub health_score: u8,
    pub health: Option<HealthNotice>,

    /// 进入错误状态时的通知，每次转换只有一次
    pub error_notice: Option<HealthNotice>,
}

#[derive(Debug, Clone)]
pub enum CollectionOutcome {
    Collected(IngestReport),
    Failed(FailureReport),
    /// 关闭过程中不再发起新的采集
    Cancelled,
}

/// 周期巡检结果
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub events: Vec<AlertEvent>,
    pub emergency: Option<EmergencyEvent>,
    pub cleanup: CleanupStats,
}

/// 监控引擎上下文
///
/// 每个组件各自持有一把锁，只在同步修改期间持有，不跨越 I/O 与其他组件锁的等待。
/// 组件之间通过读出的副本传递数据；锁的获取顺序为
/// registry → store → alerts → emergency → health → queue。
pub struct Engine {
    config: MonitorConfig,
    registry: RwLock<SystemRegistry>,
    store: RwLock<MetricStore>,
    alerts: RwLock<AlertEngine>,
    emergency: Mutex<EmergencyDetector>,
    health: Mutex<HealthScorer>,
    queue: Mutex<NotificationQueue>,
    collectors: HashMap<String, Arc<dyn Collector>>,
    dispatcher: Dispatcher,
    archiver: DataArchiver,
    sink: Arc<dyn SnapshotSink>,
    responder: Arc<dyn EmergencyResponder>,
    logger: Arc<dyn Logger>,
    telemetry: EngineTelemetry,
    bus: EventBus,
    inflight: InflightTracker,
    started_at: DateTime<Utc>,
}

impl Engine {
    pub fn builder(config: MonitorConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn telemetry(&self) -> &EngineTelemetry {
        &self.telemetry
    }

    pub fn inflight(&self) -> &InflightTracker {
        &self.inflight
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 参与轮询的系统及其间隔
    pub async fn pollable_systems(&self) -> Vec<(String, Duration)> {
        self.registry
            .read()
            .await
            .list()
            .into_iter()
            .filter(|s| s.pollable)
            .map(|s| (s.id, Duration::from_secs(s.interval_secs)))
            .collect()
    }

    pub async fn system(&self, id: &str) -> Option<MonitoredSystem> {
        self.registry.read().await.get(id).cloned()
    }

    pub async fn systems(&self) -> Vec<MonitoredSystem> {
        self.registry.read().await.list()
    }

    pub async fn health_score(&self, system_id: &str) -> u8 {
        self.health.lock().await.score(system_id)
    }

    pub async fn recent_window(&self, key: &MetricKey, now: DateTime<Utc>) -> RecentWindow {
        let window = ChronoDuration::seconds(self.config.engine.recent_window_secs as i64);
        self.store.read().await.recent_window(key, window, now)
    }

    pub async fn alert(&self, id: &str) -> Option<Alert> {
        self.alerts.read().await.get(id).cloned()
    }

    pub async fn open_alert_for(&self, key: &MetricKey) -> Option<Alert> {
        self.alerts.read().await.open_alert_for(key).cloned()
    }

    pub async fn active_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.read().await.active_alerts(limit)
    }

    pub async fn queued_tasks(&self) -> Vec<NotificationTask> {
        self.queue.lock().await.iter().cloned().collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn emergencies_raised(&self) -> u64 {
        self.emergency.lock().await.total_raised()
    }

    /// 调用系统的采集器并处理结果
    ///
    /// 采集失败或超时只影响该系统自身的错误计数。
    pub async fn collect_system(&self, system_id: &str) -> Result<CollectionOutcome> {
        let collector = self
            .collectors
            .get(system_id)
            .cloned()
            .ok_or_else(|| EngineError::NoCollector(system_id.to_string()))?;

        let Some(_guard) = self.inflight.acquire(system_id) else {
            return Ok(CollectionOutcome::Cancelled);
        };

        let timeout = Duration::from_secs(self.config.engine.collector_timeout_secs);
        let result = match tokio::time::timeout(timeout, collector.collect(system_id)).await {
            Ok(result) => result,
            Err(_) => Err(CollectError::Timeout(timeout)),
        };

        let now = Utc::now();
        match result {
            Ok(batch) => Ok(CollectionOutcome::Collected(self.ingest(system_id, &batch, now).await?)),
            Err(e) => {
                let report = self.record_collection_failure(system_id, &e.to_string(), now).await?;
                Ok(CollectionOutcome::Failed(report))
            }
        }
    }

    /// 对所有可轮询系统执行一轮采集
    pub async fn collect_all(&self) -> Vec<(String, Result<CollectionOutcome>)> {
        let mut outcomes = Vec::new();
        for (system_id, _) in self.pollable_systems().await {
            let outcome = self.collect_system(&system_id).await;
            outcomes.push((system_id, outcome));
        }
        outcomes
    }

    /// 处理一批成功采集的指标
    pub async fn ingest(&self, system_id: &str, batch: &MetricBatch, now: DateTime<Utc>) -> Result<IngestReport> {
        let recovered = self.registry.write().await.record_success(system_id, now)?;

        let mut metrics: Vec<(&String, &f64)> = batch.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));

        let mut accepted = Vec::with_capacity(metrics.len());
        let mut rejected = 0;
        {
            let mut store = self.store.write().await;
            for (metric, value) in metrics {
                let sample = MetricSample::new(system_id, metric.as_str(), *value).with_timestamp(now);
                let previous = store.latest(&sample.key()).map(|s| s.value);

                match store.append(sample.clone(), now) {
                    Ok(()) => {
                        if let Some(previous) = previous {
                            self.note_significant_change(&sample, previous);
                        }
                        accepted.push(sample);
                    }
                    Err(e) => {
                        rejected += 1;
                        warn!(system_id = %system_id, metric = %metric, error = %e, "Sample rejected");
                    }
                }
            }
        }

        let mut alert_events = Vec::new();
        let open_alerts = {
            let mut alerts = self.alerts.write().await;
            for sample in &accepted {
                match alerts.evaluate(sample) {
                    Ok(Some(event)) => alert_events.push(event),
                    Ok(None) => {}
                    Err(e) => warn!(key = %sample.key(), error = %e, "Threshold evaluation failed"),
                }
            }

            let new_critical = alert_events
                .iter()
                .any(|e| matches!(e, AlertEvent::Triggered(a) if a.level == AlertLevel::Critical));
            new_critical.then(|| alerts.open_alerts().into_iter().cloned().collect::<Vec<Alert>>())
        };
        let emergency = match open_alerts {
            Some(open_alerts) => self.emergency.lock().await.check(&open_alerts, now),
            None => None,
        };

        let metrics: HashMap<String, f64> = accepted
            .iter()
            .map(|s| (s.metric_name.clone(), s.value))
            .collect();
        let (health, health_score) = {
            let mut scorer = self.health.lock().await;
            let notice = scorer.apply_success(system_id, &metrics, now);
            (notice, scorer.score(system_id))
        };
        self.registry.write().await.set_health(system_id, health_score)?;

        self.enqueue_alert_events(&alert_events).await?;
        if let Some(event) = &emergency {
            self.enqueue_emergency(event).await?;
        }

        self.telemetry.record_samples(system_id, accepted.len());
        self.telemetry.set_health(system_id, health_score);
        debug!(system_id = %system_id, accepted = accepted.len(), rejected, "Metrics ingested");

        if recovered {
            self.logger.info(&format!("System {} recovered", system_id));
            self.bus.publish(EngineEvent::SystemRecovered {
                system_id: system_id.to_string(),
                timestamp: now,
            });
        }
        self.bus.publish(EngineEvent::MetricsCollected {
            system_id: system_id.to_string(),
            count: accepted.len(),
            timestamp: now,
        });
        self.publish_alert_events(&alert_events);
        if let Some(notice) = &health {
            self.bus.publish(EngineEvent::Health(notice.clone()));
        }
        if let Some(event) = &emergency {
            self.raise_emergency(event).await;
        }

        Ok(IngestReport {
            system_id: system_id.to_string(),
            accepted: accepted.len(),
            rejected,
            recovered,
            health_score,
            alert_events,
            health,
            emergency,
        })
    }

    /// 登记一次采集失败
    pub async fn record_collection_failure(
        &self,
        system_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<FailureReport> {
        let outcome = self.registry.write().await.record_failure(system_id, error, now)?;
        self.telemetry.record_collection_error(system_id);
        warn!(
            system_id = %system_id,
            consecutive_errors = outcome.consecutive_errors,
            error = %error,
            "Metric collection failed"
        );

        let (health, health_score) = {
            let mut scorer = self.health.lock().await;
            let notice = scorer.apply_failure(system_id, outcome.consecutive_errors, error, now);
            (notice, scorer.score(system_id))
        };
        self.registry.write().await.set_health(system_id, health_score)?;
        self.telemetry.set_health(system_id, health_score);

        if let Some(notice) = &health {
            self.bus.publish(EngineEvent::Health(notice.clone()));
        }

        let error_notice = outcome
            .entered_error
            .then(|| HealthNotice::collection_failed(system_id, health_score, error, now));
        if let Some(notice) = &error_notice {
            self.logger.error(&format!(
                "System {} marked as error after {} consecutive failures: {}",
                system_id, outcome.consecutive_errors, error
            ));
            self.bus.publish(EngineEvent::Health(notice.clone()));
            self.bus.publish(EngineEvent::SystemFailed {
                system_id: system_id.to_string(),
                consecutive_errors: outcome.consecutive_errors,
                error: error.to_string(),
                timestamp: now,
            });
        }

        Ok(FailureReport {
            system_id: system_id.to_string(),
            consecutive_errors: outcome.consecutive_errors,
            health_score,
            health,
            error_notice,
        })
    }

    /// 记录一次因上次采集未结束而跳过的调度
    pub async fn record_skipped_tick(&self, system_id: &str) -> Result<u64> {
        let skipped = self.registry.write().await.record_skip(system_id)?;
        self.telemetry.record_skipped_tick(system_id);
        debug!(system_id = %system_id, skipped, "Previous collection still running, tick skipped");
        Ok(skipped)
    }

    /// 周期巡检：自动恢复、升级、紧急检测与存储清理
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let latest: HashMap<MetricKey, f64> = {
            let store = self.store.read().await;
            store
                .keys()
                .into_iter()
                .filter_map(|key| store.latest(&key).map(|s| (key, s.value)))
                .collect()
        };
        let (events, open_alerts) = {
            let mut alerts = self.alerts.write().await;
            let events = alerts.sweep(|key| latest.get(key).copied(), now);
            let open_alerts: Vec<Alert> = alerts.open_alerts().into_iter().cloned().collect();
            (events, open_alerts)
        };
        let emergency = self.emergency.lock().await.check(&open_alerts, now);
        let cleanup = self.store.write().await.cleanup(now);

        self.enqueue_alert_events(&events).await?;
        if let Some(event) = &emergency {
            self.enqueue_emergency(event).await?;
        }

        self.publish_alert_events(&events);
        if let Some(event) = &emergency {
            self.raise_emergency(event).await;
        }

        debug!(events = events.len(), deleted_points = cleanup.deleted_points, "Sweep completed");
        Ok(SweepReport {
            events,
            emergency,
            cleanup,
        })
    }

    /// 确认告警；已确认时返回 None
    pub async fn acknowledge(&self, id: &str, now: DateTime<Utc>) -> Result<Option<AlertEvent>> {
        let event = self.alerts.write().await.acknowledge(id, now)?;
        if let Some(event) = &event {
            info!(alert_id = %id, "Alert acknowledged");
            self.bus.publish(EngineEvent::Alert(event.clone()));
        }
        Ok(event)
    }

    /// 手动恢复告警
    pub async fn resolve(&self, id: &str, reason: &str, now: DateTime<Utc>) -> Result<AlertEvent> {
        let event = self.alerts.write().await.resolve(id, reason, now)?;
        info!(alert_id = %id, reason = %reason, "Alert resolved");

        self.enqueue_alert_events(std::slice::from_ref(&event)).await?;
        self.publish_alert_events(std::slice::from_ref(&event));
        Ok(event)
    }

    /// 直接提交一条通知任务
    pub async fn enqueue_notification(&self, task: NotificationTask) {
        let mut queue = self.queue.lock().await;
        queue.enqueue(task);
        self.telemetry.set_queue_depth(queue.len());
    }

    /// 出队一批通知并投递
    pub async fn dispatch_notifications(&self) -> DrainReport {
        let Some(_guard) = self.inflight.acquire("notifications") else {
            return DrainReport::default();
        };

        let report = self
            .dispatcher
            .drain(&self.queue, self.config.notifications.batch_size)
            .await;

        for delivery in &report.deliveries {
            self.telemetry.record_delivery(delivery.channel.as_str(), delivery.success);
        }
        for dead in &report.dead_letters {
            self.telemetry.record_dead_letter();
            self.bus.publish(EngineEvent::DeadLetter(dead.clone()));
        }
        self.telemetry.set_queue_depth(report.remaining);

        if report.processed > 0 {
            debug!(
                processed = report.processed,
                delivered = report.delivered,
                retried = report.retried,
                dead_letters = report.dead_letters.len(),
                "Notification cycle completed"
            );
        }
        report
    }

    /// 计算并归档一个聚合时间桶；窗口内没有数据时不写文件
    pub async fn aggregate(&self, interval_secs: u64, now: DateTime<Utc>) -> Result<Option<ArchiveStats>> {
        let bucket = self.store.read().await.rollup(RollupPolicy::new(interval_secs), now);
        if bucket.is_empty() {
            debug!(interval = interval_secs, "No samples in aggregation window");
            return Ok(None);
        }

        let stats = self.archiver.archive(&bucket).await?;
        self.bus.publish(EngineEvent::Aggregated {
            interval: interval_secs,
            keys: stats.archived_keys,
            timestamp: now,
        });
        Ok(Some(stats))
    }

    /// 构建仪表盘快照，只读
    pub async fn snapshot(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        let systems = self.registry.read().await.list();
        let window = ChronoDuration::seconds(self.config.engine.recent_window_secs as i64);
        let (metrics, performance) = {
            let store = self.store.read().await;
            (store.recent_summary(window, now), PerformanceSummary::from_store(&store, &self.config.performance))
        };
        let (alerts, open, critical) = {
            let alerts = self.alerts.read().await;
            (
                alerts.active_alerts(MAX_SNAPSHOT_ALERTS),
                alerts.open_count(),
                alerts.critical_open_count(),
            )
        };

        let scores: Vec<u8> = systems.iter().map(|s| s.health_score).collect();
        DashboardSnapshot {
            timestamp: now,
            health: OverallHealth::compute(&scores, open, critical),
            systems,
            metrics,
            alerts,
            performance,
        }
    }

    /// 构建并写出快照，同时写出 Prometheus 指标
    pub async fn publish_snapshot(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
        let snapshot = self.snapshot(now).await;
        self.sink.persist(&snapshot).await?;

        let exposition = self
            .telemetry
            .export()
            .map_err(|e| EngineError::Telemetry(e.to_string()))?;
        self.sink.write_exposition(&exposition).await?;
        Ok(snapshot)
    }

    pub async fn generate_report(&self, now: DateTime<Utc>) -> MonitoringReport {
        let snapshot = self.snapshot(now).await;
        let (metrics_count, active_alerts) = {
            let store = self.store.read().await;
            let alerts = self.alerts.read().await;
            (store.total_points(), alerts.open_count())
        };
        let emergencies = self.emergency.lock().await.total_raised();
        let notifications_queued = self.queue.lock().await.len();

        MonitoringReport {
            title: format!("{} Report", self.config.engine.name),
            generated_at: now,
            summary: snapshot.health,
            statistics: ReportStatistics {
                systems_count: snapshot.systems.len(),
                metrics_count,
                active_alerts,
                notifications_queued,
                emergencies,
                dead_letters: self.telemetry.dead_letters(),
                uptime_secs: (now - self.started_at).num_seconds(),
            },
            systems: snapshot.systems,
            recent_metrics: snapshot.metrics,
            active_alerts: snapshot.alerts,
            performance: snapshot.performance,
        }
    }

    pub async fn write_report(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let report = self.generate_report(now).await;
        write_report(&self.config.paths.reports_dir, &report).await
    }

    fn note_significant_change(&self, sample: &MetricSample, previous: f64) {
        if previous == 0.0 {
            return;
        }
        let ratio = (sample.value - previous).abs() / previous.abs();
        if ratio > self.config.engine.significant_change_ratio {
            self.logger.info(&format!(
                "Significant change in {}: {:.2} -> {:.2} ({:.0}%)",
                sample.key(),
                previous,
                sample.value,
                ratio * 100.0
            ));
        }
    }

    async fn enqueue_alert_events(&self, events: &[AlertEvent]) -> Result<()> {
        let mut tasks = Vec::new();
        for event in events {
            let (kind, priority) = match event {
                AlertEvent::Triggered(alert) if alert.level == AlertLevel::Critical => (TaskKind::Alert, Priority::High),
                AlertEvent::Triggered(_) => (TaskKind::Alert, Priority::Normal),
                AlertEvent::Resolved(_) => (TaskKind::AlertResolved, Priority::Low),
                AlertEvent::Escalated(_) => (TaskKind::AlertEscalated, Priority::High),
                AlertEvent::Acknowledged(_) => continue,
            };
            tasks.push(NotificationTask::new(kind, priority, serde_json::to_value(event.alert())?));
        }

        if tasks.is_empty() {
            return Ok(());
        }
        let mut queue = self.queue.lock().await;
        for task in tasks {
            queue.enqueue(task);
        }
        self.telemetry.set_queue_depth(queue.len());
        Ok(())
    }

    async fn enqueue_emergency(&self, event: &EmergencyEvent) -> Result<()> {
        let task = NotificationTask::new(TaskKind::Emergency, Priority::High, serde_json::to_value(event)?);
        let mut queue = self.queue.lock().await;
        queue.enqueue_front(task);
        self.telemetry.set_queue_depth(queue.len());
        Ok(())
    }

    fn publish_alert_events(&self, events: &[AlertEvent]) {
        for event in events {
            if let AlertEvent::Triggered(alert) = event {
                self.telemetry.record_alert(alert.level.as_str());
                self.logger.warning(&alert.message);
            }
            self.bus.publish(EngineEvent::Alert(event.clone()));
        }
    }

    async fn raise_emergency(&self, event: &EmergencyEvent) {
        self.telemetry.record_emergency(event.kind.as_str());
        self.logger.error(&format!(
            "Emergency {} detected with {} correlated alerts",
            event.kind.as_str(),
            event.alert_ids.len()
        ));
        self.bus.publish(EngineEvent::Emergency(event.clone()));
        execute_procedures(
            self.responder.as_ref(),
            event,
            self.config.emergency.maintenance_threshold,
        )
        .await;
    }
}

/// 引擎构建器
///
/// 未显式注入的采集器按系统配置创建：`host` 使用本机采集器，`http` 需要配置端点。
pub struct EngineBuilder {
    config: MonitorConfig,
    collectors: HashMap<String, Arc<dyn Collector>>,
    notifiers: Option<Vec<Arc<dyn Notifier>>>,
    sink: Option<Arc<dyn SnapshotSink>>,
    responder: Option<Arc<dyn EmergencyResponder>>,
    logger: Option<Arc<dyn Logger>>,
    inflight: Option<InflightTracker>,
    bus: Option<EventBus>,
}

impl EngineBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            collectors: HashMap::new(),
            notifiers: None,
            sink: None,
            responder: None,
            logger: None,
            inflight: None,
            bus: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn with_collector(mut self, system_id: impl Into<String>, collector: Arc<dyn Collector>) -> Self {
        self.collectors.insert(system_id.into(), collector);
        self
    }

    pub fn with_notifiers(mut self, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        self.notifiers = Some(notifiers);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_responder(mut self, responder: Arc<dyn EmergencyResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_inflight_tracker(mut self, tracker: InflightTracker) -> Self {
        self.inflight = Some(tracker);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(mut self) -> Result<Engine> {
        validate(&self.config).map_err(|e| EngineError::Config(e.to_string()))?;
        let config = self.config;
        let engine_config = &config.engine;
        let collector_timeout = Duration::from_secs(engine_config.collector_timeout_secs);

        let mut registry = SystemRegistry::new(engine_config.max_consecutive_errors);
        let mut collectors = HashMap::new();
        for system_config in &config.systems {
            let collector = match self.collectors.remove(&system_config.id) {
                Some(collector) => Some(collector),
                None => default_collector(system_config, collector_timeout)?,
            };

            let mut system = MonitoredSystem::from_config(system_config);
            system.pollable = collector.is_some();
            if let Some(collector) = collector {
                collectors.insert(system_config.id.clone(), collector);
            } else {
                warn!(system_id = %system_config.id, "No collector endpoint configured, polling disabled");
            }
            registry.register(system);
        }
        for system_id in self.collectors.keys() {
            warn!(system_id = %system_id, "Collector supplied for unknown system, ignored");
        }

        let store = MetricStore::new(StorePolicy {
            retention: ChronoDuration::days(engine_config.retention_days as i64),
            max_points_per_series: engine_config.max_points_per_series,
        });

        let mut alerts = AlertEngine::new(LifecyclePolicy {
            grace_period: ChronoDuration::seconds(engine_config.grace_period_secs as i64),
            escalation_timeout: ChronoDuration::seconds(engine_config.escalation_timeout_secs as i64),
            max_history: engine_config.max_alert_history,
        });
        for threshold in &config.thresholds {
            let mut rule = ThresholdRule::new(threshold.metric.clone(), threshold.warning);
            if let Some(critical) = threshold.critical {
                rule = rule.with_critical(critical);
            }
            alerts.add_rule(rule);
        }

        let emergency = EmergencyDetector::new(EmergencyPolicy {
            window: ChronoDuration::seconds(config.emergency.window_secs as i64),
            min_critical: config.emergency.min_critical_alerts,
            min_core: config.emergency.min_core_alerts,
            core_metrics: config.emergency.core_metrics.clone(),
            ..Default::default()
        });

        let notifiers = match self.notifiers {
            Some(notifiers) => notifiers,
            None => build_notifiers(&config.notifications.channels())?,
        };
        let dispatcher = Dispatcher::new(notifiers);
        info!(channels = ?dispatcher.channels(), "Notification channels ready");

        let telemetry = EngineTelemetry::new().map_err(|e| EngineError::Telemetry(e.to_string()))?;
        let sink: Arc<dyn SnapshotSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(FileSnapshotSink::new(config.paths.dashboard_dir.clone())),
        };
        let logger: Arc<dyn Logger> = match self.logger {
            Some(logger) => logger,
            None => Arc::new(TracingLogger::new(config.engine.name.clone())),
        };
        let responder: Arc<dyn EmergencyResponder> = match self.responder {
            Some(responder) => responder,
            None => Arc::new(LoggingResponder::new(logger.clone())),
        };

        Ok(Engine {
            registry: RwLock::new(registry),
            store: RwLock::new(store),
            alerts: RwLock::new(alerts),
            emergency: Mutex::new(emergency),
            health: Mutex::new(HealthScorer::new(HealthPolicy::default())),
            queue: Mutex::new(NotificationQueue::new(config.notifications.max_retries)),
            collectors,
            dispatcher,
            archiver: DataArchiver::new(config.paths.archive_dir.clone()),
            sink,
            responder,
            logger,
            telemetry,
            bus: self.bus.unwrap_or_default(),
            inflight: self.inflight.unwrap_or_default(),
            started_at: Utc::now(),
            config,
        })
    }
}

fn default_collector(system: &SystemConfig, timeout: Duration) -> Result<Option<Arc<dyn Collector>>> {
    let collector: Arc<dyn Collector> = match system.collector {
        CollectorKind::Host => Arc::new(HostCollector::new()),
        CollectorKind::Http => match system.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Arc::new(
                HttpCollector::new(endpoint, timeout)
                    .map_err(|e| EngineError::Config(format!("system {}: {}", system.id, e)))?,
            ),
            _ => return Ok(None),
        },
    };
    Ok(Some(collector))
}
