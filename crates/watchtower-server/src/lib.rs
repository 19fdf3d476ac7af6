use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use watchtower_config::{ConfigLoader, MonitorConfig};
use watchtower_core::{
    CollectionOutcome, Engine, EngineBuilder, EventJournal, JournalHandle, ReportFlushHook, Scheduler, SnapshotFlushHook,
};
use watchtower_logging::{EventLog, LogEntry, LogLevel, LogStream};
use watchtower_shutdown::{
    FlushManager, InflightTracker, ShutdownCoordinator, ShutdownReport, ShutdownSignal, SignalHandler,
};

/// 进程级共享状态
pub struct AppState {
    pub engine: Arc<Engine>,
    pub signals: SignalHandler,
    pub inflight: InflightTracker,
    pub event_log: EventLog,
}

/// 单轮运行的结果
#[derive(Debug, Clone)]
pub struct OnceSummary {
    pub collected: usize,
    pub failed: usize,
    pub alerts: usize,
    pub report_path: PathBuf,
}

/// 加载配置：内置默认值 → 可选 TOML 文件 → `WATCHTOWER__` 环境变量
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader.load()
}

impl AppState {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        Self::from_builder(Engine::builder(config))
    }

    /// 使用预先配置好的引擎构建器，例如注入自定义采集器
    pub fn from_builder(builder: EngineBuilder) -> Result<Self> {
        let (signals, _rx) = SignalHandler::new();
        let inflight = InflightTracker::new();
        let event_log = EventLog::new(builder.config().logging.directory.clone());

        let engine = builder
            .with_inflight_tracker(inflight.clone())
            .build()
            .context("failed to build monitoring engine")?;

        Ok(Self {
            engine: Arc::new(engine),
            signals,
            inflight,
            event_log,
        })
    }

    /// 启动事件日志订阅任务，由调用方在最终落盘之后关闭
    pub fn spawn_journal(&self) -> JournalHandle {
        EventJournal::new(self.event_log.clone()).spawn(self.engine.bus().subscribe())
    }

    /// panic 时同步写入 errors.log 并触发关闭
    pub fn install_panic_hook(&self) {
        let event_log = self.event_log.clone();
        let signals = self.signals.clone();
        let default_hook = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let entry = LogEntry::new(LogLevel::Error, "fatal_error")
                .with_field("error", serde_json::Value::String(info.to_string()));
            if let Err(e) = event_log.append_blocking(LogStream::Errors, &entry) {
                eprintln!("failed to record fatal error: {}", e);
            }
            signals.trigger(ShutdownSignal::Fatal);
            default_hook(info);
        }));
    }

    /// 采集一轮、巡检、投递通知，写出快照与报告后返回
    pub async fn run_once(&self) -> Result<OnceSummary> {
        let journal = self.spawn_journal();

        let mut collected = 0;
        let mut failed = 0;
        let mut alerts = 0;
        for (system_id, outcome) in self.engine.collect_all().await {
            match outcome {
                Ok(CollectionOutcome::Collected(report)) => {
                    collected += 1;
                    alerts += report.alert_events.len();
                }
                Ok(CollectionOutcome::Failed(_)) => failed += 1,
                Ok(CollectionOutcome::Cancelled) => {}
                Err(e) => {
                    failed += 1;
                    error!(system_id = %system_id, error = %e, "Collection handling failed");
                }
            }
        }

        let now = Utc::now();
        self.engine.sweep(now).await?;
        self.engine.dispatch_notifications().await;
        self.engine.publish_snapshot(now).await?;
        let report_path = self.engine.write_report(now).await?;

        self.signals.trigger(ShutdownSignal::Manual);
        if let Err(e) = journal.close().await {
            warn!(error = %e, "Event journal task failed");
        }

        info!(collected, failed, alerts, "Single monitoring round complete");
        Ok(OnceSummary {
            collected,
            failed,
            alerts,
            report_path,
        })
    }

    /// 启动所有定时任务，直到收到关闭信号
    pub async fn run(self) -> Result<ShutdownReport> {
        let journal = self.spawn_journal();
        let scheduler = Scheduler::new(self.engine.clone(), self.signals.clone());
        let tasks = scheduler.spawn().await;
        info!(tasks = tasks.len(), "Monitoring engine started");

        let signals = self.signals.clone();
        tokio::spawn(async move {
            if let Err(e) = signals.wait_for_system_signal().await {
                error!(error = %e, "Failed to listen for system signals");
                signals.trigger(ShutdownSignal::Fatal);
            }
        });

        let mut flush = FlushManager::new();
        flush.register(Arc::new(SnapshotFlushHook::new(self.engine.clone())));
        flush.register(Arc::new(ReportFlushHook::new(self.engine.clone())));

        let coordinator = ShutdownCoordinator::builder()
            .with_signal_handler(self.signals.clone())
            .with_inflight_tracker(self.inflight.clone())
            .with_flush_manager(flush)
            .with_drain_timeout(Duration::from_secs(self.engine.config().engine.shutdown_grace_secs))
            .build();
        let report = coordinator.run().await;

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Scheduler task ended abnormally");
            }
        }
        if let Err(e) = journal.close().await {
            warn!(error = %e, "Event journal task failed");
        }

        if report.signal == ShutdownSignal::Fatal {
            anyhow::bail!("monitoring engine stopped after a fatal error");
        }
        Ok(report)
    }
}
