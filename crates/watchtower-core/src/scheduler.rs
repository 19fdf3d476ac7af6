use crate::engine::{CollectionOutcome, Engine};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use watchtower_shutdown::{ShutdownSignal, SignalHandler};

/// 采集槽位：释放时清除忙标记
struct ProbeSlot(Arc<AtomicBool>);

impl Drop for ProbeSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 定时任务调度器
///
/// 每个系统一个独立的采集定时器，另有巡检、聚合、仪表盘与通知循环。
/// 所有循环在收到关闭信号后退出。
pub struct Scheduler {
    engine: Arc<Engine>,
    signals: SignalHandler,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, signals: SignalHandler) -> Self {
        Self { engine, signals }
    }

    /// 启动所有循环
    pub async fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut handles = self.spawn_pollers().await;
        handles.extend(self.spawn_maintenance());
        handles
    }

    /// 为每个可轮询系统启动采集循环，启动时立即采集一次
    pub async fn spawn_pollers(&self) -> Vec<JoinHandle<()>> {
        let systems = self.engine.pollable_systems().await;
        info!(systems = systems.len(), "Starting system pollers");

        systems
            .into_iter()
            .map(|(system_id, period)| self.spawn_poller(system_id, period))
            .collect()
    }

    fn spawn_poller(&self, system_id: String, period: Duration) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let mut shutdown = self.signals.subscribe();
        let already_triggered = self.signals.is_triggered();

        tokio::spawn(async move {
            if already_triggered {
                return;
            }

            let busy = Arc::new(AtomicBool::new(false));
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if busy.swap(true, Ordering::SeqCst) {
                            if let Err(e) = engine.record_skipped_tick(&system_id).await {
                                error!(system_id = %system_id, error = %e, "Failed to record skipped tick");
                            }
                            continue;
                        }

                        let slot = ProbeSlot(busy.clone());
                        let engine = engine.clone();
                        let system_id = system_id.clone();
                        tokio::spawn(async move {
                            let _slot = slot;
                            match engine.collect_system(&system_id).await {
                                Ok(CollectionOutcome::Cancelled) => {
                                    debug!(system_id = %system_id, "Collection cancelled by shutdown");
                                }
                                Ok(_) => {}
                                Err(e) => error!(system_id = %system_id, error = %e, "Collection handling failed"),
                            }
                        });
                    }
                }
            }
            debug!(system_id = %system_id, "Poller stopped");
        })
    }

    /// 启动巡检、聚合、仪表盘与通知循环
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        let config = self.engine.config().clone();
        let mut handles = Vec::new();

        let engine = self.engine.clone();
        handles.push(self.spawn_periodic(
            "sweep",
            Duration::from_secs(config.engine.sweep_interval_secs),
            move || {
                let engine = engine.clone();
                async move {
                    if let Err(e) = engine.sweep(Utc::now()).await {
                        error!(error = %e, "Alert sweep failed");
                    }
                }
            },
        ));

        for interval_secs in config.aggregation.intervals_secs.iter().copied() {
            let engine = self.engine.clone();
            handles.push(self.spawn_periodic(
                "aggregation",
                Duration::from_secs(interval_secs),
                move || {
                    let engine = engine.clone();
                    async move {
                        if let Err(e) = engine.aggregate(interval_secs, Utc::now()).await {
                            error!(interval = interval_secs, error = %e, "Aggregation failed");
                        }
                    }
                },
            ));
        }

        let engine = self.engine.clone();
        handles.push(self.spawn_periodic(
            "dashboard",
            Duration::from_secs(config.engine.dashboard_interval_secs),
            move || {
                let engine = engine.clone();
                async move {
                    if let Err(e) = engine.publish_snapshot(Utc::now()).await {
                        error!(error = %e, "Dashboard snapshot failed");
                    }
                }
            },
        ));

        let engine = self.engine.clone();
        handles.push(self.spawn_periodic(
            "notifications",
            Duration::from_secs(config.notifications.interval_secs),
            move || {
                let engine = engine.clone();
                async move {
                    engine.dispatch_notifications().await;
                }
            },
        ));

        handles
    }

    /// 周期任务，第一次执行在一个周期之后
    fn spawn_periodic<F, Fut>(&self, name: &'static str, period: Duration, mut task: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown: broadcast::Receiver<ShutdownSignal> = self.signals.subscribe();
        let already_triggered = self.signals.is_triggered();

        tokio::spawn(async move {
            if already_triggered {
                return;
            }

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_secs = period.as_secs(), "Periodic task started");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => task().await,
                }
            }
            debug!(task = name, "Periodic task stopped");
        })
    }
}
