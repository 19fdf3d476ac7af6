use crate::flush::{FlushManager, FlushReport};
use crate::inflight::InflightTracker;
use crate::signal::{ShutdownSignal, SignalHandler};
use std::time::{Duration, Instant};
use tracing::info;

/// 关闭阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Draining,
    Flushing,
    Complete,
}

/// 关闭结果
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub signal: ShutdownSignal,
    pub phases: Vec<ShutdownPhase>,
    pub drained: bool,
    pub abandoned: usize,
    pub flush: FlushReport,
    pub elapsed: Duration,
}

/// 关闭协调器：广播信号 → 排空在途操作 → 执行落盘钩子
pub struct ShutdownCoordinator {
    signal_handler: SignalHandler,
    inflight: InflightTracker,
    flush_manager: FlushManager,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn builder() -> ShutdownCoordinatorBuilder {
        ShutdownCoordinatorBuilder::new()
    }

    /// 等待关闭信号后执行关闭流程
    pub async fn run(self) -> ShutdownReport {
        info!("Shutdown coordinator started, waiting for signal...");
        let signal = self.signal_handler.wait_for_signal().await;
        self.shutdown(signal).await
    }

    /// 立即执行关闭流程
    pub async fn shutdown(mut self, signal: ShutdownSignal) -> ShutdownReport {
        let start = Instant::now();
        let mut phases = vec![ShutdownPhase::Running];

        // 停止所有定时任务
        self.signal_handler.trigger(signal);
        let signal = self.signal_handler.triggered_signal().unwrap_or(signal);
        info!(signal = ?signal, "Shutting down");

        phases.push(ShutdownPhase::Draining);
        let outcome = self.inflight.drain(self.drain_timeout).await;

        phases.push(ShutdownPhase::Flushing);
        let flush = self.flush_manager.flush_all().await;

        phases.push(ShutdownPhase::Complete);
        let elapsed = start.elapsed();
        info!(elapsed = ?elapsed, abandoned = outcome.remaining, "Graceful shutdown complete");

        ShutdownReport {
            signal,
            phases,
            drained: outcome.drained,
            abandoned: outcome.remaining,
            flush,
            elapsed,
        }
    }

    /// 获取信号处理器的引用
    pub fn signal_handler(&self) -> &SignalHandler {
        &self.signal_handler
    }

    pub fn inflight(&self) -> &InflightTracker {
        &self.inflight
    }
}

/// 关闭协调器构建器
pub struct ShutdownCoordinatorBuilder {
    signal_handler: Option<SignalHandler>,
    inflight: Option<InflightTracker>,
    flush_manager: FlushManager,
    drain_timeout: Duration,
}

impl ShutdownCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            signal_handler: None,
            inflight: None,
            flush_manager: FlushManager::new(),
            drain_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_signal_handler(mut self, handler: SignalHandler) -> Self {
        self.signal_handler = Some(handler);
        self
    }

    pub fn with_inflight_tracker(mut self, tracker: InflightTracker) -> Self {
        self.inflight = Some(tracker);
        self
    }

    pub fn with_flush_manager(mut self, manager: FlushManager) -> Self {
        self.flush_manager = manager;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn build(self) -> ShutdownCoordinator {
        ShutdownCoordinator {
            signal_handler: self.signal_handler.unwrap_or_default(),
            inflight: self.inflight.unwrap_or_default(),
            flush_manager: self.flush_manager,
            drain_timeout: self.drain_timeout,
        }
    }
}

impl Default for ShutdownCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
