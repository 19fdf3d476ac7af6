use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 排空结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub drained: bool,
    pub remaining: usize,
    pub elapsed: Duration,
}

/// 在途操作跟踪器：采集探测与通知发送
#[derive(Clone)]
pub struct InflightTracker {
    active: Arc<AtomicUsize>,
    is_shutting_down: Arc<AtomicBool>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 登记一个在途操作；关闭开始后返回 `None`
    pub fn acquire(&self, label: &str) -> Option<InflightGuard> {
        if self.is_shutting_down.load(Ordering::SeqCst) {
            debug!(operation = %label, "Rejecting new operation: shutting down");
            return None;
        }

        let count = self.active.fetch_add(1, Ordering::SeqCst);
        debug!(operation = %label, active = count + 1, "Operation started");

        Some(InflightGuard {
            counter: self.active.clone(),
        })
    }

    /// 开始关闭
    pub fn start_shutdown(&self) {
        info!("Starting in-flight drain");
        self.is_shutting_down.store(true, Ordering::SeqCst);
    }

    /// 等待在途操作结束，超过宽限期后放弃
    pub async fn drain(&self, grace: Duration) -> DrainOutcome {
        self.start_shutdown();

        let start = Instant::now();
        let mut last_count = self.active_count();

        while self.active_count() > 0 {
            let elapsed = start.elapsed();

            if elapsed >= grace {
                warn!(
                    remaining = self.active_count(),
                    elapsed = ?elapsed,
                    "Drain timeout, abandoning in-flight operations"
                );
                break;
            }

            let current_count = self.active_count();
            if current_count != last_count {
                info!(remaining = current_count, elapsed = ?elapsed, "Draining in-flight operations");
                last_count = current_count;
            }

            sleep(Duration::from_millis(50)).await;
        }

        let remaining = self.active_count();
        if remaining == 0 {
            info!("All in-flight operations finished");
        }

        DrainOutcome {
            drained: remaining == 0,
            remaining,
            elapsed: start.elapsed(),
        }
    }

    /// 获取在途操作数
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 是否正在关闭
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }
}

impl Default for InflightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// 在途操作守卫，释放时计数减一
pub struct InflightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let prev = self.counter.fetch_sub(1, Ordering::SeqCst);
        debug!(active = prev - 1, "Operation finished");
    }
}
