use std::sync::{Arc, OnceLock};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - 优雅关闭
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,

    /// 致命错误（panic 或任务异常退出）
    Fatal,
}

/// 信号处理器，可克隆后分发给各个定时任务
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    triggered: Arc<OnceLock<ShutdownSignal>>,
}

impl SignalHandler {
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(16);
        let handler = Self {
            shutdown_tx: tx,
            triggered: Arc::new(OnceLock::new()),
        };
        (handler, rx)
    }

    /// 等待关闭信号；已经触发过时立即返回
    pub async fn wait_for_signal(&self) -> ShutdownSignal {
        let mut rx = self.shutdown_tx.subscribe();
        if let Some(signal) = self.triggered_signal() {
            return signal;
        }
        rx.recv().await.unwrap_or(ShutdownSignal::Manual)
    }

    /// 等待系统信号并广播
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
        };

        self.trigger(received);
        Ok(received)
    }

    /// 等待系统信号（Windows 版本）
    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        self.trigger(ShutdownSignal::Interrupt);
        Ok(ShutdownSignal::Interrupt)
    }

    /// 广播关闭信号，只有第一次生效
    pub fn trigger(&self, signal: ShutdownSignal) {
        if self.triggered.set(signal).is_err() {
            return;
        }
        match signal {
            ShutdownSignal::Fatal => error!("Fatal error, shutting down"),
            other => info!(signal = ?other, "Shutdown triggered"),
        }
        let _ = self.shutdown_tx.send(signal);
    }

    /// 手动触发关闭
    pub fn trigger_shutdown(&self) {
        self.trigger(ShutdownSignal::Manual);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.get().is_some()
    }

    /// 第一次触发的信号
    pub fn triggered_signal(&self) -> Option<ShutdownSignal> {
        self.triggered.get().copied()
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_handler_creation() {
        let (handler, mut rx) = SignalHandler::new();

        handler.trigger_shutdown();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal, ShutdownSignal::Manual);
        assert!(handler.is_triggered());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let (handler, _rx1) = SignalHandler::new();
        let mut rx2 = handler.subscribe();
        let mut rx3 = handler.clone().subscribe();

        handler.trigger(ShutdownSignal::Fatal);

        assert_eq!(rx2.recv().await.unwrap(), ShutdownSignal::Fatal);
        assert_eq!(rx3.recv().await.unwrap(), ShutdownSignal::Fatal);
    }

    #[tokio::test]
    async fn test_only_first_trigger_is_broadcast() {
        let (handler, mut rx) = SignalHandler::new();

        handler.trigger(ShutdownSignal::Term);
        handler.trigger(ShutdownSignal::Manual);

        assert_eq!(rx.recv().await.unwrap(), ShutdownSignal::Term);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns() {
        let (handler, _rx) = SignalHandler::new();
        handler.trigger(ShutdownSignal::Term);
        assert_eq!(handler.wait_for_signal().await, ShutdownSignal::Term);
    }
}
