use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("Flush failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 关闭时的最终落盘钩子
#[async_trait]
pub trait FlushHook: Send + Sync {
    async fn flush(&self) -> Result<(), FlushError>;

    fn name(&self) -> &str;

    /// 执行顺序（数字越小越先执行）
    fn priority(&self) -> u32 {
        100
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// 钩子管理器
pub struct FlushManager {
    hooks: Vec<Arc<dyn FlushHook>>,
}

impl FlushManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// 注册钩子
    pub fn register(&mut self, hook: Arc<dyn FlushHook>) {
        info!(hook = %hook.name(), "Registering flush hook");
        self.hooks.push(hook);
    }

    /// 按优先级执行所有钩子，失败不影响后续钩子
    pub async fn flush_all(&mut self) -> FlushReport {
        self.hooks.sort_by_key(|h| h.priority());

        let mut report = FlushReport::default();
        for hook in &self.hooks {
            match hook.flush().await {
                Ok(()) => {
                    info!(hook = %hook.name(), "Flush hook completed");
                    report.succeeded.push(hook.name().to_string());
                }
                Err(e) => {
                    error!(hook = %hook.name(), error = %e, "Flush hook failed");
                    report.failed.push(hook.name().to_string());
                }
            }
        }

        report
    }

    /// 获取钩子数量
    pub fn count(&self) -> usize {
        self.hooks.len()
    }
}

impl Default for FlushManager {
    fn default() -> Self {
        Self::new()
    }
}
