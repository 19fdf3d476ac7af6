use thiserror::Error;
use watchtower_metrics::AlertError;
use watchtower_notify::NotifyError;
use watchtower_timeseries::{ArchiveError, StoreError};

/// 引擎统一错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    #[error("No collector configured for system: {0}")]
    NoCollector(String),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, EngineError>;
