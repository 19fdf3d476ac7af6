use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// 事件日志流，每个流对应一个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Alerts,
    Health,
    Emergency,
    Errors,
}

impl LogStream {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogStream::Alerts => "alerts.log",
            LogStream::Health => "health.log",
            LogStream::Emergency => "emergency.log",
            LogStream::Errors => "errors.log",
        }
    }

    pub fn all() -> [LogStream; 4] {
        [LogStream::Alerts, LogStream::Health, LogStream::Emergency, LogStream::Errors]
    }
}

/// 结构化日志条目，一行一个 JSON 对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 时间戳
    pub timestamp: DateTime<Utc>,

    /// 日志级别
    pub level: LogLevel,

    /// 事件名，如 `alert_triggered`
    pub event: String,

    /// 主机名
    pub host: String,

    /// 自定义字段
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            event: event.into(),
            host: local_hostname(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// 合并 JSON 对象的所有字段；非对象作为 `data` 字段
    pub fn with_fields(mut self, value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => self.fields.extend(map),
            other => {
                self.fields.insert("data".to_string(), other);
            }
        }
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
