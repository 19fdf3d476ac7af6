use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 指标序列键：`系统ID.指标名`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricKey {
    pub system_id: String,
    pub metric: String,
}

impl MetricKey {
    pub fn new(system_id: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            metric: metric.into(),
        }
    }

    /// 解析 `system.metric` 形式的键，指标名中允许再出现 `.`
    pub fn parse(raw: &str) -> Option<Self> {
        let (system_id, metric) = raw.split_once('.')?;
        if system_id.is_empty() || metric.is_empty() {
            return None;
        }
        Some(Self::new(system_id, metric))
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.system_id, self.metric)
    }
}

/// 单个指标采样点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub system_id: String,
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(system_id: impl Into<String>, metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            system_id: system_id.into(),
            metric_name: metric_name.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn key(&self) -> MetricKey {
        MetricKey::new(self.system_id.clone(), self.metric_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_display_and_parse() {
        let key = MetricKey::new("performance", "cpu_usage");
        assert_eq!(key.to_string(), "performance.cpu_usage");
        assert_eq!(MetricKey::parse("performance.cpu_usage"), Some(key));

        let nested = MetricKey::parse("marketplace.n11.response_time").unwrap();
        assert_eq!(nested.system_id, "marketplace");
        assert_eq!(nested.metric, "n11.response_time");

        assert!(MetricKey::parse("no_dot").is_none());
        assert!(MetricKey::parse(".cpu").is_none());
    }

    #[test]
    fn test_metric_sample() {
        let sample = MetricSample::new("database", "connection_count", 42.0);
        assert_eq!(sample.key(), MetricKey::new("database", "connection_count"));
        assert_eq!(sample.value, 42.0);
    }
}
