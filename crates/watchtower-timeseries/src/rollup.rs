use crate::store::MetricStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 聚合策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupPolicy {
    /// 时间桶大小（秒），同时也是执行周期
    pub interval_seconds: u64,
}

impl RollupPolicy {
    pub fn new(interval_seconds: u64) -> Self {
        Self { interval_seconds }
    }

    pub fn five_minutes() -> Self {
        Self::new(300)
    }

    pub fn fifteen_minutes() -> Self {
        Self::new(900)
    }

    pub fn hourly() -> Self {
        Self::new(3600)
    }

    pub fn daily() -> Self {
        Self::new(86400)
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::five_minutes(),
            Self::fifteen_minutes(),
            Self::hourly(),
            Self::daily(),
        ]
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.interval_seconds as i64)
    }

    /// 归档目录名，如 `300s`
    pub fn label(&self) -> String {
        format!("{}s", self.interval_seconds)
    }
}

/// 单个键在一个时间桶内的统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollupStats {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub median: f64,
}

impl RollupStats {
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count: values.len(),
            avg: sum / values.len() as f64,
            min,
            max,
            sum,
            median: median(values),
        })
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let middle = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

/// 聚合桶，写出后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub interval: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub data: BTreeMap<String, RollupStats>,
}

impl AggregationBucket {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl MetricStore {
    /// 对 `[now - interval, now]` 内的所有键做统计聚合
    pub fn rollup(&self, policy: RollupPolicy, now: DateTime<Utc>) -> AggregationBucket {
        let window_start = now - policy.window();
        let mut data = BTreeMap::new();

        for key in self.keys() {
            let values = self.range(&key, window_start, now);
            if let Some(stats) = RollupStats::compute(&values) {
                data.insert(key.to_string(), stats);
            }
        }

        debug!(
            interval = %policy.interval_seconds,
            keys = data.len(),
            "Rollup computed"
        );

        AggregationBucket {
            interval: policy.interval_seconds,
            window_start,
            window_end: now,
            data,
        }
    }
}
