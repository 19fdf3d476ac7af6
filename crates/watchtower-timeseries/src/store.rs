use crate::model::{MetricKey, MetricSample};
use crate::query::{RecentWindow, WindowStats};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Non-finite value {value} for {key}")]
    NonFiniteValue { key: String, value: f64 },
}

/// 存储策略
#[derive(Debug, Clone)]
pub struct StorePolicy {
    /// 数据保留时间
    pub retention: Duration,

    /// 单个序列的最大点数，超过后淘汰最旧的点
    pub max_points_per_series: usize,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            retention: Duration::days(30),
            max_points_per_series: 10_000,
        }
    }
}

/// 内存时序存储
///
/// 每个 `(system, metric)` 键是独立的追加目标，写入时只修剪该键。
pub struct MetricStore {
    pub(crate) series: HashMap<MetricKey, VecDeque<MetricSample>>,
    pub(crate) policy: StorePolicy,
}

impl MetricStore {
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            series: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &StorePolicy {
        &self.policy
    }

    /// 追加采样点并修剪该键的过期数据
    pub fn append(&mut self, sample: MetricSample, now: DateTime<Utc>) -> Result<(), StoreError> {
        if !sample.value.is_finite() {
            return Err(StoreError::NonFiniteValue {
                key: sample.key().to_string(),
                value: sample.value,
            });
        }

        let cutoff = now - self.policy.retention;
        let capacity = self.policy.max_points_per_series;
        let series = self.series.entry(sample.key()).or_default();

        // 同一系统的轮询不会重叠，正常情况下总是追加到尾部
        match series.back() {
            Some(last) if sample.timestamp < last.timestamp => {
                let idx = series.partition_point(|s| s.timestamp <= sample.timestamp);
                series.insert(idx, sample);
            }
            _ => series.push_back(sample),
        }

        prune_series(series, cutoff, capacity);
        Ok(())
    }

    /// 最近窗口内（`ts >= now - window`）的采样及统计
    pub fn recent_window(&self, key: &MetricKey, window: Duration, now: DateTime<Utc>) -> RecentWindow {
        let start = now - window;
        let samples = self
            .series
            .get(key)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= start)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        RecentWindow::new(samples)
    }

    /// 闭区间 `[start, end]` 内的取值
    pub fn range(&self, key: &MetricKey, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<f64> {
        self.series
            .get(key)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .map(|s| s.value)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, key: &MetricKey) -> Option<&MetricSample> {
        self.series.get(key).and_then(|series| series.back())
    }

    /// 所有键的最近窗口统计，按键排序
    pub fn recent_summary(&self, window: Duration, now: DateTime<Utc>) -> BTreeMap<String, WindowStats> {
        let start = now - window;
        let mut summary = BTreeMap::new();

        for (key, series) in &self.series {
            let recent: Vec<MetricSample> = series
                .iter()
                .filter(|s| s.timestamp >= start)
                .cloned()
                .collect();
            if let Some(stats) = WindowStats::from_samples(&recent) {
                summary.insert(key.to_string(), stats);
            }
        }

        summary
    }

    pub fn keys(&self) -> Vec<MetricKey> {
        let mut keys: Vec<MetricKey> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn total_points(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(StorePolicy::default())
    }
}

/// 修剪单个序列，返回删除的点数
pub(crate) fn prune_series(
    series: &mut VecDeque<MetricSample>,
    cutoff: DateTime<Utc>,
    capacity: usize,
) -> usize {
    let mut removed = 0;

    while series.front().is_some_and(|s| s.timestamp < cutoff) {
        series.pop_front();
        removed += 1;
    }

    while series.len() > capacity {
        series.pop_front();
        removed += 1;
    }

    if removed > 0 {
        debug!(removed = removed, remaining = series.len(), "Series pruned");
    }

    removed
}
