use crate::store::{prune_series, MetricStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 清理统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupStats {
    pub deleted_points: u64,
    pub removed_series: u64,
    pub remaining_points: u64,
    pub execution_time_ms: i64,
    pub executed_at: DateTime<Utc>,
}

impl MetricStore {
    /// 全量清理：修剪所有序列的过期点，并删除空序列
    ///
    /// 写入路径只修剪被写入的键，长时间没有新数据的键依赖这里回收。
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> CleanupStats {
        let start_time = std::time::Instant::now();
        let cutoff = now - self.policy.retention;
        let capacity = self.policy.max_points_per_series;

        let mut deleted_points = 0u64;
        for series in self.series.values_mut() {
            deleted_points += prune_series(series, cutoff, capacity) as u64;
        }

        let before = self.series.len();
        self.series.retain(|_, series| !series.is_empty());
        let removed_series = (before - self.series.len()) as u64;

        let stats = CleanupStats {
            deleted_points,
            removed_series,
            remaining_points: self.total_points() as u64,
            execution_time_ms: start_time.elapsed().as_millis() as i64,
            executed_at: now,
        };

        if deleted_points > 0 || removed_series > 0 {
            info!(
                deleted_points = %stats.deleted_points,
                removed_series = %stats.removed_series,
                "Metric store cleanup completed"
            );
        } else {
            debug!("Metric store cleanup found nothing to remove");
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use crate::model::MetricSample;
    use crate::store::{MetricStore, StorePolicy};
    use chrono::{Duration, Utc};

    #[test]
    fn test_cleanup_removes_stale_series() {
        let policy = StorePolicy {
            retention: Duration::minutes(5),
            ..Default::default()
        };
        let mut store = MetricStore::new(policy);
        let t0 = Utc::now();

        store
            .append(MetricSample::new("backup", "backup_size_gb", 7.5).with_timestamp(t0), t0)
            .unwrap();
        store
            .append(MetricSample::new("performance", "cpu_usage", 30.0).with_timestamp(t0), t0)
            .unwrap();

        let later = t0 + Duration::minutes(6);
        store
            .append(MetricSample::new("performance", "cpu_usage", 35.0).with_timestamp(later), later)
            .unwrap();

        let stats = store.cleanup(later);
        assert_eq!(stats.deleted_points, 1);
        assert_eq!(stats.removed_series, 1);
        assert_eq!(stats.remaining_points, 1);
        assert_eq!(store.series_count(), 1);
    }

    #[test]
    fn test_cleanup_is_noop_on_fresh_store() {
        let mut store = MetricStore::default();
        let stats = store.cleanup(Utc::now());
        assert_eq!(stats.deleted_points, 0);
        assert_eq!(stats.removed_series, 0);
    }
}
