use crate::error::Result;
use crate::registry::MonitoredSystem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use watchtower_config::PerformanceConfig;
use watchtower_metrics::{Alert, HealthStatus};
use watchtower_timeseries::{MetricKey, MetricStore, WindowStats};

/// 快照中最多展示的活跃告警数
pub const MAX_SNAPSHOT_ALERTS: usize = 20;

/// 保留的历史快照数
pub const SNAPSHOT_HISTORY_LIMIT: usize = 100;

/// 整体健康状况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallHealth {
    pub status: HealthStatus,
    pub score: u8,
    pub systems_healthy: usize,
    pub systems_total: usize,
    pub active_alerts: usize,
    pub critical_alerts: usize,
}

impl OverallHealth {
    /// 分数取各系统健康度的平均值；有严重告警时直接判定为 critical
    pub fn compute(scores: &[u8], active_alerts: usize, critical_alerts: usize) -> Self {
        let score = if scores.is_empty() {
            100
        } else {
            let total: u32 = scores.iter().map(|s| *s as u32).sum();
            (total as f64 / scores.len() as f64).round() as u8
        };

        let status = if score < 50 || critical_alerts > 0 {
            HealthStatus::Critical
        } else if score < 80 || active_alerts > 5 {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            score,
            systems_healthy: scores.iter().filter(|s| **s >= 80).count(),
            systems_total: scores.len(),
            active_alerts,
            critical_alerts,
        }
    }
}

/// 关键性能指标的当前值，缺失时为 0
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub response_time: f64,
    pub error_rate: f64,
    pub requests_per_minute: f64,
    pub database_connections: f64,
}

impl PerformanceSummary {
    /// 按配置的序列键读取最新值
    pub fn from_store(store: &MetricStore, keys: &PerformanceConfig) -> Self {
        let current = |raw: &str| {
            MetricKey::parse(raw)
                .and_then(|key| store.latest(&key).map(|s| s.value))
                .unwrap_or(0.0)
        };

        Self {
            cpu_usage: current(&keys.cpu_usage),
            memory_usage: current(&keys.memory_usage),
            response_time: current(&keys.response_time),
            error_rate: current(&keys.error_rate),
            requests_per_minute: current(&keys.requests_per_minute),
            database_connections: current(&keys.database_connections),
        }
    }
}

/// 仪表盘快照：`{timestamp, systems, metrics, alerts, health, performance}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub timestamp: DateTime<Utc>,
    pub systems: Vec<MonitoredSystem>,
    pub metrics: BTreeMap<String, WindowStats>,
    pub alerts: Vec<Alert>,
    pub health: OverallHealth,
    pub performance: PerformanceSummary,
}

/// 快照落地接口
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, snapshot: &DashboardSnapshot) -> Result<()>;

    /// 写出 Prometheus 文本格式的指标
    async fn write_exposition(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// 写入目录的快照存储
///
/// `current_dashboard.json` 总是最新快照，`dashboard_<millis>.json` 为历史，
/// 超过上限时删除最旧的文件。
pub struct FileSnapshotSink {
    dir: PathBuf,
    history_limit: usize,
}

impl FileSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            history_limit: SNAPSHOT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join("current_dashboard.json")
    }

    /// 历史快照，按时间从旧到新
    pub async fn history(&self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(millis) = history_millis(&name) {
                entries.push((millis, entry.path()));
            }
        }
        entries.sort_by_key(|(millis, _)| *millis);
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }

    async fn rotate(&self) -> Result<usize> {
        let history = self.history().await?;
        let excess = history.len().saturating_sub(self.history_limit);
        for path in history.iter().take(excess) {
            tokio::fs::remove_file(path).await?;
        }
        if excess > 0 {
            debug!(removed = excess, "Rotated dashboard history");
        }
        Ok(excess)
    }
}

fn history_millis(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix("dashboard_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[async_trait]
impl SnapshotSink for FileSnapshotSink {
    async fn persist(&self, snapshot: &DashboardSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(self.current_path(), &json).await?;

        let history_path = self
            .dir
            .join(format!("dashboard_{}.json", snapshot.timestamp.timestamp_millis()));
        tokio::fs::write(&history_path, &json).await?;
        self.rotate().await?;

        info!(
            systems = snapshot.systems.len(),
            alerts = snapshot.alerts.len(),
            score = snapshot.health.score,
            "Dashboard snapshot written"
        );
        Ok(())
    }

    async fn write_exposition(&self, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join("metrics.prom"), text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(timestamp: DateTime<Utc>) -> DashboardSnapshot {
        DashboardSnapshot {
            timestamp,
            systems: Vec::new(),
            metrics: BTreeMap::new(),
            alerts: Vec::new(),
            health: OverallHealth::compute(&[], 0, 0),
            performance: PerformanceSummary::default(),
        }
    }

    #[test]
    fn test_overall_health_bands() {
        let healthy = OverallHealth::compute(&[100, 90, 80], 0, 0);
        assert_eq!(healthy.status, HealthStatus::Healthy);
        assert_eq!(healthy.score, 90);
        assert_eq!(healthy.systems_healthy, 3);

        assert_eq!(OverallHealth::compute(&[70, 80], 0, 0).status, HealthStatus::Warning);
        assert_eq!(OverallHealth::compute(&[100], 6, 0).status, HealthStatus::Warning);
        assert_eq!(OverallHealth::compute(&[100], 1, 1).status, HealthStatus::Critical);
        assert_eq!(OverallHealth::compute(&[40, 50], 0, 0).status, HealthStatus::Critical);
    }

    #[test]
    fn test_overall_health_without_systems() {
        let health = OverallHealth::compute(&[], 0, 0);
        assert_eq!(health.score, 100);
        assert_eq!(health.systems_total, 0);
    }

    #[test]
    fn test_performance_summary_defaults_to_zero() {
        let mut store = MetricStore::default();
        let now = Utc::now();
        store
            .append(
                watchtower_timeseries::MetricSample::new("performance", "cpu_usage", 42.0).with_timestamp(now),
                now,
            )
            .unwrap();

        let summary = PerformanceSummary::from_store(&store, &PerformanceConfig::default());
        assert_eq!(summary.cpu_usage, 42.0);
        assert_eq!(summary.database_connections, 0.0);
    }

    #[test]
    fn test_performance_summary_uses_configured_keys() {
        let mut store = MetricStore::default();
        let now = Utc::now();
        for (system, metric, value) in [("web", "p95_latency", 180.0), ("pg", "active_connections", 12.0)] {
            store
                .append(
                    watchtower_timeseries::MetricSample::new(system, metric, value).with_timestamp(now),
                    now,
                )
                .unwrap();
        }

        let keys = PerformanceConfig {
            response_time: "web.p95_latency".to_string(),
            database_connections: "pg.active_connections".to_string(),
            ..PerformanceConfig::default()
        };
        let summary = PerformanceSummary::from_store(&store, &keys);
        assert_eq!(summary.response_time, 180.0);
        assert_eq!(summary.database_connections, 12.0);
        assert_eq!(summary.cpu_usage, 0.0);
    }

    #[tokio::test]
    async fn test_file_sink_writes_current_and_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = FileSnapshotSink::new(temp_dir.path());

        sink.persist(&snapshot(Utc::now())).await.unwrap();
        sink.write_exposition("# HELP x\n").await.unwrap();

        assert!(sink.current_path().exists());
        assert!(temp_dir.path().join("metrics.prom").exists());
        assert_eq!(sink.history().await.unwrap().len(), 1);

        let raw = std::fs::read_to_string(sink.current_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for field in ["timestamp", "systems", "metrics", "alerts", "health", "performance"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }

    #[tokio::test]
    async fn test_file_sink_rotates_oldest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = FileSnapshotSink::new(temp_dir.path()).with_history_limit(3);
        let start = Utc::now();

        for i in 0..5 {
            sink.persist(&snapshot(start + Duration::seconds(i))).await.unwrap();
        }

        let history = sink.history().await.unwrap();
        assert_eq!(history.len(), 3);
        let oldest = history[0].file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            oldest,
            format!("dashboard_{}.json", (start + Duration::seconds(2)).timestamp_millis())
        );
    }
}
