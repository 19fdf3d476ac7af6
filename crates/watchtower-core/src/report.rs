use crate::dashboard::{OverallHealth, PerformanceSummary};
use crate::engine::Engine;
use crate::error::Result;
use crate::registry::MonitoredSystem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use watchtower_metrics::Alert;
use watchtower_shutdown::{FlushError, FlushHook};
use watchtower_timeseries::WindowStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub systems_count: usize,
    pub metrics_count: usize,
    pub active_alerts: usize,
    pub notifications_queued: usize,
    pub emergencies: u64,
    pub dead_letters: u64,
    pub uptime_secs: i64,
}

/// 监控报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub summary: OverallHealth,
    pub systems: Vec<MonitoredSystem>,
    pub recent_metrics: BTreeMap<String, WindowStats>,
    pub active_alerts: Vec<Alert>,
    pub performance: PerformanceSummary,
    pub statistics: ReportStatistics,
}

impl MonitoringReport {
    pub fn file_name(&self) -> String {
        format!("monitoring_report_{}.json", self.generated_at.timestamp_millis())
    }
}

/// 写出报告到 `<dir>/monitoring_report_<millis>.json`
pub async fn write_report(dir: &Path, report: &MonitoringReport) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report.file_name());
    tokio::fs::write(&path, serde_json::to_string_pretty(report)?).await?;

    info!(path = %path.display(), "Monitoring report written");
    Ok(path)
}

/// 关闭时写出最终仪表盘快照
pub struct SnapshotFlushHook {
    engine: Arc<Engine>,
}

impl SnapshotFlushHook {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl FlushHook for SnapshotFlushHook {
    async fn flush(&self) -> std::result::Result<(), FlushError> {
        self.engine
            .publish_snapshot(Utc::now())
            .await
            .map(|_| ())
            .map_err(|e| FlushError::Failed(e.to_string()))
    }

    fn name(&self) -> &str {
        "dashboard-snapshot"
    }

    fn priority(&self) -> u32 {
        10
    }
}

/// 关闭时写出最终报告
pub struct ReportFlushHook {
    engine: Arc<Engine>,
}

impl ReportFlushHook {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl FlushHook for ReportFlushHook {
    async fn flush(&self) -> std::result::Result<(), FlushError> {
        self.engine
            .write_report(Utc::now())
            .await
            .map(|_| ())
            .map_err(|e| FlushError::Failed(e.to_string()))
    }

    fn name(&self) -> &str {
        "monitoring-report"
    }

    fn priority(&self) -> u32 {
        20
    }
}
