use crate::rollup::{AggregationBucket, RollupStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 归档文件内容：`{interval, timestamp, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub interval: u64,
    pub timestamp: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub data: BTreeMap<String, RollupStats>,
}

impl From<&AggregationBucket> for ArchiveRecord {
    fn from(bucket: &AggregationBucket) -> Self {
        Self {
            interval: bucket.interval,
            timestamp: bucket.window_end,
            window_start: bucket.window_start,
            data: bucket.data.clone(),
        }
    }
}

/// 归档统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub interval: u64,
    pub archived_keys: usize,
    pub archive_size_kb: f64,
    pub path: PathBuf,
}

/// 聚合结果归档器，按间隔分目录，每个时间桶一个文件
pub struct DataArchiver {
    root: PathBuf,
}

impl DataArchiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 生成归档文件名：`<root>/<interval>s/aggregated_<millis>.json`
    pub fn generate_filename(&self, bucket: &AggregationBucket) -> PathBuf {
        self.root
            .join(format!("{}s", bucket.interval))
            .join(format!("aggregated_{}.json", bucket.window_end.timestamp_millis()))
    }

    /// 写出一个时间桶
    pub async fn archive(&self, bucket: &AggregationBucket) -> Result<ArchiveStats, ArchiveError> {
        use tokio::fs::{create_dir_all, File};
        use tokio::io::AsyncWriteExt;

        let path = self.generate_filename(bucket);
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }

        let record = ArchiveRecord::from(bucket);
        let json_data = serde_json::to_string_pretty(&record)?;
        let size_kb = json_data.len() as f64 / 1024.0;

        let mut file = File::create(&path).await?;
        file.write_all(json_data.as_bytes()).await?;
        file.flush().await?;

        info!(
            interval = %bucket.interval,
            keys = bucket.data.len(),
            path = %path.display(),
            "Aggregation archived"
        );

        Ok(ArchiveStats {
            interval: bucket.interval,
            archived_keys: bucket.data.len(),
            archive_size_kb: size_kb,
            path,
        })
    }

    /// 读取归档文件
    pub async fn restore_from_file(&self, file_path: &Path) -> Result<ArchiveRecord, ArchiveError> {
        let contents = tokio::fs::read_to_string(file_path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}
