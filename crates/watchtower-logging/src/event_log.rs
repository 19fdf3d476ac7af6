use crate::structured::{LogEntry, LogStream};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// 追加写的 JSON lines 事件日志
#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, stream: LogStream) -> PathBuf {
        self.dir.join(stream.file_name())
    }

    /// 追加一条记录
    pub async fn append(&self, stream: LogStream, entry: &LogEntry) -> Result<(), std::io::Error> {
        let line = Self::encode(entry)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(stream))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// 追加一条记录，失败只记录诊断日志
    pub async fn record(&self, stream: LogStream, entry: LogEntry) {
        if let Err(e) = self.append(stream, &entry).await {
            error!(stream = %stream.file_name(), error = %e, "Failed to write event log");
        }
    }

    /// 同步写入，用于 panic hook 等无法等待异步 I/O 的场景
    pub fn append_blocking(&self, stream: LogStream, entry: &LogEntry) -> Result<(), std::io::Error> {
        let line = Self::encode(entry)?;
        std::fs::create_dir_all(&self.dir)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(stream))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// 读取某个流的全部记录
    pub async fn read_stream(&self, stream: LogStream) -> Result<Vec<serde_json::Value>, std::io::Error> {
        let contents = match tokio::fs::read_to_string(self.path(stream)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(std::io::Error::from))
            .collect()
    }

    fn encode(entry: &LogEntry) -> Result<String, std::io::Error> {
        let mut line = entry.to_json()?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::LogLevel;

    #[tokio::test]
    async fn test_append_json_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(temp_dir.path().join("logs"));

        for i in 0..3 {
            let entry = LogEntry::new(LogLevel::Info, "alert_triggered")
                .with_field("sequence", serde_json::json!(i));
            log.append(LogStream::Alerts, &entry).await.unwrap();
        }

        let records = log.read_stream(LogStream::Alerts).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["sequence"], 2);

        assert!(log.read_stream(LogStream::Health).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocking_append() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(temp_dir.path());

        let entry = LogEntry::new(LogLevel::Error, "fatal_error")
            .with_field("message", serde_json::json!("boom"));
        log.append_blocking(LogStream::Errors, &entry).unwrap();

        let records = log.read_stream(LogStream::Errors).await.unwrap();
        assert_eq!(records[0]["event"], "fatal_error");
        assert_eq!(records[0]["level"], "error");
    }
}
