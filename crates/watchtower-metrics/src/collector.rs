use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 一次采集得到的指标
pub type MetricBatch = HashMap<String, f64>;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Collection timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Probe failed: {0}")]
    Probe(String),
}

/// 指标采集器，每个被监控系统一个
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, system_id: &str) -> Result<MetricBatch, CollectError>;

    fn name(&self) -> &str;
}

/// 通过 HTTP GET 拉取 JSON 对象形式的指标
pub struct HttpCollector {
    url: String,
    client: reqwest::Client,
}

impl HttpCollector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn collect(&self, system_id: &str) -> Result<MetricBatch, CollectError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(CollectError::Status {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let payload: Value = response.json().await?;
        let batch = parse_metric_payload(&payload)?;
        debug!(system_id = %system_id, url = %self.url, metrics = batch.len(), "HTTP collection done");
        Ok(batch)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 解析 JSON 对象：数字保留，布尔映射为 1/0，数字字符串解析，其余跳过
pub fn parse_metric_payload(payload: &Value) -> Result<MetricBatch, CollectError> {
    let object = payload
        .as_object()
        .ok_or_else(|| CollectError::InvalidPayload("expected a JSON object".to_string()))?;

    let mut batch = MetricBatch::new();
    for (name, value) in object {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => {
                batch.insert(name.clone(), v);
            }
            _ => debug!(metric = %name, "Skipping non-numeric metric"),
        }
    }

    Ok(batch)
}
