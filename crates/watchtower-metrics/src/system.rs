use crate::collector::{CollectError, Collector, MetricBatch};
use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// 本机资源采集器
///
/// 保留 `System` 实例，CPU 使用率依赖两次刷新之间的差值。
pub struct HostCollector {
    system: Mutex<System>,
}

impl HostCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for HostCollector {
    async fn collect(&self, system_id: &str) -> Result<MetricBatch, CollectError> {
        let mut system = self.system.lock().await;
        system.refresh_cpu();
        system.refresh_memory();

        let total = system.total_memory() as f64;
        let available = system.available_memory() as f64;
        if total <= 0.0 {
            return Err(CollectError::Probe("total memory reported as zero".to_string()));
        }

        let load = System::load_average();
        let mut batch = MetricBatch::new();
        batch.insert("cpu_usage".to_string(), system.global_cpu_info().cpu_usage() as f64);
        batch.insert("memory_usage".to_string(), (total - available) / total * 100.0);
        batch.insert("load_average_1m".to_string(), load.one);
        batch.insert("load_average_5m".to_string(), load.five);
        batch.insert("load_average_15m".to_string(), load.fifteen);
        batch.insert("uptime".to_string(), System::uptime() as f64);
        batch.insert("memory_total_gb".to_string(), total / GIB);
        batch.insert("memory_free_gb".to_string(), available / GIB);

        debug!(
            system_id = %system_id,
            cpu = %batch["cpu_usage"],
            memory = %batch["memory_usage"],
            "Host metrics collected"
        );

        Ok(batch)
    }

    fn name(&self) -> &str {
        "host"
    }
}
