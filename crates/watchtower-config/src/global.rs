use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use watchtower_logging::LoggingConfig;
use watchtower_notify::{ChannelsConfig, EmailConfig, SlackConfig, SmsConfig, WebhookConfig};

/// 监控引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub engine: EngineConfig,
    pub systems: Vec<SystemConfig>,
    pub thresholds: Vec<ThresholdConfig>,
    pub aggregation: AggregationConfig,
    pub emergency: EmergencyConfig,
    pub notifications: NotificationConfig,
    pub paths: PathsConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            systems: default_systems(),
            thresholds: default_thresholds(),
            aggregation: AggregationConfig::default(),
            emergency: EmergencyConfig::default(),
            notifications: NotificationConfig::default(),
            paths: PathsConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn system(&self, id: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.id == id)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// 引擎运行参数
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub retention_days: u64,
    pub max_points_per_series: usize,
    pub sweep_interval_secs: u64,
    pub grace_period_secs: u64,
    pub escalation_timeout_secs: u64,
    pub dashboard_interval_secs: u64,
    pub collector_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub max_alert_history: usize,
    pub max_consecutive_errors: u32,
    pub recent_window_secs: u64,

    /// 相对上一次采样的变化比例超过该值时输出提示
    pub significant_change_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "Production Monitoring".to_string(),
            retention_days: 30,
            max_points_per_series: 10_000,
            sweep_interval_secs: 60,
            grace_period_secs: 120,
            escalation_timeout_secs: 300,
            dashboard_interval_secs: 30,
            collector_timeout_secs: 10,
            shutdown_grace_secs: 10,
            max_alert_history: 1000,
            max_consecutive_errors: 3,
            recent_window_secs: 300,
            significant_change_ratio: 0.5,
        }
    }
}

/// 采集方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    /// 本机资源
    Host,
    /// HTTP JSON 端点
    Http,
}

/// 被监控系统
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    pub id: String,
    pub name: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default = "default_collector")]
    pub collector: CollectorKind,
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_collector() -> CollectorKind {
    CollectorKind::Http
}

impl SystemConfig {
    pub fn new(id: &str, name: &str, interval_secs: u64, metrics: &[&str], collector: CollectorKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            interval_secs,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            collector,
            endpoint: None,
        }
    }

    /// 有可用的采集方式才参与轮询
    pub fn is_pollable(&self) -> bool {
        match self.collector {
            CollectorKind::Host => true,
            CollectorKind::Http => self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty()),
        }
    }
}

/// 阈值规则
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThresholdConfig {
    pub metric: String,
    pub warning: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
}

impl ThresholdConfig {
    fn new(metric: &str, warning: f64, critical: Option<f64>) -> Self {
        Self {
            metric: metric.to_string(),
            warning,
            critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub intervals_secs: Vec<u64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            intervals_secs: vec![300, 900, 3600, 86400],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmergencyConfig {
    pub window_secs: u64,
    pub min_critical_alerts: usize,
    pub min_core_alerts: usize,
    pub core_metrics: Vec<String>,

    /// 关联告警数达到该值时进入维护模式
    pub maintenance_threshold: usize,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            min_critical_alerts: 3,
            min_core_alerts: 2,
            core_metrics: vec![
                "cpu_usage".to_string(),
                "memory_usage".to_string(),
                "response_time".to_string(),
            ],
            maintenance_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub email: EmailConfig,
    pub slack: SlackConfig,
    pub sms: SmsConfig,
    pub webhook: WebhookConfig,
}

impl NotificationConfig {
    pub fn channels(&self) -> ChannelsConfig {
        ChannelsConfig {
            email: self.email.clone(),
            slack: self.slack.clone(),
            sms: self.sms.clone(),
            webhook: self.webhook.clone(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            batch_size: 10,
            max_retries: 3,
            email: EmailConfig::default(),
            slack: SlackConfig::default(),
            sms: SmsConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// 输出目录
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub archive_dir: PathBuf,
    pub dashboard_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("data/archive"),
            dashboard_dir: PathBuf::from("data/dashboard"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

/// 仪表盘性能摘要取值的序列键，格式为 `系统ID.指标名`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub cpu_usage: String,
    pub memory_usage: String,
    pub response_time: String,
    pub error_rate: String,
    pub requests_per_minute: String,
    pub database_connections: String,
}

impl PerformanceConfig {
    pub fn keys(&self) -> [(&'static str, &str); 6] {
        [
            ("cpu_usage", self.cpu_usage.as_str()),
            ("memory_usage", self.memory_usage.as_str()),
            ("response_time", self.response_time.as_str()),
            ("error_rate", self.error_rate.as_str()),
            ("requests_per_minute", self.requests_per_minute.as_str()),
            ("database_connections", self.database_connections.as_str()),
        ]
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cpu_usage: "performance.cpu_usage".to_string(),
            memory_usage: "performance.memory_usage".to_string(),
            response_time: "application.response_time".to_string(),
            error_rate: "application.error_rate".to_string(),
            requests_per_minute: "application.requests_per_minute".to_string(),
            database_connections: "database.connection_count".to_string(),
        }
    }
}

pub fn default_systems() -> Vec<SystemConfig> {
    vec![
        SystemConfig::new(
            "performance",
            "Performance Monitor",
            15,
            &["cpu_usage", "memory_usage", "disk_io", "network_io"],
            CollectorKind::Host,
        ),
        SystemConfig::new(
            "database",
            "Database Monitor",
            30,
            &["connection_count", "query_time", "slow_queries", "deadlocks"],
            CollectorKind::Http,
        ),
        SystemConfig::new(
            "security",
            "Security Monitor",
            10,
            &["failed_logins", "suspicious_requests", "blocked_ips", "malware_attempts"],
            CollectorKind::Http,
        ),
        SystemConfig::new(
            "marketplace",
            "Marketplace Integration Monitor",
            60,
            &["api_response_time", "sync_success_rate", "order_processing", "inventory_sync"],
            CollectorKind::Http,
        ),
        SystemConfig::new(
            "application",
            "Application Health Monitor",
            20,
            &["response_time", "error_rate", "uptime", "user_sessions"],
            CollectorKind::Http,
        ),
        SystemConfig::new(
            "backup",
            "Backup System Monitor",
            300,
            &["backup_success", "backup_size", "recovery_test", "retention_compliance"],
            CollectorKind::Http,
        ),
    ]
}

pub fn default_thresholds() -> Vec<ThresholdConfig> {
    vec![
        ThresholdConfig::new("cpu_usage", 80.0, Some(95.0)),
        ThresholdConfig::new("memory_usage", 85.0, Some(95.0)),
        ThresholdConfig::new("response_time", 2000.0, Some(5000.0)),
        ThresholdConfig::new("error_rate", 5.0, Some(10.0)),
        ThresholdConfig::new("disk_usage", 90.0, None),
        ThresholdConfig::new("database_connections", 100.0, None),
    ]
}
