use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::MonitorConfig;

/// 环境变量前缀，如 `WATCHTOWER__ENGINE__SWEEP_INTERVAL_SECS`
pub const ENV_PREFIX: &str = "WATCHTOWER";

/// 配置加载器：内置默认值 → TOML 文件 → 环境变量
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_source: None,
        }
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// 用给定的变量代替进程环境
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<MonitorConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            builder = builder.add_source(File::new(
                path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(self.env_source.clone()),
        );

        let config: MonitorConfig = builder.build()?.try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// 验证配置
pub fn validate(config: &MonitorConfig) -> Result<()> {
    let engine = &config.engine;
    let intervals = [
        ("engine.sweep_interval_secs", engine.sweep_interval_secs),
        ("engine.dashboard_interval_secs", engine.dashboard_interval_secs),
        ("engine.collector_timeout_secs", engine.collector_timeout_secs),
        ("engine.retention_days", engine.retention_days),
        ("notifications.interval_secs", config.notifications.interval_secs),
    ];
    for (name, value) in intervals {
        if value == 0 {
            return Err(anyhow!("{} must be greater than 0", name));
        }
    }

    if engine.max_points_per_series == 0 {
        return Err(anyhow!("engine.max_points_per_series must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for system in &config.systems {
        if system.id.trim().is_empty() {
            return Err(anyhow!("system id must not be empty"));
        }
        if system.id.contains('.') {
            return Err(anyhow!("system id '{}' must not contain '.'", system.id));
        }
        if !seen.insert(system.id.as_str()) {
            return Err(anyhow!("duplicate system id: {}", system.id));
        }
        if system.interval_secs == 0 {
            return Err(anyhow!("system '{}' interval_secs must be greater than 0", system.id));
        }
    }

    for threshold in &config.thresholds {
        if !threshold.warning.is_finite() {
            return Err(anyhow!("threshold '{}' warning must be finite", threshold.metric));
        }
        if let Some(critical) = threshold.critical {
            if !critical.is_finite() || critical <= threshold.warning {
                return Err(anyhow!(
                    "threshold '{}' critical ({}) must be greater than warning ({})",
                    threshold.metric,
                    critical,
                    threshold.warning
                ));
            }
        }
    }

    if config.aggregation.intervals_secs.is_empty() {
        return Err(anyhow!("aggregation.intervals_secs must not be empty"));
    }
    if config.aggregation.intervals_secs.contains(&0) {
        return Err(anyhow!("aggregation interval must be greater than 0"));
    }

    if config.notifications.batch_size == 0 {
        return Err(anyhow!("notifications.batch_size must be greater than 0"));
    }
    if config.notifications.max_retries == 0 {
        return Err(anyhow!("notifications.max_retries must be greater than 0"));
    }

    if config.emergency.window_secs == 0 {
        return Err(anyhow!("emergency.window_secs must be greater than 0"));
    }

    for (name, key) in config.performance.keys() {
        match key.split_once('.') {
            Some((system, metric)) if !system.is_empty() && !metric.is_empty() => {}
            _ => return Err(anyhow!("performance.{} must look like 'system.metric', got '{}'", name, key)),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = ConfigLoader::new().with_env_source(no_env()).load().unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.systems.len(), 6);
        assert_eq!(config.thresholds.len(), 6);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[engine]
sweep_interval_secs = 30
grace_period_secs = 60

[[systems]]
id = "performance"
name = "Host"
interval_secs = 5
collector = "host"

[[systems]]
id = "orders"
name = "Order API"
interval_secs = 20
endpoint = "http://orders:8080/metrics"

[[thresholds]]
metric = "queue_depth"
warning = 100.0
critical = 500.0

[notifications.slack]
enabled = true
webhook_url = "https://hooks.slack.com/services/T/B/X"
"#;
        let path = temp_dir.path().join("watchtower.toml");
        fs::write(&path, config_content).unwrap();

        let config = ConfigLoader::new()
            .with_file(&path)
            .with_env_source(no_env())
            .load()
            .unwrap();

        assert_eq!(config.engine.sweep_interval_secs, 30);
        assert_eq!(config.engine.grace_period_secs, 60);
        // 未出现的字段使用默认值
        assert_eq!(config.engine.escalation_timeout_secs, 300);
        assert_eq!(config.systems.len(), 2);
        assert!(config.system("orders").unwrap().is_pollable());
        assert_eq!(config.thresholds[0].critical, Some(500.0));
        assert!(config.notifications.slack.enabled);
        assert_eq!(config.notifications.batch_size, 10);
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("watchtower.toml");
        fs::write(&path, "[engine]\nsweep_interval_secs = 30\n").unwrap();

        let mut env = HashMap::new();
        env.insert("WATCHTOWER__ENGINE__SWEEP_INTERVAL_SECS".to_string(), "15".to_string());
        env.insert("WATCHTOWER__NOTIFICATIONS__BATCH_SIZE".to_string(), "25".to_string());

        let config = ConfigLoader::new()
            .with_file(&path)
            .with_env_source(env)
            .load()
            .unwrap();

        assert_eq!(config.engine.sweep_interval_secs, 15);
        assert_eq!(config.notifications.batch_size, 25);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/watchtower.toml")
            .with_env_source(no_env())
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(validate(&MonitorConfig::default()).is_ok());

        let mut config = MonitorConfig::default();
        config.engine.sweep_interval_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = MonitorConfig::default();
        config.systems.push(config.systems[0].clone());
        assert!(validate(&config).unwrap_err().to_string().contains("duplicate"));

        let mut config = MonitorConfig::default();
        config.thresholds[0].critical = Some(config.thresholds[0].warning);
        assert!(validate(&config).is_err());

        let mut config = MonitorConfig::default();
        config.aggregation.intervals_secs.clear();
        assert!(validate(&config).is_err());

        let mut config = MonitorConfig::default();
        config.notifications.batch_size = 0;
        assert!(validate(&config).is_err());

        let mut config = MonitorConfig::default();
        config.notifications.max_retries = 0;
        assert!(validate(&config).is_err());

        let mut config = MonitorConfig::default();
        config.performance.cpu_usage = "cpu_usage".to_string();
        assert!(validate(&config).unwrap_err().to_string().contains("performance.cpu_usage"));
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = MonitorConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("[engine]"));
        assert!(rendered.contains("[[systems]]"));
    }
}
