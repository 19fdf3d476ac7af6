use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use watchtower_config::SystemConfig;

/// 系统状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Active,
    Error,
}

/// 被监控系统
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredSystem {
    pub id: String,
    pub name: String,
    pub status: SystemStatus,
    pub interval_secs: u64,
    pub metrics: Vec<String>,
    pub consecutive_errors: u32,
    pub health_score: u8,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub skipped_ticks: u64,
    pub total_collections: u64,

    /// 是否有可用的采集器
    pub pollable: bool,
}

impl MonitoredSystem {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            status: SystemStatus::Active,
            interval_secs: config.interval_secs,
            metrics: config.metrics.clone(),
            consecutive_errors: 0,
            health_score: 100,
            last_check: None,
            last_error: None,
            skipped_ticks: 0,
            total_collections: 0,
            pollable: false,
        }
    }
}

/// 失败登记结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub consecutive_errors: u32,

    /// 本次失败使系统进入错误状态
    pub entered_error: bool,
}

/// 系统注册表
pub struct SystemRegistry {
    systems: BTreeMap<String, MonitoredSystem>,
    max_consecutive_errors: u32,
}

impl SystemRegistry {
    pub fn new(max_consecutive_errors: u32) -> Self {
        Self {
            systems: BTreeMap::new(),
            max_consecutive_errors,
        }
    }

    pub fn register(&mut self, system: MonitoredSystem) {
        info!(system_id = %system.id, interval_secs = system.interval_secs, pollable = system.pollable, "System registered");
        self.systems.insert(system.id.clone(), system);
    }

    pub fn get(&self, id: &str) -> Option<&MonitoredSystem> {
        self.systems.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut MonitoredSystem> {
        self.systems
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownSystem(id.to_string()))
    }

    pub fn list(&self) -> Vec<MonitoredSystem> {
        self.systems.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// 采集成功；返回系统是否从错误状态恢复
    pub fn record_success(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let system = self.get_mut(id)?;
        system.consecutive_errors = 0;
        system.last_check = Some(now);
        system.last_error = None;
        system.total_collections += 1;

        if system.status == SystemStatus::Error {
            system.status = SystemStatus::Active;
            info!(system_id = %id, "System recovered");
            return Ok(true);
        }
        Ok(false)
    }

    /// 采集失败；连续失败达到上限时进入错误状态，只在转换时报告一次
    pub fn record_failure(&mut self, id: &str, error: &str, now: DateTime<Utc>) -> Result<FailureOutcome> {
        let max = self.max_consecutive_errors;
        let system = self.get_mut(id)?;
        system.consecutive_errors += 1;
        system.last_check = Some(now);
        system.last_error = Some(error.to_string());

        let entered_error = system.status != SystemStatus::Error && system.consecutive_errors >= max;
        if entered_error {
            system.status = SystemStatus::Error;
            warn!(system_id = %id, consecutive_errors = system.consecutive_errors, error = %error, "System marked as error");
        }

        Ok(FailureOutcome {
            consecutive_errors: system.consecutive_errors,
            entered_error,
        })
    }

    pub fn record_skip(&mut self, id: &str) -> Result<u64> {
        let system = self.get_mut(id)?;
        system.skipped_ticks += 1;
        Ok(system.skipped_ticks)
    }

    pub fn set_health(&mut self, id: &str, score: u8) -> Result<()> {
        self.get_mut(id)?.health_score = score;
        Ok(())
    }
}
