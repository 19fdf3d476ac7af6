use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Error,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=49 => HealthStatus::Critical,
            50..=79 => HealthStatus::Warning,
            _ => HealthStatus::Healthy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Error => "error",
        }
    }
}

/// 扣分方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Penalty {
    /// 超出部分乘以系数：`(v - threshold) * factor`
    Excess { threshold: f64, factor: f64 },

    /// 超过阈值后按原值计：`v * factor`
    Proportional { threshold: f64, factor: f64 },
}

impl Penalty {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Penalty::Excess { threshold, factor } if value > threshold => (value - threshold) * factor,
            Penalty::Proportional { threshold, factor } if value > threshold => value * factor,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRule {
    pub metric: String,
    pub penalty: Penalty,
}

impl PenaltyRule {
    pub fn new(metric: impl Into<String>, penalty: Penalty) -> Self {
        Self {
            metric: metric.into(),
            penalty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub rules: Vec<PenaltyRule>,

    /// 每次连续采集失败的扣分
    pub error_penalty: f64,

    /// 相对上次通知的变化达到该值才再次通知
    pub notice_delta: u8,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                PenaltyRule::new("cpu_usage", Penalty::Excess { threshold: 80.0, factor: 2.0 }),
                PenaltyRule::new("memory_usage", Penalty::Excess { threshold: 85.0, factor: 3.0 }),
                PenaltyRule::new("error_rate", Penalty::Proportional { threshold: 1.0, factor: 5.0 }),
                PenaltyRule::new("response_time", Penalty::Excess { threshold: 1000.0, factor: 0.01 }),
            ],
            error_penalty: 10.0,
            notice_delta: 10,
        }
    }
}

/// 健康度变化通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthNotice {
    pub system_id: String,
    pub previous_score: u8,
    pub current_score: u8,
    pub status: HealthStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthNotice {
    /// 系统进入错误状态时的通知
    pub fn collection_failed(system_id: &str, score: u8, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            system_id: system_id.to_string(),
            previous_score: score,
            current_score: score,
            status: HealthStatus::Error,
            error: Some(error.into()),
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone)]
struct SystemHealth {
    score: u8,
    last_emitted: u8,
    last_metrics: HashMap<String, f64>,
}

impl Default for SystemHealth {
    fn default() -> Self {
        Self {
            score: 100,
            last_emitted: 100,
            last_metrics: HashMap::new(),
        }
    }
}

/// 系统健康评分
pub struct HealthScorer {
    policy: HealthPolicy,
    systems: HashMap<String, SystemHealth>,
}

impl HealthScorer {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            systems: HashMap::new(),
        }
    }

    /// 从 100 开始扣分，四舍五入后截断到 [0, 100]
    pub fn compute(&self, metrics: &HashMap<String, f64>, error_count: u32) -> u8 {
        let mut score = 100.0;
        for rule in &self.policy.rules {
            if let Some(value) = metrics.get(&rule.metric) {
                score -= rule.penalty.apply(*value);
            }
        }
        score -= error_count as f64 * self.policy.error_penalty;

        let score = score.round();
        if score.is_nan() {
            return 0;
        }
        score.clamp(0.0, 100.0) as u8
    }

    /// 采集成功后更新评分
    pub fn apply_success(
        &mut self,
        system_id: &str,
        metrics: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Option<HealthNotice> {
        let score = self.compute(metrics, 0);
        let health = self.systems.entry(system_id.to_string()).or_default();
        health.last_metrics = metrics.clone();
        health.score = score;
        self.maybe_notice(system_id, None, now)
    }

    /// 采集失败后用上次成功的指标加上错误扣分重新计算
    pub fn apply_failure(
        &mut self,
        system_id: &str,
        error_count: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Option<HealthNotice> {
        let last_metrics = self
            .systems
            .get(system_id)
            .map(|h| h.last_metrics.clone())
            .unwrap_or_default();
        let score = self.compute(&last_metrics, error_count);
        self.systems.entry(system_id.to_string()).or_default().score = score;
        self.maybe_notice(system_id, Some(error.to_string()), now)
    }

    pub fn score(&self, system_id: &str) -> u8 {
        self.systems.get(system_id).map(|h| h.score).unwrap_or(100)
    }

    fn maybe_notice(&mut self, system_id: &str, error: Option<String>, now: DateTime<Utc>) -> Option<HealthNotice> {
        let health = self.systems.get_mut(system_id)?;
        let delta = health.score.abs_diff(health.last_emitted);

        if delta < self.policy.notice_delta {
            debug!(system_id = %system_id, score = health.score, "Health score updated");
            return None;
        }

        let notice = HealthNotice {
            system_id: system_id.to_string(),
            previous_score: health.last_emitted,
            current_score: health.score,
            status: HealthStatus::from_score(health.score),
            error,
            timestamp: now,
        };
        health.last_emitted = health.score;

        info!(
            system_id = %system_id,
            previous = notice.previous_score,
            current = notice.current_score,
            status = %notice.status.as_str(),
            "Health score changed"
        );
        Some(notice)
    }
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
