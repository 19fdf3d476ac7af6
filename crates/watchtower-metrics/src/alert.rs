use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info, warn};
use watchtower_timeseries::{MetricKey, MetricSample};

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AlertError {
    #[error("Alert not found: {0}")]
    NotFound(String),

    #[error("Alert already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Invalid sample for {key}: {value}")]
    InvalidSample { key: String, value: f64 },
}

/// 阈值规则：按指标名匹配，作用于所有上报该指标的系统
///
/// 比较严格使用 `>`，等于阈值不触发。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric: String,
    pub warning: f64,
    pub critical: Option<f64>,
}

impl ThresholdRule {
    pub fn new(metric: impl Into<String>, warning: f64) -> Self {
        Self {
            metric: metric.into(),
            warning,
            critical: None,
        }
    }

    pub fn with_critical(mut self, critical: f64) -> Self {
        self.critical = Some(critical);
        self
    }

    pub fn evaluate(&self, value: f64) -> Option<AlertLevel> {
        if self.critical.is_some_and(|critical| value > critical) {
            Some(AlertLevel::Critical)
        } else if value > self.warning {
            Some(AlertLevel::Warning)
        } else {
            None
        }
    }

    pub fn message(&self, key: &MetricKey, value: f64) -> String {
        format!(
            "{} above threshold: value={:.2}, threshold={:.2}",
            key, value, self.warning
        )
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("cpu_usage", 80.0).with_critical(95.0),
            Self::new("memory_usage", 85.0).with_critical(95.0),
            Self::new("response_time", 2000.0).with_critical(5000.0),
            Self::new("error_rate", 5.0).with_critical(10.0),
            Self::new("disk_usage", 90.0),
            Self::new("database_connections", 100.0),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    pub system: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
}

/// 告警实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub key: MetricKey,
    pub level: AlertLevel,
    pub message: String,
    pub context: AlertContext,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_reason: Option<String>,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl Alert {
    fn new(key: MetricKey, level: AlertLevel, message: String, context: AlertContext, now: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("alert_{}_{}", now.timestamp_millis(), &suffix[..9]),
            key,
            level,
            message,
            context,
            created_at: now,
            acknowledged: false,
            acknowledged_at: None,
            resolved: false,
            resolved_at: None,
            resolved_reason: None,
            escalated: false,
            escalated_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// 告警生命周期事件，由引擎转换为通知与事件日志
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Triggered(Alert),
    Resolved(Alert),
    Escalated(Alert),
    Acknowledged(Alert),
}

impl AlertEvent {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertEvent::Triggered(a)
            | AlertEvent::Resolved(a)
            | AlertEvent::Escalated(a)
            | AlertEvent::Acknowledged(a) => a,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AlertEvent::Triggered(_) => "triggered",
            AlertEvent::Resolved(_) => "resolved",
            AlertEvent::Escalated(_) => "escalated",
            AlertEvent::Acknowledged(_) => "acknowledged",
        }
    }
}

/// 生命周期策略
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// 自动恢复前告警至少持续的时间
    pub grace_period: Duration,

    /// 未确认的严重告警升级前的等待时间
    pub escalation_timeout: Duration,

    /// 保留的已恢复告警数量
    pub max_history: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::seconds(120),
            escalation_timeout: Duration::seconds(300),
            max_history: 1000,
        }
    }
}

/// 告警表与状态机：`NONE → OPEN(level) → [ESCALATED] → RESOLVED`
///
/// 每个键同时最多存在一个未恢复的告警，由 `open` 索引保证。
pub struct AlertEngine {
    rules: HashMap<String, ThresholdRule>,
    alerts: HashMap<String, Alert>,
    open: HashMap<MetricKey, String>,
    resolved_order: VecDeque<String>,
    policy: LifecyclePolicy,
}

impl AlertEngine {
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self {
            rules: HashMap::new(),
            alerts: HashMap::new(),
            open: HashMap::new(),
            resolved_order: VecDeque::new(),
            policy,
        }
    }

    pub fn add_rule(&mut self, rule: ThresholdRule) {
        info!(metric = %rule.metric, warning = %rule.warning, critical = ?rule.critical, "Adding threshold rule");
        self.rules.insert(rule.metric.clone(), rule);
    }

    pub fn rule(&self, metric: &str) -> Option<&ThresholdRule> {
        self.rules.get(metric)
    }

    /// 评估新采样：越过阈值且该键没有未恢复告警时创建告警
    ///
    /// 已有未恢复告警时只刷新 `context.value`，不重复通知。
    pub fn evaluate(&mut self, sample: &MetricSample) -> Result<Option<AlertEvent>, AlertError> {
        let key = sample.key();
        if !sample.value.is_finite() {
            return Err(AlertError::InvalidSample {
                key: key.to_string(),
                value: sample.value,
            });
        }

        let Some(rule) = self.rules.get(&sample.metric_name) else {
            return Ok(None);
        };
        let Some(level) = rule.evaluate(sample.value) else {
            return Ok(None);
        };

        if let Some(alert) = self.open.get(&key).and_then(|id| self.alerts.get_mut(id)) {
            alert.context.value = sample.value;
            debug!(alert_id = %alert.id, value = %sample.value, "Open alert refreshed");
            return Ok(None);
        }

        let context = AlertContext {
            system: sample.system_id.clone(),
            metric: sample.metric_name.clone(),
            value: sample.value,
            threshold: rule.warning,
        };
        let message = rule.message(&key, sample.value);
        let alert = Alert::new(key.clone(), level, message, context, sample.timestamp);

        info!(alert_id = %alert.id, key = %key, level = %level.as_str(), "Alert fired");

        self.open.insert(key, alert.id.clone());
        self.alerts.insert(alert.id.clone(), alert.clone());
        Ok(Some(AlertEvent::Triggered(alert)))
    }

    /// 周期巡检：自动恢复与升级
    ///
    /// 自动恢复只看巡检时该键的最新采样，以及告警已持续的时间。
    pub fn sweep<F>(&mut self, latest: F, now: DateTime<Utc>) -> Vec<AlertEvent>
    where
        F: Fn(&MetricKey) -> Option<f64>,
    {
        let mut events = Vec::new();

        for id in self.open_ids() {
            let Some(alert) = self.alerts.get(&id) else { continue };
            let below = latest(&alert.key).is_some_and(|value| value < alert.context.threshold);
            if below && alert.age(now) >= self.policy.grace_period {
                if let Ok(event) = self.resolve(&id, "auto-resolved", now) {
                    events.push(event);
                }
            }
        }

        for id in self.open_ids() {
            let Some(alert) = self.alerts.get_mut(&id) else { continue };
            if alert.level == AlertLevel::Critical
                && !alert.acknowledged
                && !alert.escalated
                && alert.age(now) >= self.policy.escalation_timeout
            {
                alert.escalated = true;
                alert.escalated_at = Some(now);
                warn!(alert_id = %alert.id, key = %alert.key, "Alert escalated");
                events.push(AlertEvent::Escalated(alert.clone()));
            }
        }

        events
    }

    /// 人工确认；已确认时返回 `Ok(None)`
    pub fn acknowledge(&mut self, id: &str, now: DateTime<Utc>) -> Result<Option<AlertEvent>, AlertError> {
        let alert = self
            .alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;

        if alert.resolved {
            return Err(AlertError::AlreadyResolved(id.to_string()));
        }
        if alert.acknowledged {
            return Ok(None);
        }

        alert.acknowledged = true;
        alert.acknowledged_at = Some(now);
        info!(alert_id = %id, "Alert acknowledged");
        Ok(Some(AlertEvent::Acknowledged(alert.clone())))
    }

    /// 恢复告警（人工或自动）
    pub fn resolve(&mut self, id: &str, reason: &str, now: DateTime<Utc>) -> Result<AlertEvent, AlertError> {
        let alert = self
            .alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;

        if alert.resolved {
            return Err(AlertError::AlreadyResolved(id.to_string()));
        }

        alert.resolved = true;
        alert.resolved_at = Some(now);
        alert.resolved_reason = Some(reason.to_string());
        info!(alert_id = %id, reason = %reason, "Alert resolved");

        let resolved = alert.clone();
        self.open.remove(&resolved.key);
        self.resolved_order.push_back(resolved.id.clone());
        self.evict_history();

        Ok(AlertEvent::Resolved(resolved))
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    pub fn open_alert_for(&self, key: &MetricKey) -> Option<&Alert> {
        self.open.get(key).and_then(|id| self.alerts.get(id))
    }

    pub fn open_alerts(&self) -> Vec<&Alert> {
        self.open.values().filter_map(|id| self.alerts.get(id)).collect()
    }

    /// 未恢复告警：级别降序，再按时间降序
    pub fn active_alerts(&self, limit: usize) -> Vec<Alert> {
        let mut active: Vec<Alert> = self.open_alerts().into_iter().cloned().collect();
        active.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        active.truncate(limit);
        active
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn critical_open_count(&self) -> usize {
        self.open_alerts()
            .iter()
            .filter(|a| a.level == AlertLevel::Critical)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.alerts.len()
    }

    /// 最近恢复的告警，按恢复顺序
    pub fn history(&self, limit: usize) -> Vec<Alert> {
        let start = self.resolved_order.len().saturating_sub(limit);
        self.resolved_order
            .iter()
            .skip(start)
            .filter_map(|id| self.alerts.get(id).cloned())
            .collect()
    }

    fn open_ids(&self) -> Vec<String> {
        let mut alerts: Vec<&Alert> = self.open_alerts();
        alerts.sort_by_key(|a| a.created_at);
        alerts.into_iter().map(|a| a.id.clone()).collect()
    }

    fn evict_history(&mut self) {
        while self.resolved_order.len() > self.policy.max_history {
            if let Some(id) = self.resolved_order.pop_front() {
                self.alerts.remove(&id);
            }
        }
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        let mut engine = Self::new(LifecyclePolicy::default());
        for rule in ThresholdRule::defaults() {
            engine.add_rule(rule);
        }
        engine
    }
}
