use crate::alert::{Alert, AlertLevel};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error};

/// 紧急事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    MultipleCriticalAlerts,
    SystemFailure,
}

impl EmergencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyKind::MultipleCriticalAlerts => "multiple_critical_alerts",
            EmergencyKind::SystemFailure => "system_failure",
        }
    }
}

/// 参与关联的告警摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedAlert {
    pub id: String,
    pub level: AlertLevel,
    pub message: String,
    pub system: String,
    pub metric: String,
}

impl From<&Alert> for CorrelatedAlert {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id.clone(),
            level: alert.level,
            message: alert.message.clone(),
            system: alert.context.system.clone(),
            metric: alert.context.metric.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEvent {
    pub id: String,
    pub kind: EmergencyKind,
    pub alert_ids: Vec<String>,
    pub alerts: Vec<CorrelatedAlert>,
    pub timestamp: DateTime<Utc>,
}

/// 紧急检测策略
#[derive(Debug, Clone)]
pub struct EmergencyPolicy {
    /// 关联窗口
    pub window: Duration,

    /// 窗口内严重告警数量阈值
    pub min_critical: usize,

    /// 核心指标严重告警数量阈值
    pub min_core: usize,

    pub core_metrics: Vec<String>,

    pub max_history: usize,
}

impl Default for EmergencyPolicy {
    fn default() -> Self {
        Self {
            window: Duration::minutes(5),
            min_critical: 3,
            min_core: 2,
            core_metrics: vec![
                "cpu_usage".to_string(),
                "memory_usage".to_string(),
                "response_time".to_string(),
            ],
            max_history: 100,
        }
    }
}

/// 紧急事件检测器
///
/// 条件持续期间只产生一次事件；条件消失后重新布防。
pub struct EmergencyDetector {
    policy: EmergencyPolicy,
    latched: bool,
    history: VecDeque<EmergencyEvent>,
    total_raised: u64,
}

impl EmergencyDetector {
    pub fn new(policy: EmergencyPolicy) -> Self {
        Self {
            policy,
            latched: false,
            history: VecDeque::new(),
            total_raised: 0,
        }
    }

    /// 用当前未恢复的告警检查紧急条件
    ///
    /// 多严重告警优先于系统故障判定。
    pub fn check<'a, I>(&mut self, open_alerts: I, now: DateTime<Utc>) -> Option<EmergencyEvent>
    where
        I: IntoIterator<Item = &'a Alert>,
    {
        let window_start = now - self.policy.window;
        let mut recent_critical: Vec<&Alert> = open_alerts
            .into_iter()
            .filter(|a| a.is_open() && a.level == AlertLevel::Critical && a.created_at >= window_start)
            .collect();
        recent_critical.sort_by_key(|a| a.created_at);

        let condition = if recent_critical.len() >= self.policy.min_critical {
            Some((EmergencyKind::MultipleCriticalAlerts, recent_critical))
        } else {
            let core: Vec<&Alert> = recent_critical
                .into_iter()
                .filter(|a| self.policy.core_metrics.contains(&a.context.metric))
                .collect();
            (core.len() >= self.policy.min_core).then_some((EmergencyKind::SystemFailure, core))
        };

        let Some((kind, alerts)) = condition else {
            if self.latched {
                debug!("Emergency condition cleared, detector re-armed");
            }
            self.latched = false;
            return None;
        };

        if self.latched {
            return None;
        }
        self.latched = true;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let event = EmergencyEvent {
            id: format!("emergency_{}_{}", now.timestamp_millis(), &suffix[..9]),
            kind,
            alert_ids: alerts.iter().map(|a| a.id.clone()).collect(),
            alerts: alerts.iter().map(|a| CorrelatedAlert::from(*a)).collect(),
            timestamp: now,
        };

        error!(
            emergency_id = %event.id,
            kind = %kind.as_str(),
            alerts = event.alert_ids.len(),
            "Emergency detected"
        );

        self.total_raised += 1;
        self.history.push_back(event.clone());
        while self.history.len() > self.policy.max_history {
            self.history.pop_front();
        }

        Some(event)
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn total_raised(&self) -> u64 {
        self.total_raised
    }

    pub fn history(&self) -> impl Iterator<Item = &EmergencyEvent> {
        self.history.iter()
    }
}

impl Default for EmergencyDetector {
    fn default() -> Self {
        Self::new(EmergencyPolicy::default())
    }
}
