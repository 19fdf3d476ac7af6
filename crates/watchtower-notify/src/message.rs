use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 通知任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Alert,
    AlertResolved,
    AlertEscalated,
    Emergency,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Alert => "alert",
            TaskKind::AlertResolved => "alert_resolved",
            TaskKind::AlertEscalated => "alert_escalated",
            TaskKind::Emergency => "emergency",
        }
    }
}

/// 优先级，`High > Normal > Low`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    /// 邮件
    Email,
    /// Slack
    Slack,
    /// 短信
    Sms,
    /// Webhook
    Webhook,
}

impl NotifyChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyChannel::Email => "email",
            NotifyChannel::Slack => "slack",
            NotifyChannel::Sms => "sms",
            NotifyChannel::Webhook => "webhook",
        }
    }
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 通知任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTask {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: TaskKind,

    pub priority: Priority,

    /// 入队时的优先级，重试降级不改变它
    pub original_priority: Priority,

    pub payload: serde_json::Value,

    pub retry_count: u32,

    pub created_at: DateTime<Utc>,

    /// 只投递到这些渠道；`None` 表示所有启用的渠道
    pub channels: Option<Vec<NotifyChannel>>,
}

impl NotificationTask {
    pub fn new(kind: TaskKind, priority: Priority, payload: serde_json::Value) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let created_at = Utc::now();
        Self {
            id: format!("notification_{}_{}", created_at.timestamp_millis(), &suffix[..9]),
            kind,
            priority,
            original_priority: priority,
            payload,
            retry_count: 0,
            created_at,
            channels: None,
        }
    }

    pub fn targets(&self, channel: NotifyChannel) -> bool {
        self.channels
            .as_ref()
            .map_or(true, |channels| channels.contains(&channel))
    }

    /// 通知标题
    pub fn title(&self) -> String {
        let system = self
            .payload
            .pointer("/context/system")
            .and_then(|v| v.as_str());

        match (self.kind, system) {
            (TaskKind::Alert, Some(system)) => format!("[ALERT] {}", system),
            (TaskKind::AlertResolved, Some(system)) => format!("[RESOLVED] {}", system),
            (TaskKind::AlertEscalated, Some(system)) => format!("[ESCALATED] {}", system),
            (TaskKind::Emergency, _) => "[EMERGENCY] Monitoring emergency".to_string(),
            (kind, None) => format!("[{}]", kind.as_str().to_uppercase()),
        }
    }

    /// 通知正文
    pub fn summary(&self) -> String {
        if let Some(message) = self.payload.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
        if let Some(kind) = self.payload.get("kind").and_then(|v| v.as_str()) {
            let count = self
                .payload
                .get("alert_ids")
                .and_then(|v| v.as_array())
                .map_or(0, |ids| ids.len());
            return format!("{} ({} correlated alerts)", kind, count);
        }
        self.payload.to_string()
    }

    pub fn level(&self) -> Option<&str> {
        self.payload.get("level").and_then(|v| v.as_str())
    }
}
