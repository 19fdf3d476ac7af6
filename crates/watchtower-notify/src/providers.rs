use crate::message::{NotificationTask, NotifyChannel};
use crate::notifier::{Notifier, NotifyError, NotifyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

// ============================================================================
// 渠道配置
// ============================================================================

/// 所有通知渠道的配置，未启用的渠道不会创建通知器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub email: EmailConfig,
    pub slack: SlackConfig,
    pub sms: SmsConfig,
    pub webhook: WebhookConfig,
}

impl ChannelsConfig {
    pub fn enabled_channels(&self) -> Vec<NotifyChannel> {
        let mut channels = Vec::new();
        if self.email.enabled {
            channels.push(NotifyChannel::Email);
        }
        if self.slack.enabled {
            channels.push(NotifyChannel::Slack);
        }
        if self.sms.enabled {
            channels.push(NotifyChannel::Sms);
        }
        if self.webhook.enabled {
            channels.push(NotifyChannel::Webhook);
        }
        channels
    }
}

/// 按配置创建启用的通知器
pub fn build_notifiers(config: &ChannelsConfig) -> Result<Vec<Arc<dyn Notifier>>, NotifyError> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.email.enabled {
        notifiers.push(Arc::new(EmailNotifier::new(config.email.clone())?));
    }
    if config.slack.enabled {
        notifiers.push(Arc::new(SlackNotifier::new(config.slack.clone())?));
    }
    if config.sms.enabled {
        notifiers.push(Arc::new(SmsNotifier::new(config.sms.clone())?));
    }
    if config.webhook.enabled {
        notifiers.push(Arc::new(WebhookNotifier::new(config.webhook.clone())?));
    }

    for notifier in &notifiers {
        info!(channel = %notifier.channel(), "Notification channel enabled");
    }

    Ok(notifiers)
}

fn require(value: &str, field: &str) -> Result<(), NotifyError> {
    if value.trim().is_empty() {
        return Err(NotifyError::InvalidConfig(format!("{} is required", field)));
    }
    Ok(())
}

// ============================================================================
// 邮件通知
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: Vec::new(),
        }
    }
}

pub struct EmailNotifier {
    config: EmailConfig,
    mailer: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, Tokio1Executor};

        require(&config.smtp_host, "email.smtp_host")?;
        require(&config.from, "email.from")?;
        if config.to.is_empty() {
            return Err(NotifyError::InvalidConfig("email.to must list at least one recipient".to_string()));
        }

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Self { config, mailer })
    }

    fn build_email(&self, task: &NotificationTask) -> Result<lettre::Message, NotifyError> {
        use lettre::message::header::ContentType;

        let mut builder = lettre::Message::builder()
            .from(self.config.from.parse()?)
            .subject(task.title())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.config.to {
            builder = builder.to(recipient.parse()?);
        }

        Ok(builder.body(format!(
            "{}\n\nType: {}\nPriority: {}\nTime: {}\n\n{}",
            task.summary(),
            task.kind.as_str(),
            task.original_priority.as_str(),
            task.created_at.to_rfc3339(),
            serde_json::to_string_pretty(&task.payload).unwrap_or_default()
        ))?)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, task: &NotificationTask) -> Result<NotifyResult, NotifyError> {
        use lettre::AsyncTransport;

        let email = self.build_email(task)?;
        match self.mailer.send(email).await {
            Ok(_) => Ok(NotifyResult::success()),
            Err(e) => Ok(NotifyResult::failure(format!("Email send failed: {}", e))),
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Email
    }
}

// ============================================================================
// Slack 通知
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub channel: Option<String>,
}

pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Result<Self, NotifyError> {
        require(&config.webhook_url, "slack.webhook_url")?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn build_message(&self, task: &NotificationTask) -> serde_json::Value {
        let color = match (task.kind.as_str(), task.level()) {
            ("alert_resolved", _) => "good",
            ("emergency", _) | (_, Some("critical")) => "danger",
            (_, Some("warning")) => "warning",
            _ => "good",
        };

        let mut body = serde_json::json!({
            "attachments": [{
                "color": color,
                "title": task.title(),
                "text": task.summary(),
                "fields": [
                    {
                        "title": "Type",
                        "value": task.kind.as_str(),
                        "short": true
                    },
                    {
                        "title": "Time",
                        "value": task.created_at.to_rfc3339(),
                        "short": true
                    }
                ]
            }]
        });

        if let Some(channel) = &self.config.channel {
            body["channel"] = serde_json::Value::String(channel.clone());
        }
        body
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, task: &NotificationTask) -> Result<NotifyResult, NotifyError> {
        let body = self.build_message(task);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Slack failed: {}",
                response.status()
            )))
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Slack
    }
}

// ============================================================================
// 短信通知（HTTP 短信网关）
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub to: Vec<String>,
}

pub struct SmsNotifier {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsNotifier {
    const MAX_LENGTH: usize = 160;

    pub fn new(config: SmsConfig) -> Result<Self, NotifyError> {
        require(&config.gateway_url, "sms.gateway_url")?;
        if config.to.is_empty() {
            return Err(NotifyError::InvalidConfig("sms.to must list at least one number".to_string()));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn build_message(&self, task: &NotificationTask) -> serde_json::Value {
        let text: String = format!("{} {}", task.title(), task.summary())
            .chars()
            .take(Self::MAX_LENGTH)
            .collect();

        serde_json::json!({
            "to": self.config.to,
            "message": text,
        })
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, task: &NotificationTask) -> Result<NotifyResult, NotifyError> {
        let mut request = self
            .client
            .post(&self.config.gateway_url)
            .json(&self.build_message(task));

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "SMS gateway failed: {}",
                response.status()
            )))
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Sms
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub headers: HashMap<String, String>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        require(&config.url, "webhook.url")?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, task: &NotificationTask) -> Result<NotifyResult, NotifyError> {
        let mut request = self.client.post(&self.config.url);

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.json(task).send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Webhook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Priority, TaskKind};
    use serde_json::json;

    fn critical_task() -> NotificationTask {
        NotificationTask::new(
            TaskKind::Alert,
            Priority::High,
            json!({
                "message": "performance.cpu_usage above threshold: value=97.00, threshold=80.00",
                "level": "critical",
                "context": {"system": "performance"}
            }),
        )
    }

    #[test]
    fn test_disabled_channels_build_nothing() {
        let notifiers = build_notifiers(&ChannelsConfig::default()).unwrap();
        assert!(notifiers.is_empty());
        assert!(ChannelsConfig::default().enabled_channels().is_empty());
    }

    #[test]
    fn test_enabled_channel_requires_endpoint() {
        let config = ChannelsConfig {
            slack: SlackConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(build_notifiers(&config), Err(NotifyError::InvalidConfig(_))));
    }

    #[test]
    fn test_slack_message() {
        let notifier = SlackNotifier::new(SlackConfig {
            enabled: true,
            webhook_url: "https://hooks.slack.com/services/T000/B000/XXX".to_string(),
            channel: Some("#ops".to_string()),
        })
        .unwrap();

        let body = notifier.build_message(&critical_task());
        assert_eq!(body["attachments"][0]["color"], "danger");
        assert_eq!(body["attachments"][0]["title"], "[ALERT] performance");
        assert_eq!(body["channel"], "#ops");
    }

    #[test]
    fn test_sms_message_is_truncated() {
        let notifier = SmsNotifier::new(SmsConfig {
            enabled: true,
            gateway_url: "https://sms.example.com/send".to_string(),
            api_key: None,
            to: vec!["+15550100".to_string()],
        })
        .unwrap();

        let mut task = critical_task();
        task.payload["message"] = json!("x".repeat(400));
        let body = notifier.build_message(&task);
        assert_eq!(body["message"].as_str().unwrap().chars().count(), 160);
        assert_eq!(body["to"][0], "+15550100");
    }

    #[tokio::test]
    async fn test_email_message() {
        let notifier = EmailNotifier::new(EmailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            from: "monitor@example.com".to_string(),
            to: vec!["ops@example.com".to_string(), "oncall@example.com".to_string()],
            ..Default::default()
        })
        .unwrap();

        let email = notifier.build_email(&critical_task()).unwrap();
        assert_eq!(email.envelope().to().len(), 2);
        assert_eq!(notifier.channel(), NotifyChannel::Email);
    }

    #[tokio::test]
    async fn test_email_rejects_bad_address() {
        let notifier = EmailNotifier::new(EmailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            from: "not an address".to_string(),
            to: vec!["ops@example.com".to_string()],
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(
            notifier.build_email(&critical_task()),
            Err(NotifyError::Address(_))
        ));
    }
}
