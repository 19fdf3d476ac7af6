use crate::bus::EngineEvent;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};
use watchtower_logging::{EventLog, LogEntry, LogLevel, LogStream};
use watchtower_metrics::{AlertEvent, AlertLevel, HealthStatus};

/// 把引擎事件写入事件日志文件的订阅者
pub struct EventJournal {
    log: EventLog,
}

impl EventJournal {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// 事件对应的日志流与记录；不落盘的事件返回 None
    pub fn entry_for(event: &EngineEvent) -> Option<(LogStream, LogEntry)> {
        match event {
            EngineEvent::Alert(alert_event) => {
                let alert = alert_event.alert();
                let level = match (alert_event, alert.level) {
                    (AlertEvent::Resolved(_), _) | (AlertEvent::Acknowledged(_), _) => LogLevel::Info,
                    (_, AlertLevel::Critical) => LogLevel::Error,
                    (_, AlertLevel::Warning) => LogLevel::Warning,
                    (_, AlertLevel::Info) => LogLevel::Info,
                };
                let entry = LogEntry::new(level, format!("alert_{}", alert_event.kind()))
                    .with_timestamp(alert_timestamp(alert_event))
                    .with_field("system_id", json!(alert.key.system_id))
                    .with_field("alert", serde_json::to_value(alert).ok()?);
                Some((LogStream::Alerts, entry))
            }
            EngineEvent::Health(notice) => {
                let level = match notice.status {
                    HealthStatus::Healthy => LogLevel::Info,
                    HealthStatus::Warning => LogLevel::Warning,
                    HealthStatus::Critical | HealthStatus::Error => LogLevel::Error,
                };
                let entry = LogEntry::new(level, "health_changed")
                    .with_timestamp(notice.timestamp)
                    .with_field("system_id", json!(notice.system_id))
                    .with_field("notice", serde_json::to_value(notice).ok()?);
                Some((LogStream::Health, entry))
            }
            EngineEvent::Emergency(emergency) => {
                let entry = LogEntry::new(LogLevel::Error, "emergency_detected")
                    .with_timestamp(emergency.timestamp)
                    .with_field("emergency", serde_json::to_value(emergency).ok()?);
                Some((LogStream::Emergency, entry))
            }
            EngineEvent::DeadLetter(dead) => {
                let entry = LogEntry::new(LogLevel::Error, "notification_dead_letter")
                    .with_timestamp(dead.dropped_at)
                    .with_field("dead_letter", serde_json::to_value(dead).ok()?);
                Some((LogStream::Errors, entry))
            }
            EngineEvent::SystemFailed {
                system_id,
                consecutive_errors,
                error,
                timestamp,
            } => {
                let entry = LogEntry::new(LogLevel::Error, "collection_failed")
                    .with_timestamp(*timestamp)
                    .with_fields(json!({
                        "system_id": system_id,
                        "consecutive_errors": consecutive_errors,
                        "error": error,
                    }));
                Some((LogStream::Errors, entry))
            }
            EngineEvent::MetricsCollected { .. }
            | EngineEvent::SystemRecovered { .. }
            | EngineEvent::Aggregated { .. } => None,
        }
    }

    pub async fn record(&self, event: &EngineEvent) {
        match Self::entry_for(event) {
            Some((stream, entry)) => self.log.record(stream, entry).await,
            None => debug!(event = %event.name(), "Event not journaled"),
        }
    }

    /// 启动订阅任务
    ///
    /// 任务独立于关闭广播运行，排空期间完成的采集与投递产生的事件同样落盘；
    /// 调用 [`JournalHandle::close`] 后写完已排队的事件再退出。
    pub fn spawn(self, mut events: broadcast::Receiver<EngineEvent>) -> JournalHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => self.record(&event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event journal lagged behind the event bus");
                        }
                        Err(RecvError::Closed) => return,
                    },
                    _ = &mut stop_rx => break,
                }
            }

            loop {
                match events.try_recv() {
                    Ok(event) => self.record(&event).await,
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event journal lagged behind the event bus");
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
            debug!("Event journal stopped");
        });

        JournalHandle {
            stop: Some(stop_tx),
            handle,
        }
    }
}

/// 事件日志任务句柄
pub struct JournalHandle {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl JournalHandle {
    /// 停止订阅并等待积压事件写完
    pub async fn close(mut self) -> Result<(), JoinError> {
        if let Some(stop) = self.stop.take() {
            // 任务已因总线关闭退出时发送失败，忽略即可
            let _ = stop.send(());
        }
        self.handle.await
    }
}

fn alert_timestamp(event: &AlertEvent) -> chrono::DateTime<chrono::Utc> {
    let alert = event.alert();
    match event {
        AlertEvent::Triggered(_) => alert.created_at,
        AlertEvent::Resolved(_) => alert.resolved_at.unwrap_or(alert.created_at),
        AlertEvent::Escalated(_) => alert.escalated_at.unwrap_or(alert.created_at),
        AlertEvent::Acknowledged(_) => alert.acknowledged_at.unwrap_or(alert.created_at),
    }
}
