use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use watchtower_metrics::{AlertEvent, EmergencyEvent, HealthNotice};
use watchtower_notify::DeadLetter;

/// 引擎内部事件
#[derive(Debug, Clone)]
pub enum EngineEvent {
    MetricsCollected {
        system_id: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    /// 连续失败达到上限，系统进入错误状态
    SystemFailed {
        system_id: String,
        consecutive_errors: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
    SystemRecovered {
        system_id: String,
        timestamp: DateTime<Utc>,
    },
    Alert(AlertEvent),
    Health(HealthNotice),
    Emergency(EmergencyEvent),
    DeadLetter(DeadLetter),
    Aggregated {
        interval: u64,
        keys: usize,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::MetricsCollected { .. } => "metrics_collected",
            EngineEvent::SystemFailed { .. } => "system_failed",
            EngineEvent::SystemRecovered { .. } => "system_recovered",
            EngineEvent::Alert(_) => "alert",
            EngineEvent::Health(_) => "health_changed",
            EngineEvent::Emergency(_) => "emergency",
            EngineEvent::DeadLetter(_) => "dead_letter",
            EngineEvent::Aggregated { .. } => "aggregated",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

pub type SharedEventBus = Arc<EventBus>;
