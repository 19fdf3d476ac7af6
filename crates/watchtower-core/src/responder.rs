use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use watchtower_logging::{Logger, TracingLogger};
use watchtower_metrics::{EmergencyEvent, EmergencyKind};

/// 紧急处置动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyProcedure {
    ScaleOut,
    EnterMaintenance,
}

/// 根据紧急事件选择处置动作
///
/// 系统故障触发扩容；关联告警数达到阈值时进入维护模式。
pub fn plan_procedures(event: &EmergencyEvent, maintenance_threshold: usize) -> Vec<EmergencyProcedure> {
    let mut procedures = Vec::new();
    if event.kind == EmergencyKind::SystemFailure {
        procedures.push(EmergencyProcedure::ScaleOut);
    }
    if event.alert_ids.len() >= maintenance_threshold {
        procedures.push(EmergencyProcedure::EnterMaintenance);
    }
    procedures
}

/// 紧急处置的外部协作方
#[async_trait]
pub trait EmergencyResponder: Send + Sync {
    async fn scale_out(&self, event: &EmergencyEvent);

    async fn enter_maintenance(&self, event: &EmergencyEvent);

    fn name(&self) -> &str {
        "responder"
    }
}

/// 执行计划中的处置动作
pub async fn execute_procedures(
    responder: &dyn EmergencyResponder,
    event: &EmergencyEvent,
    maintenance_threshold: usize,
) -> Vec<EmergencyProcedure> {
    let procedures = plan_procedures(event, maintenance_threshold);
    for procedure in &procedures {
        info!(emergency_id = %event.id, responder = %responder.name(), procedure = ?procedure, "Executing emergency procedure");
        match procedure {
            EmergencyProcedure::ScaleOut => responder.scale_out(event).await,
            EmergencyProcedure::EnterMaintenance => responder.enter_maintenance(event).await,
        }
    }
    procedures
}

/// 只记录日志的默认实现
pub struct LoggingResponder {
    logger: Arc<dyn Logger>,
}

impl LoggingResponder {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl Default for LoggingResponder {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger::new("emergency")))
    }
}

#[async_trait]
impl EmergencyResponder for LoggingResponder {
    async fn scale_out(&self, event: &EmergencyEvent) {
        self.logger.warning(&format!(
            "Scaling out in response to {} ({} alerts)",
            event.kind.as_str(),
            event.alert_ids.len()
        ));
    }

    async fn enter_maintenance(&self, event: &EmergencyEvent) {
        self.logger.warning(&format!(
            "Entering maintenance mode in response to {} ({} alerts)",
            event.kind.as_str(),
            event.alert_ids.len()
        ));
    }

    fn name(&self) -> &str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn event(kind: EmergencyKind, alerts: usize) -> EmergencyEvent {
        EmergencyEvent {
            id: "emergency_test".to_string(),
            kind,
            alert_ids: (0..alerts).map(|i| format!("alert_{}", i)).collect(),
            alerts: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[derive(Default)]
    struct RecordingResponder {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EmergencyResponder for RecordingResponder {
        async fn scale_out(&self, _event: &EmergencyEvent) {
            self.calls.lock().unwrap().push("scale_out");
        }

        async fn enter_maintenance(&self, _event: &EmergencyEvent) {
            self.calls.lock().unwrap().push("enter_maintenance");
        }
    }

    #[test]
    fn test_plan_system_failure() {
        let plan = plan_procedures(&event(EmergencyKind::SystemFailure, 2), 5);
        assert_eq!(plan, vec![EmergencyProcedure::ScaleOut]);
    }

    #[test]
    fn test_plan_maintenance_threshold() {
        assert!(plan_procedures(&event(EmergencyKind::MultipleCriticalAlerts, 4), 5).is_empty());
        assert_eq!(
            plan_procedures(&event(EmergencyKind::MultipleCriticalAlerts, 5), 5),
            vec![EmergencyProcedure::EnterMaintenance]
        );
    }

    #[tokio::test]
    async fn test_execute_calls_responder() {
        let responder = RecordingResponder::default();
        execute_procedures(&responder, &event(EmergencyKind::SystemFailure, 6), 5).await;
        assert_eq!(*responder.calls.lock().unwrap(), vec!["scale_out", "enter_maintenance"]);
    }
}
