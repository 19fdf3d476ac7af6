pub mod alert;
pub mod collector;
pub mod emergency;
pub mod health;
pub mod system;
pub mod telemetry;

pub use alert::{Alert, AlertContext, AlertEngine, AlertError, AlertEvent, AlertLevel, LifecyclePolicy, ThresholdRule};
pub use collector::{parse_metric_payload, CollectError, Collector, HttpCollector, MetricBatch};
pub use emergency::{CorrelatedAlert, EmergencyDetector, EmergencyEvent, EmergencyKind, EmergencyPolicy};
pub use health::{HealthNotice, HealthPolicy, HealthScorer, HealthStatus, Penalty, PenaltyRule};
pub use system::HostCollector;
pub use telemetry::EngineTelemetry;
