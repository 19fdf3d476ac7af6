pub mod global;
pub mod loader;

pub use global::{
    default_systems, default_thresholds, AggregationConfig, CollectorKind, EmergencyConfig, EngineConfig,
    MonitorConfig, NotificationConfig, PathsConfig, PerformanceConfig, SystemConfig, ThresholdConfig,
};
pub use loader::{validate, ConfigLoader, ENV_PREFIX};
