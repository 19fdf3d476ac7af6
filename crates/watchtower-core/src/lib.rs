pub mod bus;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod journal;
pub mod registry;
pub mod report;
pub mod responder;
pub mod scheduler;

pub use bus::{EngineEvent, EventBus};
pub use dashboard::{DashboardSnapshot, FileSnapshotSink, OverallHealth, PerformanceSummary, SnapshotSink};
pub use engine::{CollectionOutcome, Engine, EngineBuilder, FailureReport, IngestReport, SweepReport};
pub use error::{EngineError, Result};
pub use journal::{EventJournal, JournalHandle};
pub use registry::{FailureOutcome, MonitoredSystem, SystemRegistry, SystemStatus};
pub use report::{write_report, MonitoringReport, ReportFlushHook, ReportStatistics, SnapshotFlushHook};
pub use responder::{execute_procedures, plan_procedures, EmergencyProcedure, EmergencyResponder, LoggingResponder};
pub use scheduler::Scheduler;
