pub mod event_log;
pub mod logger;
pub mod structured;
pub mod subscriber;

pub use event_log::EventLog;
pub use logger::{Logger, TracingLogger};
pub use structured::{LogEntry, LogLevel, LogStream};
pub use subscriber::{init_tracing, LoggingConfig, LoggingError};
