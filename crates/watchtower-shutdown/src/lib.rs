pub mod coordinator;
pub mod flush;
pub mod inflight;
pub mod signal;

pub use coordinator::{ShutdownCoordinator, ShutdownCoordinatorBuilder, ShutdownPhase, ShutdownReport};
pub use flush::{FlushError, FlushHook, FlushManager, FlushReport};
pub use inflight::{DrainOutcome, InflightGuard, InflightTracker};
pub use signal::{ShutdownSignal, SignalHandler};
