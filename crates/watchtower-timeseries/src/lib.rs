pub mod model;
pub mod store;
pub mod query;
pub mod rollup;
pub mod cleanup;
pub mod archive;

pub use model::{MetricKey, MetricSample};
pub use store::{MetricStore, StoreError, StorePolicy};
pub use query::{RecentWindow, WindowStats};
pub use rollup::{AggregationBucket, RollupPolicy, RollupStats};
pub use cleanup::CleanupStats;
pub use archive::{ArchiveError, ArchiveRecord, ArchiveStats, DataArchiver};
