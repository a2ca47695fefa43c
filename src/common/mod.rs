//! Common utilities and types shared across kvcensus

pub mod config;
pub mod error;
pub mod logging;
pub mod partition;
pub mod utils;

pub use config::{Config, QueryDuration, ScanCountPolicy, ScanTier, WaitSchedule};
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use partition::{
    filter_by_partition, group_by_partition, partition_of, select_unique_partitions, Digest,
    PartitionId, RecordKey, TOTAL_PARTITIONS,
};
pub use utils::{parse_duration, retry_with_backoff};
