//! # kvcensus
//!
//! Record census and convergence checks for a partitioned, replicated
//! key-value cluster:
//! - Stats-based counts with replication-factor correction
//! - Scan-based exact counts with tiered query-duration fallback
//! - Bounded polling for "has this truncate/restore converged yet?"
//! - Client-side partition mapping of record digests
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            ConvergenceWaiter                 │
//! │   (poll delay / interval / deadline)         │
//! └───────────┬──────────────────┬───────────────┘
//!             │                  │
//!   ┌─────────▼────────┐  ┌──────▼─────────────┐
//!   │  ClusterCensus   │  │   ScanCounter      │
//!   │  info + parser   │  │   tier 1 → tier 2  │
//!   └─────────┬────────┘  └──────┬─────────────┘
//!             │   ClusterHandle  │
//!   ┌─────────▼──────────────────▼─────────────┐
//!   │ nodes() · info() · scan() · truncate()   │
//!   └──────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let config = Config::load(Some(Path::new("kvcensus.toml")))?;
//! kvcensus::init_tracing(&config.log_level);
//!
//! let census = ClusterCensus::from_config(&cluster, &config);
//! let masters = census.namespace_object_count("test").await?;
//!
//! let counter = ScanCounter::from_config(&cluster, &config);
//! let exact = counter.count_by_set("demo", "test").await?;
//!
//! truncate_set(&cluster, &config, "test", "demo").await?;
//! ```

pub mod cluster;
pub mod common;
pub mod ops;

// Re-export commonly used types
pub use cluster::{ClusterHandle, ClusterNode, RecordStream, ScanRequest, TcpInfoClient};
pub use common::{init_tracing, Config, Error, Result};
pub use ops::{CensusResult, ClusterCensus, ConvergenceWaiter, ScanCounter, Strategy};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
