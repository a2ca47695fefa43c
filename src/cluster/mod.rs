//! Cluster access
//!
//! - `handle`: the `ClusterHandle` seam (nodes, info, scan, truncate)
//! - `info`: framed info protocol client over TCP
//! - `stats`: parser for `key=value;` / `key=value:` info responses

pub mod handle;
pub mod info;
pub mod stats;

pub use handle::{ClusterHandle, ClusterNode, RecordStream, ScanRequest};
pub use info::TcpInfoClient;
pub use stats::{NamespaceStats, SetStats};
