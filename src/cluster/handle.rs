//! Cluster handle: the seam between census logic and a live cluster client
//!
//! Implementations wrap whatever client the process already holds. Census
//! code never caches nodes; it asks the handle on every call because
//! membership may change between polls.

use crate::common::{RecordKey, Result, ScanTier};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// A reachable cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterNode {
    /// Node name as known to the cluster client
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Matches either `host:port` or a bare `host`
    pub fn matches(&self, address: &str) -> bool {
        address == self.host || address == self.address()
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Server-side filtered scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub namespace: String,
    /// `None` scans the whole namespace
    pub set: Option<String>,
    pub include_bin_data: bool,
    /// `None` means unbounded
    pub max_records: Option<u64>,
    pub tier: ScanTier,
}

impl ScanRequest {
    /// Header-only scan of a namespace or set
    pub fn headers(namespace: &str, set: Option<&str>, tier: ScanTier) -> Self {
        Self {
            namespace: namespace.to_string(),
            set: set.map(str::to_string),
            include_bin_data: false,
            max_records: None,
            tier,
        }
    }

    pub fn with_max_records(mut self, max: u64) -> Self {
        self.max_records = Some(max);
        self
    }
}

/// Stream of scanned records
///
/// `close` releases the server-side cursor and must be awaited on every exit
/// path, including after an error or a timeout.
#[async_trait]
pub trait RecordStream: Send {
    /// Pull the next record; `None` once the scan is exhausted
    async fn next_record(&mut self) -> Option<Result<RecordKey>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait ClusterHandle: Send + Sync {
    /// Nodes reachable right now
    fn nodes(&self) -> Vec<ClusterNode>;

    /// Send one info command to one node and return the raw response
    async fn info(&self, node: &ClusterNode, command: &str, timeout: Duration) -> Result<String>;

    /// Open a scan across the cluster
    async fn scan(&self, request: ScanRequest) -> Result<Box<dyn RecordStream>>;

    /// Truncate a namespace, or one set of it
    async fn truncate(&self, namespace: &str, set: Option<&str>) -> Result<()>;

    /// Find a node by `host:port` or `host`
    fn find_node(&self, address: &str) -> Option<ClusterNode> {
        self.nodes().into_iter().find(|n| n.matches(address))
    }
}
