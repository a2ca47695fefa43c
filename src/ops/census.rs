//! Stats-based record census
//!
//! Counts come from each node's info interface:
//! - `namespace/<ns>` reports `master_objects`, which are partition-disjoint
//!   across nodes and can be summed as-is
//! - `sets` reports every replica a node holds, so set counts are divided by
//!   the effective replication factor `min(nodes, replication-factor)`
//!
//! Any transport or parse failure on any node aborts the census: a total
//! that silently skipped one node's masters is worse than no total.

use crate::cluster::stats::{self, NamespaceStats, SetStats};
use crate::cluster::{ClusterHandle, ClusterNode};
use crate::common::{Config, QueryDuration, Result};
use futures_util::future::try_join_all;
use std::time::Duration;

/// Default timeout of one info round trip
pub const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(8);

/// How a census count was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Summed from node statistics
    Stats,
    /// Counted by a full scan; `tier` is the index into the scan policy
    Scan { tier: usize, duration: QueryDuration },
}

/// Final answer of a census query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CensusResult {
    pub count: u64,
    pub strategy: Strategy,
}

/// Scan job as listed by `query-show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub trid: Option<String>,
    pub set: Option<String>,
    pub status: String,
}

impl ScanJob {
    pub fn is_done(&self) -> bool {
        self.status.starts_with("done")
    }
}

/// Divisor applied to raw per-node set counts
pub fn effective_replication(node_count: usize, replication_factor: u32) -> u64 {
    (node_count as u64).min(replication_factor as u64).max(1)
}

pub struct ClusterCensus<'a> {
    cluster: &'a dyn ClusterHandle,
    info_timeout: Duration,
}

impl<'a> ClusterCensus<'a> {
    pub fn new(cluster: &'a dyn ClusterHandle) -> Self {
        Self {
            cluster,
            info_timeout: DEFAULT_INFO_TIMEOUT,
        }
    }

    pub fn from_config(cluster: &'a dyn ClusterHandle, config: &Config) -> Self {
        Self::new(cluster).with_info_timeout(config.info_timeout)
    }

    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    async fn request(&self, node: &ClusterNode, command: &str) -> Result<String> {
        self.cluster.info(node, command, self.info_timeout).await
    }

    /// Total master objects of `namespace` across every reachable node
    ///
    /// An empty cluster reports 0 rather than failing.
    pub async fn namespace_object_count(&self, namespace: &str) -> Result<u64> {
        let nodes = self.cluster.nodes();
        if nodes.is_empty() {
            tracing::info!("No nodes in cluster");
            return Ok(0);
        }

        let counts = try_join_all(
            nodes
                .iter()
                .map(|node| self.master_objects(node, namespace)),
        )
        .await?;
        let total: u64 = counts.iter().sum();

        tracing::info!(
            "Total number of objects in namespace {} across {} node(s): {}",
            namespace,
            nodes.len(),
            total
        );
        Ok(total)
    }

    /// `namespace_object_count` tagged with its strategy
    pub async fn namespace_census(&self, namespace: &str) -> Result<CensusResult> {
        Ok(CensusResult {
            count: self.namespace_object_count(namespace).await?,
            strategy: Strategy::Stats,
        })
    }

    /// Replication-corrected object count of one set as seen by one node
    ///
    /// `node_address` is `host:port` or `host`. An empty cluster or an
    /// unknown node yields 0.
    pub async fn set_object_count_on_node(
        &self,
        set: &str,
        namespace: &str,
        node_address: &str,
    ) -> Result<u64> {
        let nodes = self.cluster.nodes();
        if nodes.is_empty() {
            tracing::info!("No nodes in cluster");
            return Ok(0);
        }

        let Some(node) = nodes.iter().find(|n| n.matches(node_address)) else {
            tracing::info!("Node with address {} not found in the cluster", node_address);
            return Ok(0);
        };

        let replication_factor = self.replication_factor(node, namespace).await?;
        let effective = effective_replication(nodes.len(), replication_factor);
        let raw = self.set_objects(node, set, namespace).await?;
        let adjusted = raw / effective;

        tracing::info!(
            "Set {} in namespace {} on node {}: raw {} objects, effective replication factor {}, adjusted {}",
            set,
            namespace,
            node_address,
            raw,
            effective,
            adjusted
        );
        Ok(adjusted)
    }

    /// `replication-factor` of `namespace` on `node`, 1 when unreported
    pub async fn replication_factor(&self, node: &ClusterNode, namespace: &str) -> Result<u32> {
        let response = self
            .request(node, &format!("get-config:context=namespace;id={}", namespace))
            .await?;
        stats::parse_replication_factor(&response)
    }

    /// Parsed `namespace/<ns>` report of one node
    pub async fn namespace_stats(&self, node: &ClusterNode, namespace: &str) -> Result<NamespaceStats> {
        let response = self.request(node, &format!("namespace/{}", namespace)).await?;
        NamespaceStats::parse(&response)
    }

    /// Master objects of `namespace` on a single node
    pub async fn node_object_count(&self, namespace: &str, node_address: &str) -> Result<u64> {
        let Some(node) = self.locate(node_address) else {
            return Ok(0);
        };
        let count = self.master_objects(&node, namespace).await?;
        tracing::info!(
            "Logical (master_objects) count of namespace {} on node {}: {}",
            namespace,
            node_address,
            count
        );
        Ok(count)
    }

    /// Cluster-wide set count from node statistics
    ///
    /// Raw per-node counts are summed, then divided once. The replication
    /// factor is read a single time, from the first node, per call.
    pub async fn set_object_count(&self, set: &str, namespace: &str) -> Result<u64> {
        let nodes = self.cluster.nodes();
        let Some(first) = nodes.first() else {
            tracing::info!("No nodes in cluster");
            return Ok(0);
        };

        let replication_factor = self.replication_factor(first, namespace).await?;
        let raw_counts = try_join_all(
            nodes
                .iter()
                .map(|node| self.set_objects(node, set, namespace)),
        )
        .await?;
        let raw: u64 = raw_counts.iter().sum();
        let effective = effective_replication(nodes.len(), replication_factor);

        tracing::info!(
            "Set {} in namespace {}: {} replicas across {} node(s), {} records",
            set,
            namespace,
            raw,
            nodes.len(),
            raw / effective
        );
        Ok(raw / effective)
    }

    /// Raw objects of every set of `namespace` held by one node, replicas included
    pub async fn namespace_objects_on_node(&self, namespace: &str, node_address: &str) -> Result<u64> {
        let Some(node) = self.locate(node_address) else {
            return Ok(0);
        };
        let response = self.request(&node, "sets").await?;
        let sets = SetStats::parse_all(&response, namespace)?;
        Ok(sets.iter().map(|s| s.objects).sum())
    }

    /// `host:port` of every reachable node
    pub fn node_addresses(&self) -> Vec<String> {
        let addresses: Vec<String> = self.cluster.nodes().iter().map(ClusterNode::address).collect();
        tracing::info!("Found {} node(s) with addresses: {:?}", addresses.len(), addresses);
        addresses
    }

    /// Scan jobs known to one node
    pub async fn scan_jobs(&self, node: &ClusterNode) -> Result<Vec<ScanJob>> {
        let response = self.request(node, "query-show").await?;
        Ok(stats::records(&response)
            .into_iter()
            .filter_map(|record| {
                Some(ScanJob {
                    trid: record.get("trid").map(|s| s.to_string()),
                    set: record.get("set").map(|s| s.to_string()),
                    status: record.get("status")?.to_string(),
                })
            })
            .collect())
    }

    /// Scan jobs targeting `set`, across every node
    pub async fn scan_jobs_for_set(&self, set: &str) -> Result<Vec<ScanJob>> {
        let nodes = self.cluster.nodes();
        let per_node = try_join_all(nodes.iter().map(|node| self.scan_jobs(node))).await?;
        Ok(per_node
            .into_iter()
            .flatten()
            .filter(|job| job.set.as_deref() == Some(set))
            .collect())
    }

    fn locate(&self, node_address: &str) -> Option<ClusterNode> {
        if self.cluster.nodes().is_empty() {
            tracing::info!("No nodes in cluster");
            return None;
        }
        let node = self.cluster.find_node(node_address);
        if node.is_none() {
            tracing::info!("Node with address {} not found in the cluster", node_address);
        }
        node
    }

    async fn master_objects(&self, node: &ClusterNode, namespace: &str) -> Result<u64> {
        let response = self.request(node, &format!("namespace/{}", namespace)).await?;
        Ok(stats::parse_u64(&response, "master_objects")?.unwrap_or(0))
    }

    async fn set_objects(&self, node: &ClusterNode, set: &str, namespace: &str) -> Result<u64> {
        let response = self.request(node, "sets").await?;
        Ok(SetStats::parse(&response, namespace, set)?.objects)
    }
}
