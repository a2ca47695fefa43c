//! Scan-based record counting
//!
//! Counts every record header a scan returns. Tiers of the policy are tried
//! strictly in order, one at a time; the first tier that drains its stream
//! without error wins. Opening and draining share one deadline per tier. A
//! stream is closed on every exit path, including a tier timeout, so no
//! server-side cursor is left behind.

use crate::cluster::{ClusterHandle, RecordStream, ScanRequest};
use crate::common::{Config, Error, RecordKey, Result, ScanCountPolicy};
use crate::ops::census::{CensusResult, Strategy};
use std::time::Duration;
use tokio::time::Instant;

pub struct ScanCounter<'a> {
    cluster: &'a dyn ClusterHandle,
    policy: ScanCountPolicy,
}

impl<'a> ScanCounter<'a> {
    pub fn new(cluster: &'a dyn ClusterHandle, policy: ScanCountPolicy) -> Self {
        Self { cluster, policy }
    }

    pub fn from_config(cluster: &'a dyn ClusterHandle, config: &Config) -> Self {
        Self::new(cluster, config.scan_policy.clone())
    }

    pub fn policy(&self) -> &ScanCountPolicy {
        &self.policy
    }

    /// Exact number of records in `set`
    ///
    /// Fails with `NoReachableNodes` on an empty cluster, and with
    /// `ScanFailed` (carrying every tier's error) when no tier succeeds.
    pub async fn count_by_set(&self, set: &str, namespace: &str) -> Result<CensusResult> {
        let (count, tier) = self
            .scan_tiers::<u64>(namespace, Some(set), |n, _| *n += 1)
            .await?;

        tracing::info!(
            "Accurate record count in set {} (namespace {}): {}",
            set,
            namespace,
            count
        );
        Ok(CensusResult {
            count,
            strategy: Strategy::Scan {
                tier,
                duration: self.policy.tiers[tier].duration,
            },
        })
    }

    /// Keys of every record in `namespace` (or one set of it)
    pub async fn collect_keys(&self, namespace: &str, set: Option<&str>) -> Result<Vec<RecordKey>> {
        let (keys, _) = self
            .scan_tiers::<Vec<RecordKey>>(namespace, set, |keys, key| keys.push(key))
            .await?;
        Ok(keys)
    }

    /// Whether `namespace` (or one set of it) holds no record
    ///
    /// Pulls at most one record with the first tier; the answer is only
    /// `true` when the pull reports end of stream.
    pub async fn is_empty(&self, namespace: &str, set: Option<&str>) -> Result<bool> {
        self.ensure_nodes()?;
        let tier = self.policy.first()?.clone();
        let timeout = tier.total_timeout;
        let deadline = Instant::now() + timeout;
        let request = ScanRequest::headers(namespace, set, tier).with_max_records(1);

        let mut stream = self.open(request, deadline).await?;
        let first = tokio::time::timeout_at(deadline, stream.next_record()).await;
        stream.close().await;

        match first {
            Ok(None) => Ok(true),
            Ok(Some(Ok(_))) => Ok(false),
            Ok(Some(Err(e))) => Err(e),
            Err(_) => Err(scan_timeout(timeout)),
        }
    }

    fn ensure_nodes(&self) -> Result<()> {
        if self.cluster.nodes().is_empty() {
            return Err(Error::NoReachableNodes);
        }
        Ok(())
    }

    /// Run `fold` over a full scan, falling through the policy's tiers
    ///
    /// Returns the folded value and the index of the tier that produced it.
    async fn scan_tiers<T: Default>(
        &self,
        namespace: &str,
        set: Option<&str>,
        fold: fn(&mut T, RecordKey),
    ) -> Result<(T, usize)> {
        self.ensure_nodes()?;
        self.policy.validate()?;

        let mut causes = Vec::new();
        for (idx, tier) in self.policy.tiers.iter().enumerate() {
            let request = ScanRequest::headers(namespace, set, tier.clone());
            match self.attempt(request, fold).await {
                Ok(value) => {
                    if idx > 0 {
                        tracing::info!("Scan succeeded with fallback tier {}", tier.duration);
                    }
                    return Ok((value, idx));
                }
                Err(e) => {
                    tracing::warn!("{} scan failed: {}", tier.duration, e);
                    causes.push((tier.duration.to_string(), e));
                }
            }
        }

        Err(Error::ScanFailed {
            namespace: namespace.to_string(),
            set: set.unwrap_or("*").to_string(),
            causes,
        })
    }

    async fn attempt<T: Default>(&self, request: ScanRequest, fold: fn(&mut T, RecordKey)) -> Result<T> {
        let timeout = request.tier.total_timeout;
        let deadline = Instant::now() + timeout;
        let mut stream = self.open(request, deadline).await?;

        let mut acc = T::default();
        let drained =
            tokio::time::timeout_at(deadline, drain(stream.as_mut(), &mut acc, fold)).await;
        stream.close().await;

        match drained {
            Ok(Ok(())) => Ok(acc),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(scan_timeout(timeout)),
        }
    }

    /// Open a scan under the tier deadline shared with draining
    ///
    /// An open that misses the deadline is dropped before any stream exists,
    /// so there is nothing to close.
    async fn open(&self, request: ScanRequest, deadline: Instant) -> Result<Box<dyn RecordStream>> {
        let timeout = request.tier.total_timeout;
        match tokio::time::timeout_at(deadline, self.cluster.scan(request)).await {
            Ok(opened) => opened,
            Err(_) => Err(scan_timeout(timeout)),
        }
    }
}

async fn drain<T>(stream: &mut dyn RecordStream, acc: &mut T, fold: fn(&mut T, RecordKey)) -> Result<()> {
    while let Some(record) = stream.next_record().await {
        fold(acc, record?);
    }
    Ok(())
}

fn scan_timeout(timeout: Duration) -> Error {
    Error::Timeout(format!("scan did not finish within {:?}", timeout))
}
