//! Record identity and partition mapping
//!
//! - Digests identify records cluster-wide (20 bytes, computed by the cluster client)
//! - Partitions are derived from the first two digest bytes, exactly as the
//!   cluster assigns them, so client-side grouping matches server ownership

use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Number of partitions every namespace is split into
pub const TOTAL_PARTITIONS: u16 = 4096;

/// Partition index in `[0, TOTAL_PARTITIONS)`
pub type PartitionId = u16;

/// 20-byte record digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 20]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Partition this digest belongs to
    pub fn partition(&self) -> PartitionId {
        partition_of(self)
    }
}

impl From<[u8; 20]> for Digest {
    fn from(bytes: [u8; 20]) -> Self {
        Digest(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Header-only identity of a record, as yielded by a scan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub namespace: String,
    pub set: Option<String>,
    pub digest: Digest,
}

impl RecordKey {
    pub fn partition(&self) -> PartitionId {
        partition_of(&self.digest)
    }
}

/// Compute the partition of a digest
pub fn partition_of(digest: &Digest) -> PartitionId {
    let bytes = digest.as_bytes();
    u16::from_le_bytes([bytes[0], bytes[1]]) % TOTAL_PARTITIONS
}

/// Keep only the keys living in `partition`
pub fn filter_by_partition(keys: &[RecordKey], partition: PartitionId) -> Vec<RecordKey> {
    keys.iter()
        .filter(|k| k.partition() == partition)
        .cloned()
        .collect()
}

/// Bucket keys by partition
pub fn group_by_partition(keys: &[RecordKey]) -> BTreeMap<PartitionId, Vec<RecordKey>> {
    let mut buckets: BTreeMap<PartitionId, Vec<RecordKey>> = BTreeMap::new();
    for key in keys {
        buckets.entry(key.partition()).or_default().push(key.clone());
    }
    buckets
}

/// Draw digests from `candidates` until `n` of them sit in pairwise distinct partitions
///
/// Candidates landing in an already used partition are skipped.
pub fn select_unique_partitions<I>(candidates: I, n: usize) -> crate::Result<Vec<Digest>>
where
    I: IntoIterator<Item = Digest>,
{
    if n > TOTAL_PARTITIONS as usize {
        return Err(crate::Error::InvalidConfig(format!(
            "cannot place {} records in unique partitions (max {})",
            n, TOTAL_PARTITIONS
        )));
    }

    let mut used: HashSet<PartitionId> = HashSet::with_capacity(n);
    let mut selected = Vec::with_capacity(n);

    for digest in candidates {
        if selected.len() == n {
            break;
        }
        if used.insert(digest.partition()) {
            selected.push(digest);
        }
    }

    if selected.len() < n {
        return Err(crate::Error::PartitionsExhausted {
            found: selected.len(),
            needed: n,
        });
    }

    tracing::debug!("Used partitions: {} / {}", used.len(), TOTAL_PARTITIONS);
    Ok(selected)
}
