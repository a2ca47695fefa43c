//! Truncate and wait until the data is gone everywhere
//!
//! A truncate is acknowledged before every node has applied it. Each attempt
//! issues the truncate and then waits for an empty scan; failed or
//! unconverged attempts are retried with exponential backoff.

use crate::cluster::ClusterHandle;
use crate::common::utils::retry_with_backoff;
use crate::common::{Config, Result, WaitSchedule};
use crate::ops::converge::{wait_until_empty, Convergence};
use crate::ops::scan::ScanCounter;
use std::time::Duration;

const TRUNCATE_BACKOFF: Duration = Duration::from_millis(100);

/// Truncate a whole namespace and wait until it scans empty
pub async fn truncate_namespace(
    cluster: &dyn ClusterHandle,
    config: &Config,
    namespace: &str,
) -> Result<Convergence> {
    let convergence =
        truncate_and_wait(cluster, config, namespace, None, &config.namespace_truncate).await?;
    tracing::info!("Namespace: {} truncated", namespace);
    Ok(convergence)
}

/// Truncate one set and wait until it scans empty
pub async fn truncate_set(
    cluster: &dyn ClusterHandle,
    config: &Config,
    namespace: &str,
    set: &str,
) -> Result<Convergence> {
    let convergence =
        truncate_and_wait(cluster, config, namespace, Some(set), &config.set_truncate).await?;
    tracing::info!("Namespace: {}, set: {} truncated", namespace, set);
    Ok(convergence)
}

async fn truncate_and_wait(
    cluster: &dyn ClusterHandle,
    config: &Config,
    namespace: &str,
    set: Option<&str>,
    schedule: &WaitSchedule,
) -> Result<Convergence> {
    let counter = ScanCounter::from_config(cluster, config);
    let counter = &counter;

    retry_with_backoff(
        |attempt| async move {
            match set {
                Some(set) => tracing::info!("Try truncate: {} set {} (attempt {})", namespace, set, attempt),
                None => tracing::info!("Try truncate: {} (attempt {})", namespace, attempt),
            }
            cluster.truncate(namespace, set).await?;
            wait_until_empty(counter, namespace, set, schedule).await
        },
        config.truncate_attempts,
        TRUNCATE_BACKOFF,
    )
    .await
}
