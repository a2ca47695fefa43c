//! Bounded polling until a cluster-wide condition holds
//!
//! A waiter polls its predicate on a fixed schedule: one initial delay, then
//! one evaluation per interval, until the predicate answers `true` or the
//! deadline passes. Predicate errors are not swallowed: "cannot tell" is a
//! failure, only "not yet" keeps polling.
//!
//! `until` consumes the waiter, so a finished wait cannot be restarted.
//! A poll already running at the deadline is allowed to finish; each info
//! or scan call carries its own timeout, and it always releases what it
//! opened.

use crate::common::{Error, Result, WaitSchedule};
use crate::ops::census::ClusterCensus;
use crate::ops::scan::ScanCounter;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a satisfied wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    /// Predicate evaluations, the successful one included
    pub polls: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ConvergenceWaiter {
    description: String,
    schedule: WaitSchedule,
}

impl ConvergenceWaiter {
    /// 100ms delay, 100ms interval, 10s max wait
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            schedule: WaitSchedule::new(
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_secs(10),
            ),
        }
    }

    pub fn from_schedule(description: impl Into<String>, schedule: &WaitSchedule) -> Self {
        Self {
            description: description.into(),
            schedule: schedule.clone(),
        }
    }

    pub fn poll_delay(mut self, delay: Duration) -> Self {
        self.schedule.poll_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.schedule.poll_interval = interval;
        self
    }

    pub fn at_most(mut self, max_wait: Duration) -> Self {
        self.schedule.max_wait = max_wait;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Poll `predicate` until it returns `true`
    ///
    /// Fails with `ConvergenceTimeout` once `max_wait` has elapsed, or with
    /// the predicate's own error as soon as it reports one.
    pub async fn until<F, Fut>(self, mut predicate: F) -> Result<Convergence>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.schedule.validate()?;

        let start = Instant::now();
        let deadline = start + self.schedule.max_wait;
        tokio::time::sleep(self.schedule.poll_delay).await;

        let mut polls = 0u32;
        loop {
            let poll_started = Instant::now();
            polls += 1;

            if predicate().await? {
                let elapsed = start.elapsed();
                tracing::info!(
                    "'{}' satisfied after {} poll(s) in {:?}",
                    self.description,
                    polls,
                    elapsed
                );
                return Ok(Convergence { polls, elapsed });
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = start.elapsed();
                tracing::warn!(
                    "'{}' still not satisfied after {} poll(s) in {:?}",
                    self.description,
                    polls,
                    elapsed
                );
                return Err(Error::ConvergenceTimeout {
                    description: self.description,
                    elapsed,
                });
            }

            tracing::debug!("'{}' not satisfied yet (poll {})", self.description, polls);
            let next_poll = (poll_started + self.schedule.poll_interval).min(deadline);
            tokio::time::sleep_until(next_poll).await;
        }
    }
}

/// Wait until `namespace` (or one set of it) holds no record
pub async fn wait_until_empty(
    counter: &ScanCounter<'_>,
    namespace: &str,
    set: Option<&str>,
    schedule: &WaitSchedule,
) -> Result<Convergence> {
    let description = match set {
        Some(set) => format!("namespace {} set {} is empty", namespace, set),
        None => format!("namespace {} is empty", namespace),
    };
    ConvergenceWaiter::from_schedule(description, schedule)
        .until(|| counter.is_empty(namespace, set))
        .await
}

/// Wait until the scanned count of `set` rises above `baseline`
///
/// Returns the first count seen above the baseline.
pub async fn wait_until_count_exceeds(
    counter: &ScanCounter<'_>,
    set: &str,
    namespace: &str,
    baseline: u64,
    schedule: &WaitSchedule,
) -> Result<u64> {
    let observed = AtomicU64::new(baseline);
    let observed_ref = &observed;

    ConvergenceWaiter::from_schedule(
        format!("set {} in namespace {} exceeds {} records", set, namespace, baseline),
        schedule,
    )
    .until(|| async move {
        let result = counter.count_by_set(set, namespace).await?;
        observed_ref.store(result.count, Ordering::SeqCst);
        Ok(result.count > baseline)
    })
    .await?;

    Ok(observed.load(Ordering::SeqCst))
}

/// Wait until every scan job targeting `set` reports done
pub async fn wait_until_scans_done(
    census: &ClusterCensus<'_>,
    set: &str,
    schedule: &WaitSchedule,
) -> Result<Convergence> {
    ConvergenceWaiter::from_schedule(format!("scans of set {} are done", set), schedule)
        .until(|| async move {
            let jobs = census.scan_jobs_for_set(set).await?;
            Ok(jobs.iter().all(|job| job.is_done()))
        })
        .await
}
