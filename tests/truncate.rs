//! Truncate-and-wait with retries

mod common;

use common::{records, FakeCluster};
use kvcensus::common::{Config, Error, WaitSchedule};
use kvcensus::ops::{truncate_namespace, truncate_set};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn fast_config(attempts: usize) -> Config {
    let schedule = WaitSchedule::new(
        Duration::from_millis(50),
        Duration::from_millis(100),
        Duration::from_secs(1),
    );
    Config {
        namespace_truncate: schedule.clone(),
        set_truncate: schedule,
        truncate_attempts: attempts,
        ..Config::default()
    }
}

fn populated() -> FakeCluster {
    let cluster = FakeCluster::with_nodes(&["A", "B", "C"]);
    cluster.insert(records("test", "demo", 12));
    cluster.insert(records("test", "keep", 5));
    cluster.insert(records("other", "demo", 2));
    cluster
}

#[tokio::test(start_paused = true)]
async fn test_truncate_set_waits_for_lagging_nodes() {
    let cluster = populated();
    cluster.truncate_lag(Some(3));

    let convergence = truncate_set(&cluster, &fast_config(3), "test", "demo")
        .await
        .unwrap();

    assert_eq!(cluster.truncate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(convergence.polls, 4);
    assert_eq!(cluster.record_count(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_truncate_namespace_keeps_other_namespaces() {
    let cluster = populated();

    truncate_namespace(&cluster, &fast_config(3), "test")
        .await
        .unwrap();

    assert_eq!(cluster.record_count(), 2);
    let requests = cluster.scan_requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.namespace == "test" && r.set.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_truncate_retries_refused_requests() {
    let cluster = populated();
    cluster.fail_truncates(2);

    truncate_set(&cluster, &fast_config(5), "test", "demo")
        .await
        .unwrap();

    assert_eq!(cluster.truncate_calls.load(Ordering::SeqCst), 3);
    assert_eq!(cluster.record_count(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_truncate_gives_up_when_data_never_clears() {
    let cluster = populated();
    cluster.truncate_lag(None);

    let err = truncate_set(&cluster, &fast_config(2), "test", "demo")
        .await
        .unwrap_err();

    match err {
        Error::ConvergenceTimeout { description, .. } => {
            assert_eq!(description, "namespace test set demo is empty");
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(cluster.truncate_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cluster.record_count(), 19);
    assert_eq!(
        cluster.streams.opened.load(Ordering::SeqCst),
        cluster.streams.closed.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn test_truncate_with_zero_attempts_is_a_config_error() {
    let cluster = populated();
    let err = truncate_namespace(&cluster, &fast_config(0), "test")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(cluster.truncate_calls.load(Ordering::SeqCst), 0);
}
