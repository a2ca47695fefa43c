//! Scripted in-memory cluster for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kvcensus::cluster::{ClusterHandle, ClusterNode, RecordStream, ScanRequest};
use kvcensus::common::{Digest, Error, RecordKey, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the next opened scan does, overriding the stored records
#[derive(Debug, Clone)]
pub enum ScanScript {
    /// Opening the scan fails
    FailOpen(String),
    /// Yields `n` matching records, then an error
    FailAfter(usize, String),
    /// Never yields anything
    Hang,
    /// Opening the scan never completes
    HangOpen,
}

#[derive(Default)]
pub struct StreamCounters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub pulls: AtomicUsize,
}

#[derive(Default)]
pub struct FakeCluster {
    nodes: Mutex<Vec<ClusterNode>>,
    info: Mutex<HashMap<(String, String), std::result::Result<String, String>>>,
    pub info_calls: Mutex<Vec<(String, String)>>,
    records: Mutex<Vec<RecordKey>>,
    scripts: Mutex<VecDeque<ScanScript>>,
    pub scan_requests: Mutex<Vec<ScanRequest>>,
    pub streams: Arc<StreamCounters>,
    truncate_failures: AtomicUsize,
    /// Scans to serve before a truncate takes effect; `None` ignores truncates
    truncate_lag: Mutex<Option<usize>>,
    pending_truncate: Mutex<Option<(String, Option<String>, usize)>>,
    pub truncate_calls: AtomicUsize,
}

pub fn node(name: &str, host: &str) -> ClusterNode {
    ClusterNode::new(name, host, 3000)
}

pub fn record(namespace: &str, set: &str, seed: u16) -> RecordKey {
    let mut digest = [0x5A; 20];
    digest[..2].copy_from_slice(&seed.to_le_bytes());
    RecordKey {
        namespace: namespace.to_string(),
        set: Some(set.to_string()),
        digest: Digest(digest),
    }
}

pub fn records(namespace: &str, set: &str, count: u16) -> Vec<RecordKey> {
    (0..count).map(|i| record(namespace, set, i)).collect()
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            truncate_lag: Mutex::new(Some(0)),
            ..Default::default()
        }
    }

    pub fn with_nodes(names: &[&str]) -> Self {
        let cluster = Self::new();
        {
            let mut nodes = cluster.nodes.lock().unwrap();
            for (i, name) in names.iter().enumerate() {
                nodes.push(node(name, &format!("10.0.0.{}", i + 1)));
            }
        }
        cluster
    }

    pub fn set_nodes(&self, nodes: Vec<ClusterNode>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn nodes_snapshot(&self) -> Vec<ClusterNode> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn node(&self, name: &str) -> ClusterNode {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .unwrap()
    }

    pub fn reply(&self, node: &str, command: &str, response: &str) {
        self.info
            .lock()
            .unwrap()
            .insert((node.to_string(), command.to_string()), Ok(response.to_string()));
    }

    pub fn fail(&self, node: &str, command: &str, reason: &str) {
        self.info
            .lock()
            .unwrap()
            .insert((node.to_string(), command.to_string()), Err(reason.to_string()));
    }

    pub fn info_calls_for(&self, command: &str) -> Vec<String> {
        self.info_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == command)
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn insert(&self, keys: Vec<RecordKey>) {
        self.records.lock().unwrap().extend(keys);
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn script(&self, script: ScanScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn fail_truncates(&self, n: usize) {
        self.truncate_failures.store(n, Ordering::SeqCst);
    }

    /// Truncates take effect after `scans` further scans; `None` never applies them
    pub fn truncate_lag(&self, scans: Option<usize>) {
        *self.truncate_lag.lock().unwrap() = scans;
    }

    fn apply_pending_truncate(&self) {
        let mut pending = self.pending_truncate.lock().unwrap();
        let apply = match pending.as_mut() {
            Some((_, _, 0)) => true,
            Some((_, _, remaining)) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if apply {
            if let Some((namespace, set, _)) = pending.take() {
                self.records.lock().unwrap().retain(|r| {
                    r.namespace != namespace
                        || set.as_ref().is_some_and(|s| r.set.as_ref() != Some(s))
                });
            }
        }
    }

    fn matching(&self, request: &ScanRequest) -> Vec<RecordKey> {
        let limit = request.max_records.map(|m| m as usize).unwrap_or(usize::MAX);
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.namespace == request.namespace)
            .filter(|r| request.set.is_none() || r.set == request.set)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ClusterHandle for FakeCluster {
    fn nodes(&self) -> Vec<ClusterNode> {
        self.nodes.lock().unwrap().clone()
    }

    async fn info(&self, node: &ClusterNode, command: &str, _timeout: Duration) -> Result<String> {
        self.info_calls
            .lock()
            .unwrap()
            .push((node.name.clone(), command.to_string()));

        let reply = self
            .info
            .lock()
            .unwrap()
            .get(&(node.name.clone(), command.to_string()))
            .cloned();

        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(Error::Protocol {
                node: node.address(),
                reason,
            }),
            None => Ok(String::new()),
        }
    }

    async fn scan(&self, request: ScanRequest) -> Result<Box<dyn RecordStream>> {
        self.scan_requests.lock().unwrap().push(request.clone());
        self.apply_pending_truncate();

        let script = self.scripts.lock().unwrap().pop_front();
        if matches!(script, Some(ScanScript::HangOpen)) {
            std::future::pending::<()>().await;
        }
        let matching = self.matching(&request);

        let (items, hang) = match script {
            Some(ScanScript::FailOpen(reason)) => {
                return Err(Error::Protocol {
                    node: "scan".into(),
                    reason,
                })
            }
            Some(ScanScript::FailAfter(n, reason)) => {
                let mut items: VecDeque<Result<RecordKey>> =
                    matching.into_iter().take(n).map(Ok).collect();
                items.push_back(Err(Error::Protocol {
                    node: "scan".into(),
                    reason,
                }));
                (items, false)
            }
            Some(ScanScript::Hang) => (VecDeque::new(), true),
            Some(ScanScript::HangOpen) => unreachable!(),
            None => (matching.into_iter().map(Ok).collect(), false),
        };

        self.streams.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            items,
            hang,
            counters: self.streams.clone(),
        }))
    }

    async fn truncate(&self, namespace: &str, set: Option<&str>) -> Result<()> {
        self.truncate_calls.fetch_add(1, Ordering::SeqCst);

        let failures = self.truncate_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.truncate_failures.store(failures - 1, Ordering::SeqCst);
            return Err(Error::Protocol {
                node: "truncate".into(),
                reason: "cluster busy".into(),
            });
        }

        if let Some(lag) = *self.truncate_lag.lock().unwrap() {
            *self.pending_truncate.lock().unwrap() =
                Some((namespace.to_string(), set.map(str::to_string), lag));
        }
        Ok(())
    }
}

struct FakeStream {
    items: VecDeque<Result<RecordKey>>,
    hang: bool,
    counters: Arc<StreamCounters>,
}

#[async_trait]
impl RecordStream for FakeStream {
    async fn next_record(&mut self) -> Option<Result<RecordKey>> {
        self.counters.pulls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.items.pop_front()
    }

    async fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}
