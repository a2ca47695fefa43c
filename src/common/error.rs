//! Error types for kvcensus

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Node Errors ===
    #[error("Protocol error on {node}: {reason}")]
    Protocol { node: String, reason: String },

    #[error("Failed to parse value '{value}' for field '{field}'")]
    Parse { field: String, value: String },

    // === Scan Errors ===
    #[error("No reachable nodes in cluster")]
    NoReachableNodes,

    #[error(
        "Scan count failed for {namespace}/{set} on every tier: {}",
        format_causes(.causes)
    )]
    ScanFailed {
        namespace: String,
        set: String,
        causes: Vec<(String, Error)>,
    },

    // === Partition Errors ===
    #[error("Found keys in only {found} distinct partitions, needed {needed}")]
    PartitionsExhausted { found: usize, needed: usize },

    // === Convergence Errors ===
    #[error("Condition '{description}' not satisfied after {elapsed:?}")]
    ConvergenceTimeout {
        description: String,
        elapsed: Duration,
    },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

fn format_causes(causes: &[(String, Error)]) -> String {
    causes
        .iter()
        .map(|(tier, err)| format!("[{}] {}", tier, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. }
                | Error::Timeout(_)
                | Error::ConvergenceTimeout { .. }
                | Error::NoReachableNodes
        )
    }

    pub(crate) fn protocol(node: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Protocol {
            node: node.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
