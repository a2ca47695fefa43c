//! Configuration for kvcensus
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. Durations are written as "500ms", "10s", "1m".

use crate::common::utils::duration_str;
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// Timeout of a single info round trip
    #[serde(with = "duration_str")]
    pub info_timeout: Duration,

    /// Tiers tried in order by scan-based counts
    pub scan_policy: ScanCountPolicy,

    /// Wait schedule after truncating a whole namespace
    pub namespace_truncate: WaitSchedule,

    /// Wait schedule after truncating a single set
    pub set_truncate: WaitSchedule,

    /// Truncate + wait attempts before giving up
    pub truncate_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            info_timeout: Duration::from_secs(8),
            scan_policy: ScanCountPolicy::default(),
            namespace_truncate: WaitSchedule::namespace_truncate(),
            set_truncate: WaitSchedule::set_truncate(),
            truncate_attempts: 10,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then `KVCENSUS__*` env vars
    ///
    /// `KVCENSUS__INFO_TIMEOUT=2s` overrides `info_timeout`, nested fields use
    /// `__` as separator (`KVCENSUS__SET_TRUNCATE__MAX_WAIT=1m`).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("KVCENSUS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.scan_policy.validate()?;
        self.namespace_truncate.validate()?;
        self.set_truncate.validate()?;
        if self.truncate_attempts == 0 {
            return Err(crate::Error::InvalidConfig(
                "truncate_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expected duration of a scan, passed through to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryDuration {
    /// Short query, strict cluster view, low latency
    Short,
    /// Long query, strict cluster view
    Long,
    /// Long query that tolerates partition migrations in progress
    LongRelaxAp,
}

impl std::fmt::Display for QueryDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryDuration::Short => write!(f, "short"),
            QueryDuration::Long => write!(f, "long"),
            QueryDuration::LongRelaxAp => write!(f, "long-relax-ap"),
        }
    }
}

/// One scan attempt's policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTier {
    pub duration: QueryDuration,

    /// Client-level retries performed by the cluster handle
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_sleep_between_retries", with = "duration_str")]
    pub sleep_between_retries: Duration,

    /// Upper bound on the whole scan, enforced while draining the stream
    #[serde(default = "default_total_timeout", with = "duration_str")]
    pub total_timeout: Duration,

    #[serde(default = "default_socket_timeout", with = "duration_str")]
    pub socket_timeout: Duration,
}

fn default_max_retries() -> u32 {
    5
}
fn default_sleep_between_retries() -> Duration {
    Duration::from_secs(1)
}
fn default_total_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_socket_timeout() -> Duration {
    Duration::from_secs(5)
}

impl ScanTier {
    pub fn new(duration: QueryDuration) -> Self {
        Self {
            duration,
            max_retries: default_max_retries(),
            sleep_between_retries: default_sleep_between_retries(),
            total_timeout: default_total_timeout(),
            socket_timeout: default_socket_timeout(),
        }
    }

    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }
}

/// Ordered list of scan tiers, the first success wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCountPolicy {
    pub tiers: Vec<ScanTier>,
}

impl Default for ScanCountPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                ScanTier::new(QueryDuration::Short),
                ScanTier::new(QueryDuration::LongRelaxAp),
            ],
        }
    }
}

impl ScanCountPolicy {
    pub fn new(tiers: Vec<ScanTier>) -> crate::Result<Self> {
        let policy = Self { tiers };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.tiers.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "scan policy needs at least one tier".into(),
            ));
        }
        Ok(())
    }

    /// Tier used for single-record probes
    pub fn first(&self) -> crate::Result<&ScanTier> {
        self.tiers
            .first()
            .ok_or_else(|| crate::Error::InvalidConfig("scan policy has no tiers".into()))
    }
}

/// Poll schedule of a convergence wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSchedule {
    /// Sleep once before the first evaluation
    #[serde(with = "duration_str")]
    pub poll_delay: Duration,

    #[serde(with = "duration_str")]
    pub poll_interval: Duration,

    #[serde(with = "duration_str")]
    pub max_wait: Duration,
}

impl WaitSchedule {
    pub fn new(poll_delay: Duration, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_delay,
            poll_interval,
            max_wait,
        }
    }

    pub fn namespace_truncate() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }

    pub fn set_truncate() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_secs(3),
            Duration::from_secs(30),
        )
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval.is_zero() {
            return Err(crate::Error::InvalidConfig(
                "poll interval must be positive".into(),
            ));
        }
        if self.poll_delay > self.max_wait {
            return Err(crate::Error::InvalidConfig(format!(
                "poll delay {:?} exceeds max wait {:?}",
                self.poll_delay, self.max_wait
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.info_timeout, Duration::from_secs(8));
        assert_eq!(config.scan_policy.tiers.len(), 2);
        assert_eq!(config.scan_policy.tiers[0].duration, QueryDuration::Short);
        assert_eq!(
            config.scan_policy.tiers[1].duration,
            QueryDuration::LongRelaxAp
        );
        assert_eq!(config.scan_policy.tiers[1].socket_timeout, Duration::from_secs(5));
        assert_eq!(config.set_truncate.poll_delay, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
log_level = "debug"
info_timeout = "2s"
truncate_attempts = 3

[set_truncate]
poll_delay = "100ms"
poll_interval = "1s"
max_wait = "5s"

[[scan_policy.tiers]]
duration = "short"
total_timeout = "3s"

[[scan_policy.tiers]]
duration = "long"

[[scan_policy.tiers]]
duration = "long-relax-ap"
max_retries = 1
"#
        )?;

        let config = Config::load(Some(file.path()))?;
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.info_timeout, Duration::from_secs(2));
        assert_eq!(config.truncate_attempts, 3);
        assert_eq!(config.set_truncate.max_wait, Duration::from_secs(5));
        // untouched section keeps its default
        assert_eq!(config.namespace_truncate, WaitSchedule::namespace_truncate());
        assert_eq!(config.scan_policy.tiers.len(), 3);
        assert_eq!(config.scan_policy.tiers[0].total_timeout, Duration::from_secs(3));
        assert_eq!(config.scan_policy.tiers[0].max_retries, 5);
        assert_eq!(config.scan_policy.tiers[2].max_retries, 1);
        Ok(())
    }

    #[test]
    fn test_load_rejects_empty_policy() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[scan_policy]\ntiers = []").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/kvcensus.toml"))).unwrap();
        assert_eq!(config.truncate_attempts, 10);
    }

    #[test]
    fn test_schedule_validation() {
        let bad = WaitSchedule::new(
            Duration::from_secs(10),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        assert!(bad.validate().is_err());
        let zero = WaitSchedule::new(Duration::ZERO, Duration::ZERO, Duration::from_secs(5));
        assert!(zero.validate().is_err());
    }
}
