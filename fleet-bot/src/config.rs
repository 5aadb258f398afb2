//! Bot configuration
//!
//! Defines all configurable parameters for the bot: coordinator connection,
//! claim batch size, concurrency, intervals, backoff bounds and where local
//! state (identity, outbox) lives.

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Largest batch the coordinator will hand out in one claim
const MAX_CLAIM_BATCH_SIZE: usize = 100;

/// Bot configuration
///
/// Built once at startup and shared by reference; nothing mutates it
/// afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordinator base URL (e.g., "http://localhost:8000/v1")
    pub server_base: String,

    /// Version reported at registration
    pub version: String,

    /// How often to send heartbeats
    pub heartbeat_interval: Duration,

    /// How often to run a tick
    pub poll_interval: Duration,

    /// How long the coordinator keeps the bot alive without a heartbeat
    pub bot_lease_ttl: Duration,

    /// How long the coordinator leases a claimed job
    pub job_lease_ttl: Duration,

    /// Maximum number of jobs claimed per tick
    pub claim_batch_size: usize,

    /// Max jobs executing at once, until the coordinator assigns otherwise
    pub max_concurrency: usize,

    /// First delay after a failed registration or tick
    pub min_backoff: Duration,

    /// Upper bound for the backoff delay
    pub max_backoff: Duration,

    /// Directory holding identity and outbox files
    pub state_dir: PathBuf,

    /// Explicit outbox location; defaults to `<state_dir>/outbox.jsonl`
    pub outbox_path: Option<PathBuf>,

    /// Max buffered reports retried per flush (`None` = all)
    pub outbox_flush_limit: Option<usize>,

    /// Timeout for a single coordinator request
    pub request_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(server_base: String) -> Self {
        Self {
            server_base,
            version: env!("CARGO_PKG_VERSION").to_string(),
            heartbeat_interval: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            bot_lease_ttl: Duration::from_secs(120),
            job_lease_ttl: Duration::from_secs(180),
            claim_batch_size: 5,
            max_concurrency: 2,
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(60_000),
            state_dir: PathBuf::from(".state"),
            outbox_path: None,
            outbox_flush_limit: Some(1000),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised variables (all optional):
    /// - SERVER_BASE (default: http://localhost:8000/v1)
    /// - BOT_VERSION (default: crate version)
    /// - HEARTBEAT_INTERVAL_SEC (default: 30)
    /// - POLL_INTERVAL_MS (default: 500)
    /// - BOT_LEASE_TTL_SEC (default: 120)
    /// - JOB_LEASE_TTL_SEC (default: 180)
    /// - CLAIM_BATCH_SIZE (default: 5)
    /// - MAX_CONCURRENCY (default: 2)
    /// - MIN_BACKOFF_MS (default: 500)
    /// - MAX_BACKOFF_MS (default: 60000)
    /// - STATE_DIR (default: .state)
    /// - OUTBOX_PATH (default: $STATE_DIR/outbox.jsonl)
    /// - OUTBOX_FLUSH_LIMIT (default: 1000, 0 = unlimited)
    /// - REQUEST_TIMEOUT_SEC (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| -> anyhow::Result<Duration> {
            Ok(parse_var(&lookup, name)?
                .map(Duration::from_secs)
                .unwrap_or(default))
        };
        let millis = |name: &str, default: Duration| -> anyhow::Result<Duration> {
            Ok(parse_var(&lookup, name)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let outbox_flush_limit = match parse_var::<usize, _>(&lookup, "OUTBOX_FLUSH_LIMIT")? {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => defaults.outbox_flush_limit,
        };

        Ok(Self {
            server_base: lookup("SERVER_BASE").unwrap_or(defaults.server_base),
            version: lookup("BOT_VERSION").unwrap_or(defaults.version),
            heartbeat_interval: secs("HEARTBEAT_INTERVAL_SEC", defaults.heartbeat_interval)?,
            poll_interval: millis("POLL_INTERVAL_MS", defaults.poll_interval)?,
            bot_lease_ttl: secs("BOT_LEASE_TTL_SEC", defaults.bot_lease_ttl)?,
            job_lease_ttl: secs("JOB_LEASE_TTL_SEC", defaults.job_lease_ttl)?,
            claim_batch_size: parse_var(&lookup, "CLAIM_BATCH_SIZE")?
                .unwrap_or(defaults.claim_batch_size),
            max_concurrency: parse_var(&lookup, "MAX_CONCURRENCY")?
                .unwrap_or(defaults.max_concurrency),
            min_backoff: millis("MIN_BACKOFF_MS", defaults.min_backoff)?,
            max_backoff: millis("MAX_BACKOFF_MS", defaults.max_backoff)?,
            state_dir: lookup("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            outbox_path: lookup("OUTBOX_PATH").map(PathBuf::from),
            outbox_flush_limit,
            request_timeout: secs("REQUEST_TIMEOUT_SEC", defaults.request_timeout)?,
        })
    }

    /// Points local state at another directory
    pub fn with_state_dir(mut self, state_dir: PathBuf) -> Self {
        self.state_dir = state_dir;
        self
    }

    /// Where undelivered reports are persisted
    pub fn outbox_path(&self) -> PathBuf {
        self.outbox_path
            .clone()
            .unwrap_or_else(|| self.state_dir.join("outbox.jsonl"))
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_base.is_empty() {
            anyhow::bail!("server_base cannot be empty");
        }

        if !self.server_base.starts_with("http://") && !self.server_base.starts_with("https://") {
            anyhow::bail!("server_base must start with http:// or https://");
        }

        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }

        if self.claim_batch_size == 0 || self.claim_batch_size > MAX_CLAIM_BATCH_SIZE {
            anyhow::bail!(
                "claim_batch_size must be between 1 and {}",
                MAX_CLAIM_BATCH_SIZE
            );
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.heartbeat_interval >= self.bot_lease_ttl {
            anyhow::bail!("heartbeat_interval must be shorter than bot_lease_ttl");
        }

        if self.job_lease_ttl.is_zero() {
            anyhow::bail!("job_lease_ttl must be greater than 0");
        }

        if self.min_backoff > self.max_backoff {
            anyhow::bail!("min_backoff cannot exceed max_backoff");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8000/v1".to_string())
    }
}

/// Reads and parses one variable; a present but malformed value is an error
fn parse_var<T, F>(lookup: &F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", name, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_base, "http://localhost:8000/v1");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.claim_batch_size, 5);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.outbox_path(), PathBuf::from(".state/outbox.jsonl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        let config = Config::from_lookup(lookup_from(&[
            ("SERVER_BASE", "https://prod.example.com/api"),
            ("HEARTBEAT_INTERVAL_SEC", "60"),
            ("MAX_CONCURRENCY", "10"),
            ("STATE_DIR", "/var/lib/fleet"),
            ("OUTBOX_FLUSH_LIMIT", "0"),
        ]))
        .unwrap();

        assert_eq!(config.server_base, "https://prod.example.com/api");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.claim_batch_size, 5);
        assert_eq!(
            config.outbox_path(),
            PathBuf::from("/var/lib/fleet/outbox.jsonl")
        );
        assert_eq!(config.outbox_flush_limit, None);
    }

    #[test]
    fn test_explicit_outbox_path_wins() {
        let config = Config::from_lookup(lookup_from(&[
            ("STATE_DIR", "/var/lib/fleet"),
            ("OUTBOX_PATH", "/tmp/reports.jsonl"),
        ]))
        .unwrap();

        assert_eq!(config.outbox_path(), PathBuf::from("/tmp/reports.jsonl"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("MAX_CONCURRENCY", "not_a_number")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENCY"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_concurrency = 0;
        assert!(config.validate().is_err());
        config.max_concurrency = 2;

        config.claim_batch_size = 101;
        assert!(config.validate().is_err());
        config.claim_batch_size = 5;

        config.server_base = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.server_base = "http://localhost:8000/v1".to_string();

        config.min_backoff = Duration::from_secs(120);
        assert!(config.validate().is_err());
        config.min_backoff = Duration::from_millis(500);

        config.heartbeat_interval = config.bot_lease_ttl;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_state_dir() {
        let config = Config::default().with_state_dir(PathBuf::from("/srv/bot"));
        assert_eq!(config.outbox_path(), PathBuf::from("/srv/bot/outbox.jsonl"));
    }
}
