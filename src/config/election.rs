use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::StalenessChecker;

/// Lease timing and identity tagging of an election participant
///
/// The lease TTL is `heartbeat_interval_ms * heartbeat_multiplier`: a holder
/// that misses that many consecutive heartbeats can be preempted.
///
/// # Examples
///
/// ```rust
/// use d_master::ElectionConfig;
///
/// let config = ElectionConfig::default();
/// assert_eq!(config.heartbeat_interval_ms, 6000);
/// assert_eq!(config.lease_ttl().as_secs(), 18);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElectionConfig {
    /// Period of the election step in milliseconds
    ///
    /// Range: 10-3600000
    /// Default: 6000 (6 seconds)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Heartbeats a holder may miss before its lease is stale
    ///
    /// Default: 3
    #[serde(default = "default_heartbeat_multiplier")]
    pub heartbeat_multiplier: u32,

    /// Opaque version tag written into the lease record
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_multiplier: default_heartbeat_multiplier(),
            version: default_version(),
        }
    }
}

impl ElectionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Staleness threshold of a lease.
    pub fn lease_ttl(&self) -> Duration {
        self.heartbeat_interval() * self.heartbeat_multiplier
    }

    /// Failure detector backends should be built with, so that controller
    /// and store agree on when a lease expires.
    pub fn staleness_checker(&self) -> StalenessChecker {
        StalenessChecker::new(self.heartbeat_interval(), self.heartbeat_multiplier)
    }

    pub fn validate(&self) -> Result<()> {
        if !(10..=3_600_000).contains(&self.heartbeat_interval_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "heartbeat_interval_ms must be between 10 and 3600000, got {}",
                self.heartbeat_interval_ms
            ))));
        }

        if self.heartbeat_multiplier == 0 {
            return Err(Error::Config(ConfigError::Message(
                "heartbeat_multiplier must be at least 1".into(),
            )));
        }

        if self.version.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "version tag cannot be empty".into(),
            )));
        }

        Ok(())
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    6000
}

fn default_heartbeat_multiplier() -> u32 {
    3
}

fn default_version() -> String {
    "default".to_string()
}
