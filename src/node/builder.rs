//! A builder pattern implementation for constructing a [`Master`] election
//! controller.
//!
//! The [`MasterBuilder`] starts from a [`MasterConfig`] and lets callers
//! override identity, timing, hooks, logging and the lock backend.
//!
//! ## Key Design Points
//! - **Default Components**: a random `nanoid` identity, the best-effort local IP as address, the
//!   lock store selected by `storage.engine` (SQLite unless configured otherwise), and a `tracing`
//!   log sink.
//! - **Customization**: any lock store implementing [`LockBackend`] can be plugged in with
//!   `backend()`. The configured heartbeat and multiplier still decide staleness, since the
//!   controller hands its rule to the backend on every acquisition attempt.
//! - **Validation**: `build()` validates the merged configuration before anything is opened.
//!
//! ## Example
//! ```ignore
//! let master = MasterBuilder::new()?
//!     .heartbeat(Duration::from_secs(2))
//!     .on_master_start(|epoch| println!("leading, epoch {epoch}"))
//!     .build()?;
//! master.start()?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use config::ConfigError;
use tracing::debug;
use tracing::info;

use crate::id::random_candidate_id;
use crate::metrics;
use crate::net::local_ip;
use crate::Error;
use crate::LeaseRecord;
use crate::LeveledLogger;
use crate::LockBackend;
use crate::LogLevel;
use crate::Logger;
use crate::Master;
use crate::MasterConfig;
use crate::MasterHooks;
use crate::Result;
use crate::SledLockBackend;
use crate::SqlLockBackend;
use crate::StorageEngine;
use crate::TracingLogger;

/// Fluent constructor of a [`Master`].
pub struct MasterBuilder {
    config: MasterConfig,
    id: Option<String>,
    address: Option<String>,
    backend: Option<Arc<dyn LockBackend>>,
    hooks: MasterHooks,
    logger: Option<Arc<dyn Logger>>,
}

impl MasterBuilder {
    /// Creates a builder from the hierarchical configuration
    /// (defaults, `CONFIG_PATH` file, `MASTER__*` environment).
    pub fn new() -> Result<Self> {
        Ok(Self::init(MasterConfig::new()?))
    }

    /// Constructs a builder from an in-memory configuration.
    pub fn init(config: MasterConfig) -> Self {
        Self {
            config,
            id: None,
            address: None,
            backend: None,
            hooks: MasterHooks::default(),
            logger: None,
        }
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Lock store to compete on; defaults to the store named by
    /// `storage.engine`.
    ///
    /// The backend may be shared with candidates configured differently;
    /// each one judges staleness with its own heartbeat settings.
    pub fn backend(
        mut self,
        backend: Arc<dyn LockBackend>,
    ) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Candidate identity; must be unique among all competing processes.
    pub fn id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn address(
        mut self,
        address: impl Into<String>,
    ) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn heartbeat(
        mut self,
        interval: Duration,
    ) -> Self {
        self.config.election.heartbeat_interval_ms =
            u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn heartbeat_multiplier(
        mut self,
        multiplier: u32,
    ) -> Self {
        self.config.election.heartbeat_multiplier = multiplier;
        self
    }

    pub fn version(
        mut self,
        version: impl Into<String>,
    ) -> Self {
        self.config.election.version = version.into();
        self
    }

    pub fn on_master_start<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.hooks.on_master_start = Some(Arc::new(hook));
        self
    }

    pub fn on_master_stop<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.hooks.on_master_stop = Some(Arc::new(hook));
        self
    }

    /// Sink for controller diagnostics; defaults to [`TracingLogger`].
    pub fn logger(
        mut self,
        logger: Arc<dyn Logger>,
    ) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Minimum level forwarded to the logger, custom sinks included.
    pub fn log_level(
        mut self,
        level: LogLevel,
    ) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Validates the configuration and assembles a stopped [`Master`].
    pub fn build(self) -> Result<Master> {
        let config = self.config.validate()?;

        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::Config(ConfigError::Message(
                    "candidate id cannot be empty".into(),
                )));
            }
            Some(id) => id,
            None => random_candidate_id(),
        };
        let address = self.address.unwrap_or_else(|| local_ip().to_string());

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                debug!("no lock backend supplied, opening store: {:?}", config.storage);
                match config.storage.engine {
                    StorageEngine::Sqlite => {
                        Arc::new(SqlLockBackend::open(&config.storage)?) as Arc<dyn LockBackend>
                    }
                    StorageEngine::Sled => Arc::new(SledLockBackend::open(&config.storage)?),
                }
            }
        };

        let sink = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger) as Arc<dyn Logger>);
        let logger = Arc::new(LeveledLogger::new(config.logging.level, sink));

        metrics::init_metrics();
        info!(
            "master candidate {} ({}) built: heartbeat={:?}, ttl={:?}",
            id,
            address,
            config.election.heartbeat_interval(),
            config.election.lease_ttl()
        );

        Ok(Master::new(
            LeaseRecord::new(id, config.election.version.clone(), address),
            config.election.staleness_checker(),
            backend,
            self.hooks,
            logger,
        ))
    }
}
