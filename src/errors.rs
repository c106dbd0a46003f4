//! Master Election Error Hierarchy
//!
//! Defines the error types surfaced by the election engine, categorized by
//! who is expected to react to them:
//! - lifecycle misuse is returned to the caller of `start`/`stop`
//! - backend failures are logged inside a step and retried on the next tick
//! - lease loss is the demotion signal of a leader's heartbeat renewal

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Controller lifecycle misuse
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Failures reaching or updating the lock store
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Ownership of the lease changed or the record vanished
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// The heartbeat loop task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("master is started before")]
    AlreadyStarted,

    #[error("master has not started")]
    NotStarted,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Embedded database or remote store failures
    #[error("Lock storage failure: {0}")]
    Storage(String),

    /// Lease record encoding failures
    #[error(transparent)]
    Serialization(#[from] bincode::Error),

    /// The backend cannot currently serve requests
    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),

    /// Optimistic writes kept losing against concurrent writers
    #[error("Lease record kept changing under conditional write after {retries} retries")]
    Conflict { retries: usize },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LeaseError {
    /// No lease record exists for the election scope
    #[error("lease record not found")]
    NotFound,

    /// The lease record is held by someone else
    #[error("lease is held by {holder_id}")]
    NotOwned { holder_id: String },
}

impl Error {
    /// Returns true when the error is the designed demotion signal rather
    /// than an infrastructure failure.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, Error::Lease(_))
    }

    /// Short label used for logs and metric tagging.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Lifecycle(_) => "lifecycle",
            Error::Backend(_) => "backend",
            Error::Lease(_) => "lease_lost",
            Error::TaskFailed(_) => "task_failed",
            Error::Fatal(_) => "fatal",
        }
    }
}

// ============== Conversion Implementations ============== //
impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        BackendError::Storage(err.to_string()).into()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        BackendError::Storage(err.to_string()).into()
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        BackendError::Serialization(err).into()
    }
}
