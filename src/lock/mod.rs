//! Exclusive-lock abstraction the election engine runs against.
//!
//! A backend owns at most one [`LeaseRecord`] per election scope and exposes
//! four operations that are atomic with respect to each other. Concrete
//! stores live under [`adaptors`].
mod lease_record;
mod staleness;

pub mod adaptors;

pub use adaptors::*;
pub use lease_record::*;
pub use staleness::*;


use std::time::SystemTime;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use crate::Result;

/// Upper bound of read-compare-write rounds an adaptor spends on one
/// operation before reporting [`crate::BackendError::Conflict`].
pub const MAX_CAS_RETRIES: usize = 8;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// Claims the lease for `candidate` as of `now`.
    ///
    /// Succeeds when no record exists, or when the existing record is held by
    /// a different identity and is stale under `checker`. The caller supplies
    /// the staleness rule; a backend keeps no TTL of its own. A record left
    /// behind by `candidate.holder_id` itself is reclaimed with a new tenure
    /// rather than treated as a competing holder. Among concurrent callers at most one
    /// observes `Ok(true)` for a given lease generation.
    async fn try_acquire(
        &self,
        candidate: &LeaseRecord,
        now: SystemTime,
        checker: &StalenessChecker,
    ) -> Result<bool>;

    /// Removes the record if and only if it is held by `candidate_id`.
    ///
    /// Returns `Ok(false)` when there was nothing to release.
    async fn release(
        &self,
        candidate_id: &str,
    ) -> Result<bool>;

    /// Moves the heartbeat of a record held by `candidate_id` forward and
    /// returns the persisted heartbeat timestamp.
    ///
    /// Fails with [`crate::LeaseError`] when the record is gone or owned by
    /// someone else; this is the demotion signal for a leader.
    async fn renew_heartbeat(
        &self,
        candidate_id: &str,
    ) -> Result<SystemTime>;

    /// Current holder of the scope, `Ok(None)` when there is none.
    async fn read_current(&self) -> Result<Option<LeaseRecord>>;
}
