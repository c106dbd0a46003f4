//! Concrete [`LockBackend`](super::LockBackend) implementations.
//!
//! All adaptors follow the same optimistic protocol: read the current
//! record, decide locally, then write conditionally on the observed
//! `generation`. A lost conditional write means another writer got there
//! first.
mod mem;
mod sled;
mod sql;

pub use self::mem::*;
pub use self::sled::*;
pub use self::sql::*;

use std::time::SystemTime;

use super::LeaseRecord;
use super::StalenessChecker;

/// Whether `candidate` may take over the scope currently described by
/// `current`.
pub(crate) fn may_acquire(
    current: Option<&LeaseRecord>,
    candidate: &LeaseRecord,
    now: SystemTime,
    checker: &StalenessChecker,
) -> bool {
    match current {
        None => true,
        Some(record) => !checker.is_valid_at(record, &candidate.holder_id, now),
    }
}
