use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::lock::adaptors::may_acquire;
use crate::BackendError;
use crate::LeaseError;
use crate::LeaseRecord;
use crate::LockBackend;
use crate::Result;
use crate::StalenessChecker;
use crate::MAX_CAS_RETRIES;

/// In-process lock backend holding one lease record.
///
/// Suitable for tasks sharing one process and for tests. Every write is
/// conditional on the `generation` observed by the preceding read, the same
/// protocol a remote store would need.
#[derive(Debug)]
pub struct MemLockBackend {
    slot: Mutex<Option<LeaseRecord>>,
    revisions: AtomicU64,
    available: AtomicBool,
}

impl MemLockBackend {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            revisions: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage: while unavailable every operation fails with
    /// [`BackendError::Unavailable`].
    pub fn set_available(
        &self,
        available: bool,
    ) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Replaces the stored record unconditionally, bypassing the protocol.
    ///
    /// Meant for seeding a scope, e.g. with a stale record left by a crashed
    /// holder.
    pub fn put(
        &self,
        mut record: LeaseRecord,
    ) {
        record.generation = self.next_generation();
        *self.slot.lock() = Some(record);
    }

    fn next_generation(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("memory lock backend is offline".to_string()).into())
        }
    }

    fn snapshot(&self) -> Option<LeaseRecord> {
        self.slot.lock().clone()
    }

    /// Installs `new` only if the stored generation still equals `expected`.
    fn compare_and_swap(
        &self,
        expected: Option<u64>,
        new: Option<LeaseRecord>,
    ) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|r| r.generation) != expected {
            return false;
        }
        *slot = new;
        true
    }
}

impl Default for MemLockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockBackend for MemLockBackend {
    async fn try_acquire(
        &self,
        candidate: &LeaseRecord,
        now: SystemTime,
        checker: &StalenessChecker,
    ) -> Result<bool> {
        self.ensure_available()?;

        let observed = self.snapshot();
        if !may_acquire(observed.as_ref(), candidate, now, checker) {
            trace!("lease held by a live holder: {:?}", observed);
            return Ok(false);
        }

        let claimed = LeaseRecord::claimed_by(candidate, now, self.next_generation());
        let acquired = self.compare_and_swap(observed.map(|r| r.generation), Some(claimed));
        debug!("{} try_acquire: {}", candidate.holder_id, acquired);
        Ok(acquired)
    }

    async fn release(
        &self,
        candidate_id: &str,
    ) -> Result<bool> {
        self.ensure_available()?;

        for _ in 0..MAX_CAS_RETRIES {
            let observed = match self.snapshot() {
                Some(record) if record.is_held_by(candidate_id) => record,
                _ => return Ok(false),
            };
            if self.compare_and_swap(Some(observed.generation), None) {
                return Ok(true);
            }
        }

        warn!("release of {} kept conflicting", candidate_id);
        Err(BackendError::Conflict {
            retries: MAX_CAS_RETRIES,
        }
        .into())
    }

    async fn renew_heartbeat(
        &self,
        candidate_id: &str,
    ) -> Result<SystemTime> {
        self.ensure_available()?;

        for _ in 0..MAX_CAS_RETRIES {
            let mut record = self.snapshot().ok_or(LeaseError::NotFound)?;
            if !record.is_held_by(candidate_id) {
                return Err(LeaseError::NotOwned {
                    holder_id: record.holder_id,
                }
                .into());
            }

            let expected = record.generation;
            record.set_last_heartbeat(SystemTime::now());
            record.generation = self.next_generation();
            let heartbeat = record.last_heartbeat_at;
            if self.compare_and_swap(Some(expected), Some(record)) {
                return Ok(heartbeat);
            }
        }

        warn!("heartbeat of {} kept conflicting", candidate_id);
        Err(BackendError::Conflict {
            retries: MAX_CAS_RETRIES,
        }
        .into())
    }

    async fn read_current(&self) -> Result<Option<LeaseRecord>> {
        self.ensure_available()?;
        Ok(self.snapshot())
    }
}
