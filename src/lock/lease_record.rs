use std::fmt;
use std::time::Duration;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

use crate::time::elapsed_between;
use crate::time::timestamp_millis;
use crate::time::ZERO_TIME;

/// Holder description of the single lease of an election scope.
///
/// The same type describes both the record persisted by a backend and a
/// candidate's local view of its own claim. Cleared or never-acquired
/// timestamps hold [`ZERO_TIME`] instead of being absent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Opaque unique identity of the holder
    pub holder_id: String,
    /// User supplied version tag
    pub version: String,
    /// Network address of the holder
    pub holder_address: String,
    pub acquired_at: SystemTime,
    pub last_heartbeat_at: SystemTime,
    /// Backend-assigned revision, strictly increasing on every write of the
    /// scope (acquisition and heartbeat alike).
    ///
    /// Conditional writes compare it to detect concurrent modification.
    /// Zero means the record has never been written by a backend.
    pub generation: u64,
}

impl LeaseRecord {
    pub fn new(
        holder_id: impl Into<String>,
        version: impl Into<String>,
        holder_address: impl Into<String>,
    ) -> Self {
        Self {
            holder_id: holder_id.into(),
            version: version.into(),
            holder_address: holder_address.into(),
            acquired_at: ZERO_TIME,
            last_heartbeat_at: ZERO_TIME,
            generation: 0,
        }
    }

    /// Marks the start of a tenure: both timestamps move to `at`.
    pub fn start_at(
        &mut self,
        at: SystemTime,
    ) -> &mut Self {
        self.acquired_at = at;
        self.last_heartbeat_at = at;
        self
    }

    /// Records a heartbeat. The timestamp never moves backwards within a
    /// tenure, even if the wall clock does.
    pub fn set_last_heartbeat(
        &mut self,
        at: SystemTime,
    ) -> &mut Self {
        if at > self.last_heartbeat_at {
            self.last_heartbeat_at = at;
        }
        self
    }

    /// Resets the tenure timestamps to the sentinel zero.
    pub fn clear(&mut self) -> &mut Self {
        self.acquired_at = ZERO_TIME;
        self.last_heartbeat_at = ZERO_TIME;
        self.generation = 0;
        self
    }

    pub fn is_cleared(&self) -> bool {
        self.acquired_at == ZERO_TIME && self.last_heartbeat_at == ZERO_TIME
    }

    pub fn is_held_by(
        &self,
        candidate_id: &str,
    ) -> bool {
        self.holder_id == candidate_id
    }

    /// Time since the last heartbeat as observed at `now`.
    pub fn heartbeat_age(
        &self,
        now: SystemTime,
    ) -> Duration {
        elapsed_between(self.last_heartbeat_at, now)
    }

    /// Builds the record a successful acquisition persists: the candidate's
    /// identity with a fresh tenure starting at `now`.
    pub(crate) fn claimed_by(
        candidate: &LeaseRecord,
        now: SystemTime,
        generation: u64,
    ) -> Self {
        let mut record = candidate.clone();
        record.start_at(now);
        record.generation = generation;
        record
    }
}

impl fmt::Debug for LeaseRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LeaseRecord")
            .field("holder_id", &self.holder_id)
            .field("version", &self.version)
            .field("holder_address", &self.holder_address)
            .field("acquired_at_ms", &timestamp_millis(self.acquired_at))
            .field("last_heartbeat_at_ms", &timestamp_millis(self.last_heartbeat_at))
            .field("generation", &self.generation)
            .finish()
    }
}
