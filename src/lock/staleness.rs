use std::time::Duration;
use std::time::SystemTime;

use super::LeaseRecord;

/// Returns true when `record` still describes a live holder that must not be
/// preempted by `self_id`.
///
/// A record held by `self_id` never blocks its own candidate, so a process
/// can reclaim a lease it abandoned. Any record whose last heartbeat is at
/// least `interval * multiplier` old is expired, whoever holds it.
pub fn is_lease_valid(
    record: &LeaseRecord,
    self_id: &str,
    interval: Duration,
    multiplier: u32,
    now: SystemTime,
) -> bool {
    record.heartbeat_age(now) < interval * multiplier && !record.is_held_by(self_id)
}

/// Failure detector deciding whether a lease has gone stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessChecker {
    interval: Duration,
    multiplier: u32,
}

impl StalenessChecker {
    pub const fn new(
        interval: Duration,
        multiplier: u32,
    ) -> Self {
        Self {
            interval,
            multiplier,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Staleness threshold: heartbeat interval times the miss multiplier.
    pub fn ttl(&self) -> Duration {
        self.interval * self.multiplier
    }

    pub fn is_valid(
        &self,
        record: &LeaseRecord,
        self_id: &str,
    ) -> bool {
        self.is_valid_at(record, self_id, SystemTime::now())
    }

    pub fn is_valid_at(
        &self,
        record: &LeaseRecord,
        self_id: &str,
        now: SystemTime,
    ) -> bool {
        is_lease_valid(record, self_id, self.interval, self.multiplier, now)
    }
}
