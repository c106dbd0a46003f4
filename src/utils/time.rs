use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Sentinel timestamp of a cleared or never-acquired lease record.
pub const ZERO_TIME: SystemTime = UNIX_EPOCH;

/// Elapsed wall-clock time from `earlier` to `now`.
///
/// A timestamp ahead of `now` (clock skew between processes) counts as zero
/// elapsed time, i.e. the freshest possible heartbeat.
pub fn elapsed_between(
    earlier: SystemTime,
    now: SystemTime,
) -> Duration {
    now.duration_since(earlier).unwrap_or(Duration::ZERO)
}

/// return millisecond since unix epoch, 0 for timestamps before it
pub fn timestamp_millis(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

pub fn is_zero_time(t: SystemTime) -> bool {
    t == ZERO_TIME
}

/// Inverse of [`timestamp_millis`]; non-positive values map to [`ZERO_TIME`].
pub fn from_millis(ms: i64) -> SystemTime {
    match u64::try_from(ms) {
        Ok(ms) if ms > 0 => UNIX_EPOCH + Duration::from_millis(ms),
        _ => ZERO_TIME,
    }
}
