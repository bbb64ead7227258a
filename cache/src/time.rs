use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into a `Duration` since the cache's epoch.
#[inline]
pub(crate) fn instant_to_duration(instant: Instant) -> Duration {
  instant.saturating_duration_since(*CACHE_EPOCH)
}

/// Converts epoch nanoseconds back into an `Instant`.
#[inline]
pub(crate) fn nanos_to_instant(nanos: u64) -> Instant {
  *CACHE_EPOCH + Duration::from_nanos(nanos)
}

/// The current time in nanoseconds since the epoch.
///
/// The result is never zero, so `0` can be used as a "no deadline" marker.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  (instant_to_duration(Instant::now()).as_nanos() as u64).max(1)
}

/// Adds a duration to a nanosecond timestamp, saturating instead of wrapping.
#[inline]
pub(crate) fn add_nanos(base: u64, duration: Duration) -> u64 {
  base.saturating_add(duration.as_nanos().min(u64::MAX as u128) as u64)
}
