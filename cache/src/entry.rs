use crate::expiry::{Expiry, ExpiryContext};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A container for a value in the cache, holding all necessary metadata.
///
/// Timestamps are nanoseconds since the cache epoch. Access metadata is atomic
/// so that reads can be recorded while only holding the shard's read lock.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  value: Arc<V>,
  created_at: u64,
  last_modified: u64,
  last_accessed: AtomicU64,
  /// The expiration deadline. 0 means the entry never expires.
  expires_at: AtomicU64,
}

impl<V> CacheEntry<V> {
  /// Creates a new `CacheEntry` whose lifetime starts at `now`.
  pub(crate) fn new(value: Arc<V>, now: u64, expiry: Expiry) -> Self {
    Self {
      value,
      created_at: now,
      last_modified: now,
      last_accessed: AtomicU64::new(now),
      expires_at: AtomicU64::new(expiry.deadline_from(now)),
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn created_at(&self) -> u64 {
    self.created_at
  }

  #[inline]
  pub(crate) fn last_modified(&self) -> u64 {
    self.last_modified
  }

  #[inline]
  pub(crate) fn last_accessed(&self) -> u64 {
    self.last_accessed.load(Ordering::Relaxed)
  }

  /// The entry's history as seen at `now`, before `now` is recorded.
  pub(crate) fn expiry_context(&self, now: u64) -> ExpiryContext {
    ExpiryContext::from_nanos(self.created_at, self.last_accessed(), self.last_modified, now)
  }

  /// Records a read. A new expiry, if any, restarts the entry's lifetime.
  #[inline]
  pub(crate) fn touch(&self, now: u64, expiry: Option<Expiry>) {
    self.last_accessed.store(now, Ordering::Relaxed);
    if let Some(expiry) = expiry {
      self
        .expires_at
        .store(expiry.deadline_from(now), Ordering::Relaxed);
    }
  }

  /// Replaces the value. Without a new expiry the old deadline is kept.
  pub(crate) fn update(&mut self, value: Arc<V>, now: u64, expiry: Option<Expiry>) -> Arc<V> {
    self.last_modified = now;
    self.last_accessed.store(now, Ordering::Relaxed);
    if let Some(expiry) = expiry {
      self
        .expires_at
        .store(expiry.deadline_from(now), Ordering::Relaxed);
    }
    std::mem::replace(&mut self.value, value)
  }

  /// Checks if the entry's deadline has passed.
  #[inline]
  pub(crate) fn is_expired(&self, now: u64) -> bool {
    let expires_at = self.expires_at.load(Ordering::Relaxed);
    expires_at > 0 && now >= expires_at
  }
}
