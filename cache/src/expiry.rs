//! Expiry policies decide how long an entry stays visible.
//!
//! A policy is consulted whenever an entry is created, accessed or updated.
//! The resulting deadline is stored on the entry and checked lazily the next
//! time the entry is touched; nothing is swept in the background.

use crate::time;

use std::fmt;
use std::time::{Duration, Instant};

/// How long an entry may live, measured from the moment the policy is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
  /// The entry never expires.
  Eternal,
  /// The entry expires once the duration has elapsed. `Duration::ZERO`
  /// expires the entry immediately.
  After(Duration),
}

impl Expiry {
  /// Converts the expiry into an absolute deadline in epoch nanoseconds.
  /// `0` means "no deadline".
  #[inline]
  pub(crate) fn deadline_from(self, now_nanos: u64) -> u64 {
    match self {
      Expiry::Eternal => 0,
      Expiry::After(duration) => time::add_nanos(now_nanos, duration),
    }
  }
}

impl From<Duration> for Expiry {
  fn from(duration: Duration) -> Self {
    Expiry::After(duration)
  }
}

/// The history of an entry at the moment a policy is consulted.
///
/// Timestamps are taken before the triggering operation is recorded, so on
/// access `last_accessed` is the previous read. For a new entry every field
/// equals `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryContext {
  pub created_at: Instant,
  pub last_accessed: Instant,
  pub last_modified: Instant,
  pub now: Instant,
}

impl ExpiryContext {
  pub(crate) fn from_nanos(
    created_at: u64,
    last_accessed: u64,
    last_modified: u64,
    now: u64,
  ) -> Self {
    Self {
      created_at: time::nanos_to_instant(created_at),
      last_accessed: time::nanos_to_instant(last_accessed),
      last_modified: time::nanos_to_instant(last_modified),
      now: time::nanos_to_instant(now),
    }
  }

  pub(crate) fn fresh(now: u64) -> Self {
    Self::from_nanos(now, now, now, now)
  }

  /// Time elapsed since the entry was created.
  pub fn age(&self) -> Duration {
    self.now.saturating_duration_since(self.created_at)
  }
}

/// Computes the lifetime of cache entries.
///
/// `expiry_for_access` and `expiry_for_update` return `None` to leave the
/// entry's current deadline untouched. Returned durations are measured from
/// [`ExpiryContext::now`].
pub trait ExpiryPolicy: Send + Sync + fmt::Debug {
  /// Called when an entry is created.
  fn expiry_for_creation(&self, ctx: &ExpiryContext) -> Expiry;

  /// Called when an existing entry is read.
  fn expiry_for_access(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    None
  }

  /// Called when an existing entry's value is replaced.
  fn expiry_for_update(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    None
  }
}

/// Entries never expire. This is the default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EternalExpiryPolicy;

impl ExpiryPolicy for EternalExpiryPolicy {
  fn expiry_for_creation(&self, _ctx: &ExpiryContext) -> Expiry {
    Expiry::Eternal
  }
}

/// Entries expire a fixed duration after they were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedExpiryPolicy(pub Duration);

impl ExpiryPolicy for CreatedExpiryPolicy {
  fn expiry_for_creation(&self, _ctx: &ExpiryContext) -> Expiry {
    Expiry::After(self.0)
  }
}

/// Entries expire a fixed duration after they were last created or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessedExpiryPolicy(pub Duration);

impl ExpiryPolicy for AccessedExpiryPolicy {
  fn expiry_for_creation(&self, _ctx: &ExpiryContext) -> Expiry {
    Expiry::After(self.0)
  }

  fn expiry_for_access(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    Some(Expiry::After(self.0))
  }
}

/// Entries expire a fixed duration after they were last created or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifiedExpiryPolicy(pub Duration);

impl ExpiryPolicy for ModifiedExpiryPolicy {
  fn expiry_for_creation(&self, _ctx: &ExpiryContext) -> Expiry {
    Expiry::After(self.0)
  }

  fn expiry_for_update(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    Some(Expiry::After(self.0))
  }
}

/// Entries expire a fixed duration after they were last touched in any way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchedExpiryPolicy(pub Duration);

impl ExpiryPolicy for TouchedExpiryPolicy {
  fn expiry_for_creation(&self, _ctx: &ExpiryContext) -> Expiry {
    Expiry::After(self.0)
  }

  fn expiry_for_access(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    Some(Expiry::After(self.0))
  }

  fn expiry_for_update(&self, _ctx: &ExpiryContext) -> Option<Expiry> {
    Some(Expiry::After(self.0))
  }
}
