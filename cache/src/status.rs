use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle state of a cache or cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
  /// Created but not yet started.
  Uninitialised,
  /// Fully operational.
  Started,
  /// Shut down. Only status inspection remains valid.
  Stopped,
}

impl Status {
  #[inline]
  fn as_u8(self) -> u8 {
    match self {
      Status::Uninitialised => 0,
      Status::Started => 1,
      Status::Stopped => 2,
    }
  }

  #[inline]
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => Status::Uninitialised,
      1 => Status::Started,
      _ => Status::Stopped,
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Status::Uninitialised => write!(f, "uninitialised"),
      Status::Started => write!(f, "started"),
      Status::Stopped => write!(f, "stopped"),
    }
  }
}

/// A `Status` that can be read and transitioned concurrently.
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
  pub(crate) fn new(status: Status) -> Self {
    Self(AtomicU8::new(status.as_u8()))
  }

  #[inline]
  pub(crate) fn get(&self) -> Status {
    Status::from_u8(self.0.load(Ordering::Acquire))
  }

  /// Moves from `from` to `to`. Returns `false` if the current status was not `from`.
  pub(crate) fn transition(&self, from: Status, to: Status) -> bool {
    self
      .0
      .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}
