use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
}

/// An error raised by a listener callback while it was being notified.
///
/// Returning one from a callback does not undo the mutation that produced the
/// event. It is reported back to the caller of the triggering operation once
/// every listener has been notified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache entry listener failed: {message}")]
pub struct ListenerError {
  message: String,
}

impl ListenerError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// The error type for all cache, manager and provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
  /// A required argument was missing or empty.
  #[error("argument `{0}` must not be empty")]
  NullArgument(&'static str),

  /// The operation was invoked on a stopped cache or cache manager.
  #[error("illegal state: {0}")]
  IllegalState(String),

  /// A listener registration was refused. Cache state is unaffected.
  #[error("listener registration rejected: {0}")]
  ListenerRegistrationRejected(String),

  /// A listener failed while being notified. The store mutation that
  /// triggered the notification has already been committed.
  #[error(transparent)]
  ListenerNotification(#[from] ListenerError),

  /// A cache exists under the requested name, but with different key, value
  /// or hasher types.
  #[error("cache `{name}` is configured with different key/value types")]
  TypeMismatch { name: String },

  /// The cache configuration was invalid.
  #[error("invalid cache configuration: {0}")]
  Build(#[from] BuildError),
}

impl CacheError {
  pub(crate) fn stopped(what: &str, name: &str) -> Self {
    CacheError::IllegalState(format!("{} `{}` is stopped", what, name))
  }
}

/// A specialized `Result` type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
