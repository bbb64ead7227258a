use crate::dispatch::EventDispatcher;
use crate::error::{CacheError, Result};
use crate::status::{AtomicStatus, Status};
use crate::store::{Action, ShardedStore, Updated};

use std::any::Any;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) name: String,
  pub(crate) status: AtomicStatus,
  pub(crate) store: ShardedStore<K, V, H>,
  pub(crate) dispatcher: EventDispatcher<K, V>,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("name", &self.name)
      .field("status", &self.status.get())
      .field("store", &self.store)
      .field("dispatcher", &self.dispatcher)
      .finish()
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(name: String, store: ShardedStore<K, V, H>) -> Self {
    Self {
      name,
      status: AtomicStatus::new(Status::Uninitialised),
      store,
      dispatcher: EventDispatcher::new(),
    }
  }

  /// Fails with `IllegalState` unless the cache is started.
  #[inline]
  pub(crate) fn ensure_started(&self) -> Result<()> {
    match self.status.get() {
      Status::Started => Ok(()),
      _ => Err(CacheError::stopped("cache", &self.name)),
    }
  }

  /// Runs a single-key update. A write that lands after `stop` cleared the
  /// store is dropped again.
  pub(crate) fn update<R, F>(&self, key: &K, f: F) -> Updated<V, R>
  where
    F: FnOnce(Option<Arc<V>>) -> (Action<V>, R),
  {
    let updated = self.store.update(key, f);
    if self.status.get() == Status::Stopped {
      self.store.clear();
    }
    updated
  }

  pub(crate) fn start(&self) {
    if self.status.transition(Status::Uninitialised, Status::Started) {
      tracing::debug!(cache = %self.name, "cache started");
    }
  }

  /// Stops the cache, dropping its entries and listener registrations.
  /// Returns `false` if it was not running.
  pub(crate) fn stop(&self) -> bool {
    let stopped = self.status.transition(Status::Started, Status::Stopped)
      || self.status.transition(Status::Uninitialised, Status::Stopped);
    if stopped {
      self.store.clear();
      self.dispatcher.clear();
      tracing::debug!(cache = %self.name, "cache stopped");
    }
    stopped
  }
}

/// The type-erased view a cache manager keeps of the caches it owns.
pub(crate) trait ManagedCache: Send + Sync + fmt::Debug {
  fn name(&self) -> &str;
  fn status(&self) -> Status;
  fn stop(&self) -> bool;
  fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, V, H> ManagedCache for CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn status(&self) -> Status {
    self.status.get()
  }

  fn stop(&self) -> bool {
    CacheShared::stop(self)
  }

  fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
    self
  }
}
