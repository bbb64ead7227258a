use crate::error::{BuildError, Result};
use crate::expiry::{EternalExpiryPolicy, ExpiryPolicy};
use crate::handles::Cache;
use crate::listener::ListenerRegistration;
use crate::shared::CacheShared;
use crate::store::ShardedStore;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

/// The configuration of a cache, used to create it either directly through
/// [`CacheBuilder::build`] or through a [`CacheManager`].
///
/// [`CacheManager`]: crate::CacheManager
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  pub(crate) shards: usize,
  pub(crate) hasher: H,
  expiry_policy: Arc<dyn ExpiryPolicy>,
  listeners: Vec<ListenerRegistration<K, V>>,
  _key_marker: PhantomData<K>,
  _value_marker: PhantomData<V>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("shards", &self.shards)
      .field("expiry_policy", &self.expiry_policy)
      .field("listeners", &self.listeners.len())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the number of concurrent shards to use. It is rounded up to the
  /// next power of two when the cache is built.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Sets the expiry policy. Defaults to [`EternalExpiryPolicy`].
  pub fn expiry_policy<P>(mut self, policy: P) -> Self
  where
    P: ExpiryPolicy + 'static,
  {
    self.expiry_policy = Arc::new(policy);
    self
  }

  /// Registers a listener as soon as the cache is created.
  pub fn listener(mut self, registration: ListenerRegistration<K, V>) -> Self {
    self.listeners.push(registration);
    self
  }

  /// Validates the builder configuration.
  pub fn validate(&self) -> std::result::Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    Ok(())
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      hasher: H::default(),
      expiry_policy: Arc::new(EternalExpiryPolicy),
      listeners: Vec::new(),
      _key_marker: PhantomData,
      _value_marker: PhantomData,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(feature = "rapidhash")]
impl<K, V> CacheBuilder<K, V, rapidhash::RapidRandomState> {
  pub fn rapidhash() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Sets the hasher for the cache.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Builds a standalone, started `Cache` that is not owned by any manager.
  pub fn build(self, name: impl Into<String>) -> Result<Cache<K, V, H>> {
    let shared = self.build_shared_core(name.into())?;
    Ok(Cache { shared })
  }

  /// Central logic to construct and start the shared core of the cache.
  pub(crate) fn build_shared_core(self, name: String) -> Result<Arc<CacheShared<K, V, H>>> {
    self.validate()?;

    let shards = self.shards.next_power_of_two();
    let store = ShardedStore::new(shards, self.hasher, self.expiry_policy);
    let shared = Arc::new(CacheShared::new(name, store));

    for registration in self.listeners {
      shared.dispatcher.register(registration)?;
    }

    shared.start();
    Ok(shared)
  }
}
