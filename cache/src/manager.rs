//! Named cache registries.

use crate::builder::CacheBuilder;
use crate::error::{CacheError, Result};
use crate::handles::Cache;
use crate::shared::{CacheShared, ManagedCache};
use crate::status::{AtomicStatus, Status};

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::Mutex;

type Registry = HashMap<String, Arc<dyn ManagedCache>, ahash::RandomState>;

/// Owns a set of named caches and controls their lifecycle.
///
/// Caches are registered under their name by [`configure_cache`] and looked up
/// with the key, value and hasher types they were created with. A single lock
/// guards the registry, so creating, looking up, removing and closing are
/// mutually exclusive.
///
/// A cache that was closed directly through [`Cache::close`] is treated as
/// absent and dropped from the registry on the next lookup.
///
/// [`configure_cache`]: CacheManager::configure_cache
pub struct CacheManager {
  uri: String,
  status: AtomicStatus,
  caches: Mutex<Registry>,
}

impl fmt::Debug for CacheManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheManager")
      .field("uri", &self.uri)
      .field("status", &self.status.get())
      .field("caches", &self.caches.lock().len())
      .finish()
  }
}

impl CacheManager {
  /// Creates a started manager identified by `uri`.
  pub fn new(uri: impl Into<String>) -> Self {
    let uri = uri.into();
    tracing::debug!(uri = %uri, "cache manager started");
    Self {
      uri,
      status: AtomicStatus::new(Status::Started),
      caches: Mutex::new(Registry::default()),
    }
  }

  pub fn uri(&self) -> &str {
    &self.uri
  }

  pub fn status(&self) -> Status {
    self.status.get()
  }

  fn ensure_started(&self) -> Result<()> {
    match self.status.get() {
      Status::Started => Ok(()),
      _ => Err(CacheError::stopped("cache manager", &self.uri)),
    }
  }

  /// Returns the cache registered under `name`, creating it from `builder` if
  /// there is none.
  ///
  /// An existing started cache is returned as is and `builder` is dropped. A
  /// cache that was closed in the meantime is replaced by a new one.
  pub fn configure_cache<K, V, H>(
    &self,
    name: &str,
    builder: CacheBuilder<K, V, H>,
  ) -> Result<Cache<K, V, H>>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let mut caches = self.caches.lock();
    self.ensure_started()?;
    if name.is_empty() {
      return Err(CacheError::NullArgument("name"));
    }

    if let Some(existing) = caches.get(name) {
      if existing.status() == Status::Started {
        return downcast(existing.clone()).ok_or_else(|| CacheError::TypeMismatch {
          name: name.to_string(),
        });
      }
    }

    let shared = builder.build_shared_core(name.to_string())?;
    if let Some(replaced) = caches.insert(name.to_string(), shared.clone()) {
      replaced.stop();
    }
    tracing::debug!(manager = %self.uri, cache = %name, "cache configured");
    Ok(Cache { shared })
  }

  /// Looks up a started cache by name.
  ///
  /// Fails with `TypeMismatch` if the cache was created with different key,
  /// value or hasher types.
  pub fn get_cache<K, V, H>(&self, name: &str) -> Result<Option<Cache<K, V, H>>>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let mut caches = self.caches.lock();
    self.ensure_started()?;
    if name.is_empty() {
      return Err(CacheError::NullArgument("name"));
    }

    let existing = match caches.get(name) {
      Some(existing) => existing.clone(),
      None => return Ok(None),
    };
    if existing.status() != Status::Started {
      caches.remove(name);
      return Ok(None);
    }
    match downcast(existing) {
      Some(cache) => Ok(Some(cache)),
      None => Err(CacheError::TypeMismatch {
        name: name.to_string(),
      }),
    }
  }

  /// Stops and unregisters the named cache. Returns whether a started cache
  /// was removed.
  pub fn remove_cache(&self, name: &str) -> Result<bool> {
    let mut caches = self.caches.lock();
    self.ensure_started()?;
    if name.is_empty() {
      return Err(CacheError::NullArgument("name"));
    }

    let removed = caches.remove(name).is_some_and(|cache| cache.stop());
    if removed {
      tracing::debug!(manager = %self.uri, cache = %name, "cache removed");
    }
    Ok(removed)
  }

  /// A snapshot of the started caches, sorted by name.
  ///
  /// Later changes to the manager are not reflected in the snapshot. A closed
  /// manager returns an empty snapshot.
  pub fn caches(&self) -> Caches {
    let caches = self.caches.lock();
    let mut snapshot: Vec<AnyCache> = caches
      .values()
      .filter(|cache| cache.status() == Status::Started)
      .map(|cache| AnyCache {
        inner: cache.clone(),
      })
      .collect();
    snapshot.sort_by(|a, b| a.name().cmp(b.name()));
    Caches { caches: snapshot }
  }

  /// Stops every cache owned by the manager, then the manager itself.
  ///
  /// Closing a closed manager fails with `IllegalState`.
  pub fn close(&self) -> Result<()> {
    let mut caches = self.caches.lock();
    if !self.status.transition(Status::Started, Status::Stopped) {
      return Err(CacheError::stopped("cache manager", &self.uri));
    }
    for (_, cache) in caches.drain() {
      cache.stop();
    }
    tracing::debug!(uri = %self.uri, "cache manager closed");
    Ok(())
  }
}

fn downcast<K, V, H>(cache: Arc<dyn ManagedCache>) -> Option<Cache<K, V, H>>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  cache
    .as_any()
    .downcast::<CacheShared<K, V, H>>()
    .ok()
    .map(|shared| Cache { shared })
}

/// A type-erased handle to a cache owned by a [`CacheManager`].
#[derive(Clone)]
pub struct AnyCache {
  inner: Arc<dyn ManagedCache>,
}

impl AnyCache {
  pub fn name(&self) -> &str {
    self.inner.name()
  }

  pub fn status(&self) -> Status {
    self.inner.status()
  }

  /// Recovers the typed handle, if the cache has these key, value and hasher
  /// types.
  pub fn downcast<K, V, H>(&self) -> Option<Cache<K, V, H>>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    downcast(self.inner.clone())
  }

  /// Whether this handle and `cache` refer to the same cache.
  pub fn is<K, V, H>(&self, cache: &Cache<K, V, H>) -> bool {
    Arc::as_ptr(&self.inner) as *const () == Arc::as_ptr(&cache.shared) as *const ()
  }
}

impl PartialEq for AnyCache {
  fn eq(&self, other: &Self) -> bool {
    Arc::as_ptr(&self.inner) as *const () == Arc::as_ptr(&other.inner) as *const ()
  }
}

impl Eq for AnyCache {}

impl fmt::Debug for AnyCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AnyCache")
      .field("name", &self.name())
      .field("status", &self.status())
      .finish()
  }
}

/// An immutable snapshot of the caches owned by a manager.
#[derive(Debug, Clone, Default)]
pub struct Caches {
  caches: Vec<AnyCache>,
}

impl Caches {
  pub fn len(&self) -> usize {
    self.caches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.caches.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, AnyCache> {
    self.caches.iter()
  }

  pub fn get(&self, name: &str) -> Option<&AnyCache> {
    self.caches.iter().find(|cache| cache.name() == name)
  }

  pub fn names(&self) -> Vec<&str> {
    self.caches.iter().map(AnyCache::name).collect()
  }
}

impl<'a> IntoIterator for &'a Caches {
  type Item = &'a AnyCache;
  type IntoIter = std::slice::Iter<'a, AnyCache>;

  fn into_iter(self) -> Self::IntoIter {
    self.caches.iter()
  }
}

impl IntoIterator for Caches {
  type Item = AnyCache;
  type IntoIter = std::vec::IntoIter<AnyCache>;

  fn into_iter(self) -> Self::IntoIter {
    self.caches.into_iter()
  }
}
