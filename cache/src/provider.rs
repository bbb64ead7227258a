//! The process-wide entry point for obtaining cache managers.

use crate::error::{CacheError, Result};
use crate::manager::CacheManager;
use crate::status::Status;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// The URI of the manager returned by [`CachingProvider::default_cache_manager`].
pub const DEFAULT_URI: &str = "fibre-jcache://default";

// The one and only global provider instance.
static GLOBAL_PROVIDER: Lazy<CachingProvider> = Lazy::new(CachingProvider::new);

/// Hands out one [`CacheManager`] per URI.
#[derive(Debug, Default)]
pub struct CachingProvider {
  managers: Mutex<HashMap<String, Arc<CacheManager>, ahash::RandomState>>,
}

impl CachingProvider {
  /// Provides a reference to the global provider instance.
  ///
  /// # Examples
  ///
  /// ```
  /// use fibre_jcache::{CacheBuilder, CachingProvider};
  ///
  /// let manager = CachingProvider::global().default_cache_manager();
  /// let cache = manager
  ///   .configure_cache("greetings", CacheBuilder::<u32, String>::new())
  ///   .unwrap();
  /// cache.put(1, "hello".to_string()).unwrap();
  /// ```
  pub fn global() -> &'static CachingProvider {
    &GLOBAL_PROVIDER
  }

  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the started manager for `uri`, creating it if there is none or
  /// if the previous one was closed.
  pub fn cache_manager(&self, uri: &str) -> Result<Arc<CacheManager>> {
    if uri.is_empty() {
      return Err(CacheError::NullArgument("uri"));
    }
    Ok(self.started_manager(uri))
  }

  /// Returns the started manager for [`DEFAULT_URI`].
  pub fn default_cache_manager(&self) -> Arc<CacheManager> {
    self.started_manager(DEFAULT_URI)
  }

  fn started_manager(&self, uri: &str) -> Arc<CacheManager> {
    let mut managers = self.managers.lock();
    if let Some(manager) = managers.get(uri) {
      if manager.status() == Status::Started {
        return manager.clone();
      }
    }
    let manager = Arc::new(CacheManager::new(uri));
    managers.insert(uri.to_string(), manager.clone());
    manager
  }

  /// Closes every started manager and forgets all of them.
  pub fn close(&self) {
    let drained: Vec<_> = self.managers.lock().drain().collect();
    for (uri, manager) in drained {
      if manager.status() == Status::Started {
        // Lost a race with a direct close; nothing left to do.
        if let Err(err) = manager.close() {
          tracing::debug!(uri = %uri, error = %err, "cache manager already closed");
        }
      }
    }
  }
}
