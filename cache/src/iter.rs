//! Contains types for iterating over a cache's contents.

use crate::entry_api::Entry;
use crate::error::{CacheError, Result};
use crate::handles::Cache;

use std::collections::VecDeque;
use std::hash::{BuildHasher, Hash};

/// A lazy iterator over the live entries of a `Cache`.
///
/// The iterator walks the cache one shard at a time. For each shard it copies
/// the resident keys under a brief read lock, then reads every key through the
/// cache as it is yielded. Each yielded entry therefore counts as a read, and
/// entries that turn out to be expired are evicted and skipped.
///
/// **Important**: This iterator does **not** provide a point-in-time snapshot
/// of the cache. Items inserted into a shard after it has been scanned will be
/// missed, and items removed by other threads before they are reached are
/// skipped.
pub struct Iter<'a, K, V, H> {
  cache: &'a Cache<K, V, H>,
  shard_index: usize,
  pending: VecDeque<K>,
  last_key: Option<K>,
  finished: bool,
}

impl<'a, K, V, H> Iter<'a, K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  pub(crate) fn new(cache: &'a Cache<K, V, H>) -> Self {
    Self {
      cache,
      shard_index: 0,
      pending: VecDeque::new(),
      last_key: None,
      finished: false,
    }
  }

  /// Loads the keys of the next non-empty shard. Returns `false` once every
  /// shard has been visited.
  fn refill(&mut self) -> bool {
    let store = &self.cache.shared.store;
    while self.pending.is_empty() {
      if self.shard_index >= store.num_shards() {
        return false;
      }
      self.pending.extend(store.shard_keys(self.shard_index));
      self.shard_index += 1;
    }
    true
  }

  /// Removes the entry most recently returned by `next`, emitting `Removed`
  /// if it was still present. An entry whose read notification failed counts
  /// as returned.
  ///
  /// Fails with `IllegalState` if `next` has not yet returned an entry, or if
  /// that entry was already removed through this iterator.
  pub fn remove(&mut self) -> Result<bool> {
    match self.last_key.take() {
      Some(key) => self.cache.remove(&key),
      None => Err(CacheError::IllegalState(
        "remove called before next returned an entry".to_string(),
      )),
    }
  }
}

impl<'a, K, V, H> Iterator for Iter<'a, K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  type Item = Result<Entry<K, V>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    // A stopped cache ends the iteration after reporting it once.
    if let Err(err) = self.cache.shared.ensure_started() {
      self.finished = true;
      self.pending.clear();
      self.last_key = None;
      return Some(Err(err));
    }

    loop {
      if !self.refill() {
        self.finished = true;
        self.last_key = None;
        return None;
      }

      let Some(key) = self.pending.pop_front() else {
        continue;
      };

      match self.cache.read_entry(key.clone()) {
        Ok(Some(entry)) => {
          self.last_key = Some(key);
          return Some(Ok(entry));
        }
        // Removed or expired since the shard was scanned.
        Ok(None) => continue,
        // The entry was read and listeners were told; it can still be removed.
        Err(err @ CacheError::ListenerNotification(_)) => {
          self.last_key = Some(key);
          return Some(Err(err));
        }
        Err(err) => {
          if matches!(err, CacheError::IllegalState(_)) {
            self.finished = true;
            self.pending.clear();
          }
          self.last_key = None;
          return Some(Err(err));
        }
      }
    }
  }
}
