use crate::entry::CacheEntry;
use crate::expiry::{ExpiryContext, ExpiryPolicy};
use crate::time;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

type Shard<K, V, H> = RwLock<HashMap<K, CacheEntry<V>, H>>;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// A live entry as observed by a lookup.
#[derive(Debug)]
pub(crate) struct Found<V> {
  pub(crate) value: Arc<V>,
  pub(crate) created_at: u64,
  pub(crate) last_modified: u64,
  pub(crate) last_accessed: u64,
}

impl<V> Found<V> {
  fn of(entry: &CacheEntry<V>) -> Self {
    Self {
      value: entry.value(),
      created_at: entry.created_at(),
      last_modified: entry.last_modified(),
      last_accessed: entry.last_accessed(),
    }
  }
}

/// The outcome of a single-key lookup.
#[derive(Debug)]
pub(crate) enum Lookup<V> {
  /// A live entry was found and its access was recorded.
  Hit(Found<V>),
  /// An entry was found past its deadline and has been evicted.
  Expired(Arc<V>),
  Miss,
}

/// What `ShardedStore::update` should do with the key once the caller has
/// inspected its current value.
#[derive(Debug)]
pub(crate) enum Action<V> {
  /// Leave the entry as it is.
  Keep,
  /// Record a read of the existing entry.
  Access,
  /// Create the entry, or replace the value of the existing one.
  Put(Arc<V>),
  Remove,
}

/// The outcome of `ShardedStore::update`.
#[derive(Debug)]
pub(crate) struct Updated<V, R> {
  /// The value of an entry that was found expired and evicted before the
  /// caller's closure ran.
  pub(crate) expired: Option<Arc<V>>,
  pub(crate) result: R,
}

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock. Every single-key
/// operation runs entirely under its shard's lock and is therefore atomic with
/// respect to other operations on the same key.
pub(crate) struct ShardedStore<K, V, H> {
  shards: Box<[CachePadded<Shard<K, V, H>>]>,
  hasher: H,
  expiry: Arc<dyn ExpiryPolicy>,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .field("expiry", &self.expiry)
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore` with the specified number of shards and hasher.
  pub(crate) fn new(num_shards: usize, hasher: H, expiry: Arc<dyn ExpiryPolicy>) -> Self {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard_map = HashMap::with_hasher(hasher.clone());
      shards.push(CachePadded::new(RwLock::new(shard_map)));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
      expiry,
    }
  }

  /// Returns the lock guarding the shard for a given key.
  #[inline]
  fn get_shard(&self, key: &K) -> &Shard<K, V, H> {
    let hash = hash_key(&self.hasher, key);
    // The builder validates that there is at least one shard.
    let index = hash as usize % self.shards.len();
    &self.shards[index]
  }

  pub(crate) fn num_shards(&self) -> usize {
    self.shards.len()
  }

  pub(crate) fn expiry_policy(&self) -> &Arc<dyn ExpiryPolicy> {
    &self.expiry
  }

  /// Looks up a key, recording the access on a hit.
  ///
  /// An expired entry is evicted on the spot and reported as `Expired`.
  pub(crate) fn get(&self, key: &K) -> Lookup<V> {
    let shard = self.get_shard(key);
    let now = time::now_nanos();

    // Fast path: hits only need the read lock.
    {
      let guard = shard.read();
      match guard.get(key) {
        None => return Lookup::Miss,
        Some(entry) if !entry.is_expired(now) => {
          self.record_access(entry, now);
          return Lookup::Hit(Found::of(entry));
        }
        Some(_) => {}
      }
    }

    // Slow path: evict under the write lock. The entry may have been replaced
    // in between, so check again.
    let mut guard = shard.write();
    let is_expired = match guard.get(key) {
      None => return Lookup::Miss,
      Some(entry) => entry.is_expired(now),
    };
    if is_expired {
      match guard.remove(key) {
        Some(entry) => Lookup::Expired(entry.value()),
        None => Lookup::Miss,
      }
    } else {
      match guard.get(key) {
        Some(entry) => {
          self.record_access(entry, now);
          Lookup::Hit(Found::of(entry))
        }
        None => Lookup::Miss,
      }
    }
  }

  #[inline]
  fn record_access(&self, entry: &CacheEntry<V>, now: u64) {
    let expiry = self.expiry.expiry_for_access(&entry.expiry_context(now));
    entry.touch(now, expiry);
  }

  /// Checks for a live entry without recording an access or evicting.
  pub(crate) fn contains_key(&self, key: &K) -> bool {
    let now = time::now_nanos();
    self
      .get_shard(key)
      .read()
      .get(key)
      .is_some_and(|entry| !entry.is_expired(now))
  }

  /// Atomically inspects and mutates a single key.
  ///
  /// The shard's write lock is held for the whole call, including `f`. An
  /// expired entry is evicted before `f` runs, so `f` only ever sees a live
  /// value or `None`. `f` must not access this store.
  pub(crate) fn update<R, F>(&self, key: &K, f: F) -> Updated<V, R>
  where
    F: FnOnce(Option<Arc<V>>) -> (Action<V>, R),
  {
    let shard = self.get_shard(key);
    let mut guard = shard.write();
    let now = time::now_nanos();

    let is_expired = guard.get(key).is_some_and(|entry| entry.is_expired(now));
    let expired = if is_expired {
      guard.remove(key).map(|entry| entry.value())
    } else {
      None
    };

    let current = guard.get(key).map(CacheEntry::value);
    let (action, result) = f(current);

    match action {
      Action::Keep => {}
      Action::Access => {
        if let Some(entry) = guard.get(key) {
          self.record_access(entry, now);
        }
      }
      Action::Put(value) => match guard.get_mut(key) {
        Some(entry) => {
          let expiry = self.expiry.expiry_for_update(&entry.expiry_context(now));
          entry.update(value, now, expiry);
        }
        None => {
          let expiry = self.expiry.expiry_for_creation(&ExpiryContext::fresh(now));
          let entry = CacheEntry::new(value, now, expiry);
          guard.insert(key.clone(), entry);
        }
      },
      Action::Remove => {
        guard.remove(key);
      }
    }

    Updated { expired, result }
  }

  /// Returns a copy of the keys currently resident in one shard.
  pub(crate) fn shard_keys(&self, index: usize) -> Vec<K> {
    match self.shards.get(index) {
      Some(shard) => shard.read().keys().cloned().collect(),
      None => Vec::new(),
    }
  }

  /// Removes all entries, one shard at a time.
  pub(crate) fn clear(&self) {
    for shard in self.shards.iter() {
      shard.write().clear();
    }
  }
}
