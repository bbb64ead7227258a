#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fibre_jcache::{
  Cache, CacheBuilder, CacheEntryEvent, CacheEntryListener, EventType, ListenerRegistration,
  ListenerResult,
};
use parking_lot::Mutex;

// A custom hasher that allows us to control which shard a key is assigned to.
// It simply uses the integer value of the key as its hash.
// For a 4-shard cache, key 5 lands in shard 1 (5 % 4 = 1).
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, _: &[u8]) {
    unimplemented!()
  }
  fn write_i32(&mut self, i: i32) {
    self.0 = i as u64;
  }
}

pub fn build_sharded_cache(name: &str, shards: usize) -> Cache<i32, String, ShardControllingHasher> {
  CacheBuilder::new()
    .shards(shards)
    .hasher(ShardControllingHasher)
    .build(name)
    .unwrap()
}

/// Installs a fmt subscriber that writes through the test harness. Set
/// `RUST_LOG=fibre_jcache=trace` to see dispatch logs.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
  pub created: usize,
  pub updated: usize,
  pub removed: usize,
  pub expired: usize,
  pub read: usize,
}

/// Counts every event it receives, per event type.
#[derive(Default)]
pub struct CountingListener {
  created: AtomicUsize,
  updated: AtomicUsize,
  removed: AtomicUsize,
  expired: AtomicUsize,
  read: AtomicUsize,
}

impl CountingListener {
  pub fn counts(&self) -> Counts {
    Counts {
      created: self.created.load(Ordering::SeqCst),
      updated: self.updated.load(Ordering::SeqCst),
      removed: self.removed.load(Ordering::SeqCst),
      expired: self.expired.load(Ordering::SeqCst),
      read: self.read.load(Ordering::SeqCst),
    }
  }

  fn add<K, V>(counter: &AtomicUsize, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    counter.fetch_add(events.len(), Ordering::SeqCst);
    Ok(())
  }
}

impl<K, V> CacheEntryListener<K, V> for CountingListener {
  fn on_created(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Self::add(&self.created, events)
  }
  fn on_updated(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Self::add(&self.updated, events)
  }
  fn on_removed(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Self::add(&self.removed, events)
  }
  fn on_expired(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Self::add(&self.expired, events)
  }
  fn on_read(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Self::add(&self.read, events)
  }
}

/// Records every event it receives, in delivery order.
pub struct RecordingListener<K, V> {
  events: Mutex<Vec<CacheEntryEvent<K, V>>>,
}

impl<K: Clone, V> RecordingListener<K, V> {
  pub fn new() -> Self {
    Self {
      events: Mutex::new(Vec::new()),
    }
  }

  pub fn events(&self) -> Vec<CacheEntryEvent<K, V>> {
    self.events.lock().clone()
  }

  pub fn types(&self) -> Vec<EventType> {
    self.events.lock().iter().map(|e| e.event_type()).collect()
  }

  pub fn take_types(&self) -> Vec<EventType> {
    let types = self.types();
    self.events.lock().clear();
    types
  }

  fn record(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.events.lock().extend(events.iter().cloned());
    Ok(())
  }
}

impl<K, V> CacheEntryListener<K, V> for RecordingListener<K, V>
where
  K: Clone + Send + Sync,
  V: Send + Sync,
{
  fn on_created(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.record(events)
  }
  fn on_updated(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.record(events)
  }
  fn on_removed(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.record(events)
  }
  fn on_expired(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.record(events)
  }
  fn on_read(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.record(events)
  }
}

/// Registers a fresh counting listener on the cache and returns it.
pub fn count_events<K, V, H>(cache: &Cache<K, V, H>) -> Arc<CountingListener>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  let listener = Arc::new(CountingListener::default());
  cache
    .register_listener(ListenerRegistration::new(listener.clone()))
    .unwrap();
  listener
}

/// Registers a fresh recording listener that also receives old values.
pub fn record_events<K, V, H>(cache: &Cache<K, V, H>) -> Arc<RecordingListener<K, V>>
where
  K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  let listener = Arc::new(RecordingListener::new());
  cache
    .register_listener(ListenerRegistration::new(listener.clone()).old_value_required(true))
    .unwrap();
  listener
}
