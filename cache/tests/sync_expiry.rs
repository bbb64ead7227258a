mod common;

use common::record_events;
use fibre_jcache::{
  AccessedExpiryPolicy, Cache, CacheBuilder, CreatedExpiryPolicy, EternalExpiryPolicy, EventType,
  Expiry, ExpiryContext, ExpiryPolicy, ModifiedExpiryPolicy, MutableEntry, TouchedExpiryPolicy,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_millis(200);

fn new_cache<P: ExpiryPolicy + 'static>(name: &str, policy: P) -> Cache<i32, String> {
  CacheBuilder::<i32, String>::new()
    .expiry_policy(policy)
    .build(name)
    .unwrap()
}

#[test]
fn test_eternal_entries_never_expire() {
  let cache = new_cache("expiry-eternal", EternalExpiryPolicy);
  cache.put(1, "one".to_string()).unwrap();
  thread::sleep(Duration::from_millis(50));
  assert!(cache.get(&1).unwrap().is_some());
}

#[test]
fn test_created_expiry_is_lazy_and_emits_expired() {
  let cache = new_cache("expiry-created", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  let events = record_events(&cache);

  thread::sleep(TTL * 2);
  // Nothing happens until the entry is touched.
  assert!(events.types().is_empty());

  assert!(cache.get(&1).unwrap().is_none());
  let expired = events.events();
  assert_eq!(expired.len(), 1);
  assert_eq!(expired[0].event_type(), EventType::Expired);
  assert_eq!(expired[0].value().as_str(), "one");
  events.take_types();

  // Already gone; a second get is a plain miss.
  assert!(cache.get(&1).unwrap().is_none());
  assert!(events.types().is_empty());
}

#[test]
fn test_created_expiry_ignores_updates() {
  let cache = new_cache("expiry-created-updates", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  thread::sleep(TTL / 2);
  cache.put(1, "uno".to_string()).unwrap();
  thread::sleep(TTL);
  assert!(cache.get(&1).unwrap().is_none());
}

#[test]
fn test_contains_key_hides_but_does_not_evict() {
  let cache = new_cache("expiry-contains", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  let events = record_events(&cache);
  thread::sleep(TTL * 2);

  assert!(!cache.contains_key(&1).unwrap());
  assert!(events.types().is_empty());

  // The expired entry is still resident and reported when touched.
  assert!(!cache.remove(&1).unwrap());
  assert_eq!(events.take_types(), vec![EventType::Expired]);
}

#[test]
fn test_put_over_expired_entry_creates() {
  let cache = new_cache("expiry-put-over", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  let events = record_events(&cache);
  thread::sleep(TTL * 2);

  cache.put(1, "uno".to_string()).unwrap();
  assert_eq!(
    events.take_types(),
    vec![EventType::Expired, EventType::Created]
  );
  assert_eq!(cache.get(&1).unwrap().as_deref().map(String::as_str), Some("uno"));
}

#[test]
fn test_modified_expiry_is_extended_by_writes() {
  let cache = new_cache("expiry-modified", ModifiedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  for i in 0..4 {
    thread::sleep(TTL / 4);
    cache.put(1, format!("v{}", i)).unwrap();
  }
  assert!(cache.get(&1).unwrap().is_some());

  thread::sleep(TTL * 2);
  assert!(cache.get(&1).unwrap().is_none());
}

#[test]
fn test_modified_expiry_is_not_extended_by_reads() {
  let cache = new_cache("expiry-modified-reads", ModifiedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  thread::sleep(TTL / 2);
  assert!(cache.get(&1).unwrap().is_some());
  thread::sleep(TTL);
  assert!(cache.get(&1).unwrap().is_none());
}

#[test]
fn test_accessed_expiry_is_extended_by_reads() {
  let cache = new_cache("expiry-accessed", AccessedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  for _ in 0..4 {
    thread::sleep(TTL / 4);
    assert!(cache.get(&1).unwrap().is_some());
  }
  thread::sleep(TTL * 2);
  assert!(cache.get(&1).unwrap().is_none());
}

#[test]
fn test_touched_expiry_is_extended_by_reads_and_writes() {
  let cache = new_cache("expiry-touched", TouchedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  for i in 0..4 {
    thread::sleep(TTL / 4);
    if i % 2 == 0 {
      assert!(cache.get(&1).unwrap().is_some());
    } else {
      cache.put(1, format!("v{}", i)).unwrap();
    }
  }
  assert!(cache.contains_key(&1).unwrap());
}

#[test]
fn test_processor_sees_expired_entry_as_absent() {
  let cache = new_cache("expiry-invoke", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  let events = record_events(&cache);
  thread::sleep(TTL * 2);

  let existed = cache
    .invoke(&1, |entry: &mut MutableEntry<'_, i32, String>| {
      let existed = entry.exists();
      entry.set_value("fresh".to_string());
      existed
    })
    .unwrap();
  assert!(!existed);
  assert_eq!(
    events.take_types(),
    vec![EventType::Expired, EventType::Created]
  );
}

#[test]
fn test_iteration_skips_expired_entries() {
  let cache = new_cache("expiry-iter", CreatedExpiryPolicy(TTL));
  cache.put(1, "one".to_string()).unwrap();
  thread::sleep(TTL * 2);
  cache.put(2, "two".to_string()).unwrap();
  let events = record_events(&cache);

  let keys: Vec<i32> = cache
    .iter()
    .unwrap()
    .map(|entry| *entry.unwrap().key())
    .collect();
  assert_eq!(keys, vec![2]);

  let mut types = events.types();
  types.sort_by_key(|t| t.to_string());
  assert_eq!(types, vec![EventType::Expired, EventType::Read]);
}

#[test]
fn test_expiry_policy_is_exposed() {
  let cache = new_cache("expiry-exposed", AccessedExpiryPolicy(TTL));
  let policy: Arc<dyn ExpiryPolicy> = cache.expiry_policy();
  let now = Instant::now();
  let ctx = ExpiryContext {
    created_at: now,
    last_accessed: now,
    last_modified: now,
    now,
  };
  assert!(policy.expiry_for_access(&ctx).is_some());
  assert!(policy.expiry_for_update(&ctx).is_none());
}

/// Sliding idle timeout that never lets an entry outlive `max_age`.
#[derive(Debug)]
struct CappedIdlePolicy {
  idle: Duration,
  max_age: Duration,
}

impl CappedIdlePolicy {
  fn remaining(&self, ctx: &ExpiryContext) -> Expiry {
    Expiry::After(self.idle.min(self.max_age.saturating_sub(ctx.age())))
  }
}

impl ExpiryPolicy for CappedIdlePolicy {
  fn expiry_for_creation(&self, ctx: &ExpiryContext) -> Expiry {
    self.remaining(ctx)
  }

  fn expiry_for_access(&self, ctx: &ExpiryContext) -> Option<Expiry> {
    Some(self.remaining(ctx))
  }
}

#[test]
fn test_policy_can_cap_lifetime_from_creation_time() {
  let cache = new_cache(
    "expiry-capped",
    CappedIdlePolicy {
      idle: Duration::from_millis(150),
      max_age: Duration::from_millis(300),
    },
  );
  cache.put(1, "one".to_string()).unwrap();
  let events = record_events(&cache);

  // Regular reads keep the entry alive while it is young.
  for _ in 0..4 {
    thread::sleep(Duration::from_millis(50));
    assert!(cache.get(&1).unwrap().is_some());
  }

  // Reads past the cap no longer extend it.
  let mut last = None;
  for _ in 0..4 {
    thread::sleep(Duration::from_millis(50));
    last = Some(cache.get(&1).unwrap());
  }
  assert_eq!(last, Some(None));
  assert!(events.types().contains(&EventType::Expired));
}
