use crate::entry_api::{Entry, EntryProcessor, MutableEntry};
use crate::error::{CacheError, Result};
use crate::event::{EventBuffer, EventType};
use crate::expiry::ExpiryPolicy;
use crate::iter::Iter;
use crate::listener::{CacheEntryListener, ListenerRegistration};
use crate::shared::CacheShared;
use crate::status::Status;
use crate::store::{Action, Lookup};

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// A named, thread-safe cache.
///
/// `Cache` is a cheap handle: clones refer to the same cache, and two handles
/// compare equal only if they refer to the same instance.
///
/// Every operation fails with [`CacheError::IllegalState`] once the cache has
/// been stopped. Operations that generate events deliver them to all
/// registered listeners before returning; if a listener fails, the operation
/// returns [`CacheError::ListenerNotification`] even though its effect on the
/// cache has already been applied.
pub struct Cache<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K, V, H> Clone for Cache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, H> PartialEq for Cache<K, V, H> {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.shared, &other.shared)
  }
}

impl<K, V, H> Eq for Cache<K, V, H> {}

impl<K, V, H> fmt::Debug for Cache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache")
      .field("name", &self.shared.name)
      .field("status", &self.shared.status.get())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  /// The lifecycle status. Valid in every state.
  pub fn status(&self) -> Status {
    self.shared.status.get()
  }

  /// The expiry policy the cache was created with.
  pub fn expiry_policy(&self) -> Arc<dyn ExpiryPolicy> {
    self.shared.store.expiry_policy().clone()
  }

  #[inline]
  fn events(&self) -> EventBuffer<K, V> {
    EventBuffer::new(self.shared.dispatcher.has_listeners())
  }

  #[inline]
  fn dispatch(&self, events: EventBuffer<K, V>) -> Result<()> {
    self.shared.dispatcher.notify(events.into_events())?;
    Ok(())
  }

  // --- Reads ---

  /// Retrieves a value from the cache.
  ///
  /// Emits `Read` on a hit. An entry found past its deadline is evicted and
  /// emits `Expired` instead.
  pub fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = self.lookup(key, &mut events).map(|entry| entry.value);
    self.dispatch(events)?;
    Ok(value)
  }

  /// Retrieves the values of every present key, emitting one `Read` per key
  /// found.
  pub fn get_all<I>(&self, keys: I) -> Result<HashMap<K, Arc<V>>>
  where
    I: IntoIterator<Item = K>,
  {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let mut found = HashMap::new();
    for key in keys {
      if let Some(entry) = self.lookup(&key, &mut events) {
        found.insert(key, entry.value);
      }
    }
    self.dispatch(events)?;
    Ok(found)
  }

  /// Checks for a live entry. This is not a read: no event is emitted and the
  /// entry's access time is left alone.
  pub fn contains_key(&self, key: &K) -> Result<bool> {
    self.shared.ensure_started()?;
    Ok(self.shared.store.contains_key(key))
  }

  fn lookup(&self, key: &K, events: &mut EventBuffer<K, V>) -> Option<crate::store::Found<V>> {
    match self.shared.store.get(key) {
      Lookup::Hit(found) => {
        events.push(EventType::Read, key, found.value.clone());
        Some(found)
      }
      Lookup::Expired(value) => {
        events.push(EventType::Expired, key, value);
        None
      }
      Lookup::Miss => None,
    }
  }

  /// Reads one entry on behalf of an iterator.
  pub(crate) fn read_entry(&self, key: K) -> Result<Option<Entry<K, V>>> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let entry = self
      .lookup(&key, &mut events)
      .map(|found| Entry::new(key, found));
    self.dispatch(events)?;
    Ok(entry)
  }

  // --- Writes ---

  /// Associates a value with a key, emitting `Created` or `Updated`.
  pub fn put(&self, key: K, value: V) -> Result<()> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    self.put_one(key, value, &mut events);
    self.dispatch(events)
  }

  /// Puts every pair, emitting one `Created` or `Updated` per pair in input
  /// order. Each pair is applied atomically; the batch as a whole is not.
  pub fn put_all<I>(&self, entries: I) -> Result<()>
  where
    I: IntoIterator<Item = (K, V)>,
  {
    self.shared.ensure_started()?;
    let mut events = self.events();
    for (key, value) in entries {
      self.put_one(key, value, &mut events);
    }
    self.dispatch(events)
  }

  fn put_one(&self, key: K, value: V, events: &mut EventBuffer<K, V>) {
    let value = Arc::new(value);
    let updated = self
      .shared
      .update(&key, |current| (Action::Put(value.clone()), current));
    events.push_expired(&key, updated.expired);
    events.push_write(&key, value, updated.result);
  }

  /// Inserts the value only if the key has no live entry. Returns whether it
  /// was inserted.
  pub fn put_if_absent(&self, key: K, value: V) -> Result<bool> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = Arc::new(value);
    let updated = self.shared.update(&key, |current| match current {
      Some(_) => (Action::Keep, false),
      None => (Action::Put(value.clone()), true),
    });
    events.push_expired(&key, updated.expired);
    if updated.result {
      events.push(EventType::Created, &key, value);
    }
    self.dispatch(events)?;
    Ok(updated.result)
  }

  /// Puts the value and returns the one it replaced.
  ///
  /// A replaced value counts as read, so a present key emits `Read` followed
  /// by `Updated`; an absent key emits only `Created`.
  pub fn get_and_put(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = Arc::new(value);
    let updated = self
      .shared
      .update(&key, |current| (Action::Put(value.clone()), current));
    events.push_expired(&key, updated.expired);
    if let Some(prior) = &updated.result {
      events.push(EventType::Read, &key, prior.clone());
    }
    events.push_write(&key, value, updated.result.clone());
    self.dispatch(events)?;
    Ok(updated.result)
  }

  /// Replaces the value of a present key and returns the old one. Emits
  /// `Read` and `Updated`; an absent key is left alone.
  pub fn get_and_replace(&self, key: &K, value: V) -> Result<Option<Arc<V>>> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = Arc::new(value);
    let updated = self.shared.update(key, |current| match current {
      Some(prior) => (Action::Put(value.clone()), Some(prior)),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    if let Some(prior) = &updated.result {
      events.push(EventType::Read, key, prior.clone());
      events.push_updated(key, value, prior.clone());
    }
    self.dispatch(events)?;
    Ok(updated.result)
  }

  /// Removes a key and returns its value. Emits `Read` and `Removed`.
  pub fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let updated = self.shared.update(key, |current| match current {
      Some(prior) => (Action::Remove, Some(prior)),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    if let Some(prior) = &updated.result {
      events.push(EventType::Read, key, prior.clone());
      events.push(EventType::Removed, key, prior.clone());
    }
    self.dispatch(events)?;
    Ok(updated.result)
  }

  /// Removes a key, returning `true` and emitting `Removed` if it was present.
  pub fn remove(&self, key: &K) -> Result<bool> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let updated = self.shared.update(key, |current| match current {
      Some(prior) => (Action::Remove, Some(prior)),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    let removed = updated.result.is_some();
    if let Some(prior) = updated.result {
      events.push(EventType::Removed, key, prior);
    }
    self.dispatch(events)?;
    Ok(removed)
  }

  /// Replaces the value of a present key, returning `true` and emitting
  /// `Updated` if it was present.
  pub fn replace(&self, key: &K, value: V) -> Result<bool> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = Arc::new(value);
    let updated = self.shared.update(key, |current| match current {
      Some(prior) => (Action::Put(value.clone()), Some(prior)),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    let replaced = updated.result.is_some();
    if let Some(prior) = updated.result {
      events.push_updated(key, value, prior);
    }
    self.dispatch(events)?;
    Ok(replaced)
  }

  /// Removes every entry. No events are emitted.
  pub fn clear(&self) -> Result<()> {
    self.shared.ensure_started()?;
    self.shared.store.clear();
    Ok(())
  }

  /// Returns a lazy iterator over the live entries.
  ///
  /// Each yielded entry emits `Read`. The iterator does not see a snapshot:
  /// entries added or removed concurrently may or may not be observed.
  pub fn iter(&self) -> Result<Iter<'_, K, V, H>> {
    self.shared.ensure_started()?;
    Ok(Iter::new(self))
  }

  /// Runs an entry processor against one key and returns its result.
  ///
  /// The processor sees the entry through a [`MutableEntry`]. Once it returns,
  /// its changes are applied atomically and events are emitted for what it
  /// did: `Read` if it read a pre-existing value before changing it, then
  /// `Created`, `Updated` or `Removed` for its final change, if any.
  pub fn invoke<P>(&self, key: &K, processor: P) -> Result<P::Output>
  where
    P: EntryProcessor<K, V>,
  {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let updated = self.shared.update(key, |current| {
      let mut entry = MutableEntry::new(key, current);
      let output = processor.process(&mut entry);
      let (action, outcome) = entry.finish();
      (action, (output, outcome))
    });
    let (output, outcome) = updated.result;
    events.push_expired(key, updated.expired);
    outcome.record(key, &mut events);
    self.dispatch(events)?;
    Ok(output)
  }

  // --- Listeners ---

  /// Registers a listener.
  ///
  /// Fails with [`CacheError::ListenerRegistrationRejected`] if the same
  /// listener is already registered or asynchronous delivery was requested.
  pub fn register_listener(&self, registration: ListenerRegistration<K, V>) -> Result<()> {
    self.shared.ensure_started()?;
    self.shared.dispatcher.register(registration)
  }

  /// Unregisters the listener registered with exactly this `Arc`. Returns
  /// whether a registration was removed.
  pub fn unregister_listener<L>(&self, listener: &Arc<L>) -> Result<bool>
  where
    L: CacheEntryListener<K, V> + ?Sized,
  {
    self.shared.ensure_started()?;
    Ok(self.shared.dispatcher.unregister(listener))
  }

  // --- Lifecycle ---

  /// Stops the cache, discarding its entries and listener registrations.
  /// Stopping a stopped cache fails with `IllegalState`.
  pub fn close(&self) -> Result<()> {
    if self.shared.stop() {
      Ok(())
    } else {
      Err(CacheError::stopped("cache", &self.shared.name))
    }
  }
}

// --- Value-comparing operations ---
impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Removes the key only if it currently maps to `expected`.
  pub fn remove_if_equals(&self, key: &K, expected: &V) -> Result<bool> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let updated = self.shared.update(key, |current| match current {
      Some(prior) if *prior == *expected => (Action::Remove, Some(prior)),
      Some(_) => (Action::Access, None),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    let removed = updated.result.is_some();
    if let Some(prior) = updated.result {
      events.push(EventType::Removed, key, prior);
    }
    self.dispatch(events)?;
    Ok(removed)
  }

  /// Replaces the value only if the key currently maps to `expected`.
  /// Emits `Updated` only when the replacement happened.
  pub fn replace_if_equals(&self, key: &K, expected: &V, value: V) -> Result<bool> {
    self.shared.ensure_started()?;
    let mut events = self.events();
    let value = Arc::new(value);
    let updated = self.shared.update(key, |current| match current {
      Some(prior) if *prior == *expected => (Action::Put(value.clone()), Some(prior)),
      Some(_) => (Action::Access, None),
      None => (Action::Keep, None),
    });
    events.push_expired(key, updated.expired);
    let replaced = updated.result.is_some();
    if let Some(prior) = updated.result {
      events.push_updated(key, value, prior);
    }
    self.dispatch(events)?;
    Ok(replaced)
  }
}
