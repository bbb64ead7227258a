use std::fmt;
use std::sync::Arc;

/// The kind of lifecycle change a `CacheEntryEvent` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
  /// An entry was added for a key that had none.
  Created,
  /// The value of an existing entry was replaced.
  Updated,
  /// An entry was removed by a caller.
  Removed,
  /// An entry was found past its expiry deadline and evicted.
  Expired,
  /// The value of an existing entry was read.
  Read,
}

impl EventType {
  pub(crate) const ALL: [EventType; 5] = [
    EventType::Created,
    EventType::Updated,
    EventType::Removed,
    EventType::Expired,
    EventType::Read,
  ];

  #[inline]
  pub(crate) fn index(self) -> usize {
    match self {
      EventType::Created => 0,
      EventType::Updated => 1,
      EventType::Removed => 2,
      EventType::Expired => 3,
      EventType::Read => 4,
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EventType::Created => write!(f, "created"),
      EventType::Updated => write!(f, "updated"),
      EventType::Removed => write!(f, "removed"),
      EventType::Expired => write!(f, "expired"),
      EventType::Read => write!(f, "read"),
    }
  }
}

/// A single entry-lifecycle event delivered to listeners.
///
/// `value` is the value the event is about: the new value for `Created` and
/// `Updated`, and the existing value for `Removed`, `Expired` and `Read`.
/// `old_value` is only present for `Updated` events, and only for listeners
/// registered with `old_value_required`.
pub struct CacheEntryEvent<K, V> {
  event_type: EventType,
  key: K,
  value: Arc<V>,
  old_value: Option<Arc<V>>,
}

impl<K, V> CacheEntryEvent<K, V> {
  pub(crate) fn new(event_type: EventType, key: K, value: Arc<V>) -> Self {
    Self {
      event_type,
      key,
      value,
      old_value: None,
    }
  }

  pub(crate) fn updated(key: K, value: Arc<V>, old_value: Arc<V>) -> Self {
    Self {
      event_type: EventType::Updated,
      key,
      value,
      old_value: Some(old_value),
    }
  }

  pub fn event_type(&self) -> EventType {
    self.event_type
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  pub fn value(&self) -> &Arc<V> {
    &self.value
  }

  pub fn old_value(&self) -> Option<&Arc<V>> {
    self.old_value.as_ref()
  }

  pub(crate) fn has_old_value(&self) -> bool {
    self.old_value.is_some()
  }

  /// A copy of this event with the old value stripped.
  pub(crate) fn without_old_value(&self) -> Self
  where
    K: Clone,
  {
    Self {
      event_type: self.event_type,
      key: self.key.clone(),
      value: self.value.clone(),
      old_value: None,
    }
  }
}

impl<K: Clone, V> Clone for CacheEntryEvent<K, V> {
  fn clone(&self) -> Self {
    Self {
      event_type: self.event_type,
      key: self.key.clone(),
      value: self.value.clone(),
      old_value: self.old_value.clone(),
    }
  }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntryEvent<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntryEvent")
      .field("event_type", &self.event_type)
      .field("key", &self.key)
      .field("value", &self.value)
      .field("old_value", &self.old_value)
      .finish()
  }
}

/// Accumulates the events produced by one cache operation, in the order they
/// were generated.
///
/// When nobody is listening the buffer is disabled and drops everything, so
/// operations do not pay for building events.
pub(crate) struct EventBuffer<K, V> {
  enabled: bool,
  events: Vec<CacheEntryEvent<K, V>>,
}

impl<K, V> EventBuffer<K, V> {
  pub(crate) fn new(enabled: bool) -> Self {
    Self {
      enabled,
      events: Vec::new(),
    }
  }

  #[inline]
  pub(crate) fn push(&mut self, event_type: EventType, key: &K, value: Arc<V>)
  where
    K: Clone,
  {
    if self.enabled {
      self
        .events
        .push(CacheEntryEvent::new(event_type, key.clone(), value));
    }
  }

  #[inline]
  pub(crate) fn push_expired(&mut self, key: &K, value: Option<Arc<V>>)
  where
    K: Clone,
  {
    if let Some(value) = value {
      self.push(EventType::Expired, key, value);
    }
  }

  #[inline]
  pub(crate) fn push_updated(&mut self, key: &K, value: Arc<V>, old_value: Arc<V>)
  where
    K: Clone,
  {
    if self.enabled {
      self
        .events
        .push(CacheEntryEvent::updated(key.clone(), value, old_value));
    }
  }

  /// Records a write: `Updated` if there was a prior value, `Created` otherwise.
  #[inline]
  pub(crate) fn push_write(&mut self, key: &K, value: Arc<V>, prior: Option<Arc<V>>)
  where
    K: Clone,
  {
    match prior {
      Some(old_value) => self.push_updated(key, value, old_value),
      None => self.push(EventType::Created, key, value),
    }
  }

  pub(crate) fn into_events(self) -> Vec<CacheEntryEvent<K, V>> {
    self.events
  }
}
