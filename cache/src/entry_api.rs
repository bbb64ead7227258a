use crate::event::{EventBuffer, EventType};
use crate::store::{Action, Found};
use crate::time;

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A point-in-time copy of a cache entry, as yielded by [`Cache::iter`].
///
/// [`Cache::iter`]: crate::Cache::iter
pub struct Entry<K, V> {
  key: K,
  value: Arc<V>,
  created_at: u64,
  last_modified: u64,
  last_accessed: u64,
}

impl<K, V> Entry<K, V> {
  pub(crate) fn new(key: K, found: Found<V>) -> Self {
    Self {
      key,
      value: found.value,
      created_at: found.created_at,
      last_modified: found.last_modified,
      last_accessed: found.last_accessed,
    }
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  pub fn value(&self) -> &Arc<V> {
    &self.value
  }

  pub fn into_parts(self) -> (K, Arc<V>) {
    (self.key, self.value)
  }

  /// When the entry was first added to the cache.
  pub fn created_at(&self) -> Instant {
    time::nanos_to_instant(self.created_at)
  }

  /// When the entry's value was last written.
  pub fn last_modified(&self) -> Instant {
    time::nanos_to_instant(self.last_modified)
  }

  /// When the entry was last read or written, including the read that
  /// produced this copy.
  pub fn last_accessed(&self) -> Instant {
    time::nanos_to_instant(self.last_accessed)
  }
}

impl<K: Clone, V> Clone for Entry<K, V> {
  fn clone(&self) -> Self {
    Self {
      key: self.key.clone(),
      value: self.value.clone(),
      created_at: self.created_at,
      last_modified: self.last_modified,
      last_accessed: self.last_accessed,
    }
  }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Entry")
      .field("key", &self.key)
      .field("value", &self.value)
      .finish_non_exhaustive()
  }
}

#[derive(Debug)]
enum State<V> {
  Unchanged,
  Set(Arc<V>),
  Removed,
}

/// A view of a single cache entry handed to an entry processor.
///
/// The view is bound to one key for the duration of one [`Cache::invoke`]
/// call. Changes are applied to the cache, and the matching events are
/// dispatched, only after the processor returns.
///
/// [`Cache::invoke`]: crate::Cache::invoke
pub struct MutableEntry<'a, K, V> {
  key: &'a K,
  original: Option<Arc<V>>,
  state: State<V>,
  read: Cell<bool>,
}

impl<'a, K, V> MutableEntry<'a, K, V> {
  pub(crate) fn new(key: &'a K, original: Option<Arc<V>>) -> Self {
    Self {
      key,
      original,
      state: State::Unchanged,
      read: Cell::new(false),
    }
  }

  pub fn key(&self) -> &K {
    self.key
  }

  /// Whether the entry currently has a value. Does not count as a read.
  pub fn exists(&self) -> bool {
    match self.state {
      State::Unchanged => self.original.is_some(),
      State::Set(_) => true,
      State::Removed => false,
    }
  }

  /// The entry's current value, reflecting any change made through this view.
  ///
  /// Reading a value that was in the cache before the processor started counts
  /// as a read of the entry.
  pub fn value(&self) -> Option<Arc<V>> {
    match &self.state {
      State::Unchanged => {
        if self.original.is_some() {
          self.read.set(true);
        }
        self.original.clone()
      }
      State::Set(value) => Some(value.clone()),
      State::Removed => None,
    }
  }

  /// Sets a new value, creating the entry if it does not exist.
  pub fn set_value(&mut self, value: V) {
    self.state = State::Set(Arc::new(value));
  }

  /// Removes the entry.
  pub fn remove(&mut self) {
    self.state = State::Removed;
  }

  /// Translates the recorded interactions into a store action and the
  /// outcome used to build events.
  pub(crate) fn finish(self) -> (Action<V>, EntryOutcome<V>) {
    let read = if self.read.get() {
      self.original.clone()
    } else {
      None
    };

    let (action, write) = match self.state {
      State::Unchanged if read.is_some() => (Action::Access, Write::None),
      State::Unchanged => (Action::Keep, Write::None),
      State::Set(value) => (
        Action::Put(value.clone()),
        Write::Set {
          value,
          prior: self.original,
        },
      ),
      State::Removed => match self.original {
        Some(prior) => (Action::Remove, Write::Removed(prior)),
        None => (Action::Keep, Write::None),
      },
    };

    (action, EntryOutcome { read, write })
  }
}

impl<'a, K: fmt::Debug, V: fmt::Debug> fmt::Debug for MutableEntry<'a, K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MutableEntry")
      .field("key", self.key)
      .field("original", &self.original)
      .field("state", &self.state)
      .finish()
  }
}

#[derive(Debug)]
enum Write<V> {
  None,
  Set { value: Arc<V>, prior: Option<Arc<V>> },
  Removed(Arc<V>),
}

/// What an entry processor did to its entry.
#[derive(Debug)]
pub(crate) struct EntryOutcome<V> {
  read: Option<Arc<V>>,
  write: Write<V>,
}

impl<V> EntryOutcome<V> {
  /// Appends the events for this outcome: the read first, then the write.
  pub(crate) fn record<K: Clone>(self, key: &K, events: &mut EventBuffer<K, V>) {
    if let Some(value) = self.read {
      events.push(EventType::Read, key, value);
    }
    match self.write {
      Write::None => {}
      Write::Set { value, prior } => events.push_write(key, value, prior),
      Write::Removed(prior) => events.push(EventType::Removed, key, prior),
    }
  }
}

/// Logic that inspects and mutates a single entry atomically.
///
/// Any `FnOnce(&mut MutableEntry<K, V>) -> R` closure is an entry processor.
///
/// The processor runs while the entry's shard is locked. It must not call
/// back into the same cache.
pub trait EntryProcessor<K, V> {
  type Output;

  fn process(self, entry: &mut MutableEntry<'_, K, V>) -> Self::Output;
}

impl<K, V, R, F> EntryProcessor<K, V> for F
where
  F: FnOnce(&mut MutableEntry<'_, K, V>) -> R,
{
  type Output = R;

  fn process(self, entry: &mut MutableEntry<'_, K, V>) -> R {
    self(entry)
  }
}
