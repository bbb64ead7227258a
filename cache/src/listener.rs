//! Listener and filter traits, and the registration that binds them to a cache.

use crate::error::ListenerError;
use crate::event::{CacheEntryEvent, EventType};

use std::fmt;
use std::sync::Arc;

/// The result type returned by listener callbacks.
pub type ListenerResult = Result<(), ListenerError>;

/// A listener that receives entry-lifecycle events from a cache.
///
/// Every callback receives the batch of matching events produced by a single
/// cache operation, in the order they were generated. All callbacks default to
/// doing nothing, so a listener only implements the kinds it cares about.
///
/// Callbacks run synchronously on the thread performing the cache operation,
/// after the store has been updated and before the operation returns.
pub trait CacheEntryListener<K, V>: Send + Sync {
  fn on_created(&self, _events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Ok(())
  }

  fn on_updated(&self, _events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Ok(())
  }

  fn on_removed(&self, _events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Ok(())
  }

  fn on_expired(&self, _events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Ok(())
  }

  fn on_read(&self, _events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    Ok(())
  }

  /// Whether this listener wants events of the given type at all. Returning
  /// `false` lets the dispatcher skip filtering and batching for that type.
  fn interested_in(&self, _event_type: EventType) -> bool {
    true
  }
}

/// Decides which events reach a listener.
pub trait CacheEntryEventFilter<K, V>: Send + Sync {
  fn evaluate(&self, event: &CacheEntryEvent<K, V>) -> bool;
}

impl<K, V, F> CacheEntryEventFilter<K, V> for F
where
  F: Fn(&CacheEntryEvent<K, V>) -> bool + Send + Sync,
{
  fn evaluate(&self, event: &CacheEntryEvent<K, V>) -> bool {
    self(event)
  }
}

type Handler<K, V> = Box<dyn Fn(&[CacheEntryEvent<K, V>]) -> ListenerResult + Send + Sync>;

/// A listener assembled from one optional handler per event type.
///
/// Event types without a handler are ignored.
///
/// ```
/// use fibre_jcache::{EventHandlers, EventType};
///
/// let listener = EventHandlers::<u64, String>::new()
///   .on(EventType::Created, |events| {
///     println!("{} entries created", events.len());
///     Ok(())
///   });
/// # let _ = listener;
/// ```
pub struct EventHandlers<K, V> {
  handlers: [Option<Handler<K, V>>; 5],
}

impl<K, V> EventHandlers<K, V> {
  pub fn new() -> Self {
    Self {
      handlers: [None, None, None, None, None],
    }
  }

  /// Sets the handler for one event type, replacing any previous one.
  pub fn on<F>(mut self, event_type: EventType, handler: F) -> Self
  where
    F: Fn(&[CacheEntryEvent<K, V>]) -> ListenerResult + Send + Sync + 'static,
  {
    self.handlers[event_type.index()] = Some(Box::new(handler));
    self
  }

  fn call(&self, event_type: EventType, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    match &self.handlers[event_type.index()] {
      Some(handler) => handler(events),
      None => Ok(()),
    }
  }
}

impl<K, V> Default for EventHandlers<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> fmt::Debug for EventHandlers<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let handled: Vec<EventType> = EventType::ALL
      .into_iter()
      .filter(|t| self.handlers[t.index()].is_some())
      .collect();
    f.debug_struct("EventHandlers")
      .field("handled", &handled)
      .finish()
  }
}

impl<K, V> CacheEntryListener<K, V> for EventHandlers<K, V> {
  fn on_created(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.call(EventType::Created, events)
  }

  fn on_updated(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.call(EventType::Updated, events)
  }

  fn on_removed(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.call(EventType::Removed, events)
  }

  fn on_expired(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.call(EventType::Expired, events)
  }

  fn on_read(&self, events: &[CacheEntryEvent<K, V>]) -> ListenerResult {
    self.call(EventType::Read, events)
  }

  fn interested_in(&self, event_type: EventType) -> bool {
    self.handlers[event_type.index()].is_some()
  }
}

/// Binds a listener to a cache, together with its delivery options.
pub struct ListenerRegistration<K, V> {
  pub(crate) listener: Arc<dyn CacheEntryListener<K, V>>,
  pub(crate) filter: Option<Arc<dyn CacheEntryEventFilter<K, V>>>,
  pub(crate) old_value_required: bool,
  pub(crate) synchronous: bool,
}

impl<K, V> ListenerRegistration<K, V> {
  /// Creates a synchronous, unfiltered registration that does not receive
  /// old values.
  ///
  /// The same `Arc` must later be passed to `Cache::unregister_listener`.
  pub fn new(listener: Arc<dyn CacheEntryListener<K, V>>) -> Self {
    Self {
      listener,
      filter: None,
      old_value_required: false,
      synchronous: true,
    }
  }

  /// Only events accepted by the filter are delivered.
  pub fn filter<F>(mut self, filter: F) -> Self
  where
    F: CacheEntryEventFilter<K, V> + 'static,
  {
    self.filter = Some(Arc::new(filter));
    self
  }

  /// Whether `Updated` events should carry the replaced value.
  pub fn old_value_required(mut self, required: bool) -> Self {
    self.old_value_required = required;
    self
  }

  /// Whether events are delivered on the calling thread before the operation
  /// returns. Only synchronous delivery is supported; asynchronous
  /// registrations are rejected by the cache.
  pub fn synchronous(mut self, synchronous: bool) -> Self {
    self.synchronous = synchronous;
    self
  }

  pub(crate) fn accepts(&self, event: &CacheEntryEvent<K, V>) -> bool {
    self.listener.interested_in(event.event_type())
      && self.filter.as_ref().map_or(true, |f| f.evaluate(event))
  }
}

impl<K, V> Clone for ListenerRegistration<K, V> {
  fn clone(&self) -> Self {
    Self {
      listener: self.listener.clone(),
      filter: self.filter.clone(),
      old_value_required: self.old_value_required,
      synchronous: self.synchronous,
    }
  }
}

impl<K, V> fmt::Debug for ListenerRegistration<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ListenerRegistration")
      .field("has_filter", &self.filter.is_some())
      .field("old_value_required", &self.old_value_required)
      .field("synchronous", &self.synchronous)
      .finish_non_exhaustive()
  }
}

/// The address of a listener allocation, used for identity comparisons.
#[inline]
pub(crate) fn listener_addr<L: ?Sized>(listener: &Arc<L>) -> *const () {
  Arc::as_ptr(listener) as *const ()
}
