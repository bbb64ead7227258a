use crate::error::{CacheError, ListenerError};
use crate::event::{CacheEntryEvent, EventType};
use crate::listener::{listener_addr, CacheEntryListener, ListenerRegistration};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Fans out entry events to the registered listeners of one cache.
///
/// Delivery is synchronous: `notify` returns only after every registration
/// has seen the batch. Registrations are visited in the order they were made.
pub(crate) struct EventDispatcher<K, V> {
  registrations: RwLock<Vec<Arc<ListenerRegistration<K, V>>>>,
  // Mirrors `registrations.len()` so that the hot path can skip event
  // construction without taking the lock.
  active: AtomicUsize,
}

impl<K, V> fmt::Debug for EventDispatcher<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventDispatcher")
      .field("registrations", &self.active.load(Ordering::Relaxed))
      .finish()
  }
}

impl<K, V> Default for EventDispatcher<K, V> {
  fn default() -> Self {
    Self {
      registrations: RwLock::new(Vec::new()),
      active: AtomicUsize::new(0),
    }
  }
}

impl<K, V> EventDispatcher<K, V>
where
  K: Clone,
{
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Whether anyone is listening.
  #[inline]
  pub(crate) fn has_listeners(&self) -> bool {
    self.active.load(Ordering::Acquire) > 0
  }

  pub(crate) fn register(&self, registration: ListenerRegistration<K, V>) -> Result<(), CacheError> {
    if !registration.synchronous {
      tracing::warn!("rejected asynchronous listener registration");
      return Err(CacheError::ListenerRegistrationRejected(
        "only synchronous listeners are supported".to_string(),
      ));
    }

    let mut registrations = self.registrations.write();
    let addr = listener_addr(&registration.listener);
    if registrations
      .iter()
      .any(|existing| listener_addr(&existing.listener) == addr)
    {
      tracing::warn!("rejected duplicate listener registration");
      return Err(CacheError::ListenerRegistrationRejected(
        "listener is already registered".to_string(),
      ));
    }

    registrations.push(Arc::new(registration));
    self.active.store(registrations.len(), Ordering::Release);
    Ok(())
  }

  /// Removes the registration made with exactly this listener allocation.
  pub(crate) fn unregister<L>(&self, listener: &Arc<L>) -> bool
  where
    L: CacheEntryListener<K, V> + ?Sized,
  {
    let addr = listener_addr(listener);
    let mut registrations = self.registrations.write();
    let before = registrations.len();
    registrations.retain(|existing| listener_addr(&existing.listener) != addr);
    self.active.store(registrations.len(), Ordering::Release);
    registrations.len() != before
  }

  /// Drops every registration.
  pub(crate) fn clear(&self) {
    let mut registrations = self.registrations.write();
    registrations.clear();
    self.active.store(0, Ordering::Release);
  }

  /// Delivers a batch of events produced by one cache operation.
  ///
  /// A failing listener does not prevent delivery to the remaining callbacks
  /// or listeners; the first failure is returned once everyone was notified.
  pub(crate) fn notify(&self, events: Vec<CacheEntryEvent<K, V>>) -> Result<(), ListenerError> {
    if events.is_empty() {
      return Ok(());
    }

    // Snapshot so listeners may (un)register or call back into the cache.
    let registrations = self.registrations.read().clone();
    let mut first_error = None;

    for registration in registrations.iter() {
      let delivered = deliver(registration, &events, &mut first_error);
      tracing::trace!(
        events = events.len(),
        delivered,
        "dispatched entry events to listener"
      );
    }

    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

/// Delivers the events accepted by one registration, grouped by event type.
/// Groups are delivered in order of each type's first appearance.
fn deliver<K: Clone, V>(
  registration: &ListenerRegistration<K, V>,
  events: &[CacheEntryEvent<K, V>],
  first_error: &mut Option<ListenerError>,
) -> usize {
  let mut order: Vec<EventType> = Vec::with_capacity(EventType::ALL.len());
  let mut batches: [Vec<CacheEntryEvent<K, V>>; 5] = Default::default();

  for event in events.iter().filter(|e| registration.accepts(e)) {
    let event_type = event.event_type();
    let batch = &mut batches[event_type.index()];
    if batch.is_empty() {
      order.push(event_type);
    }
    if event.has_old_value() && !registration.old_value_required {
      batch.push(event.without_old_value());
    } else {
      batch.push(event.clone());
    }
  }

  let mut delivered = 0;
  let listener = &registration.listener;
  for event_type in order {
    let batch = &batches[event_type.index()];
    delivered += batch.len();
    let result = match event_type {
      EventType::Created => listener.on_created(batch),
      EventType::Updated => listener.on_updated(batch),
      EventType::Removed => listener.on_removed(batch),
      EventType::Expired => listener.on_expired(batch),
      EventType::Read => listener.on_read(batch),
    };
    if let Err(err) = result {
      tracing::warn!(event_type = %event_type, error = %err, "cache entry listener failed");
      first_error.get_or_insert(err);
    }
  }
  delivered
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listener::{EventHandlers, ListenerResult};
  use parking_lot::Mutex;

  #[derive(Default)]
  struct Recorder {
    calls: Mutex<Vec<(EventType, Vec<u32>)>>,
  }

  impl Recorder {
    fn record(&self, events: &[CacheEntryEvent<u32, String>]) -> ListenerResult {
      let event_type = events[0].event_type();
      let keys = events.iter().map(|e| *e.key()).collect();
      self.calls.lock().push((event_type, keys));
      Ok(())
    }
  }

  impl CacheEntryListener<u32, String> for Recorder {
    fn on_created(&self, events: &[CacheEntryEvent<u32, String>]) -> ListenerResult {
      self.record(events)
    }
    fn on_updated(&self, events: &[CacheEntryEvent<u32, String>]) -> ListenerResult {
      self.record(events)
    }
    fn on_read(&self, events: &[CacheEntryEvent<u32, String>]) -> ListenerResult {
      self.record(events)
    }
  }

  fn event(event_type: EventType, key: u32, value: &str) -> CacheEntryEvent<u32, String> {
    CacheEntryEvent::new(event_type, key, Arc::new(value.to_string()))
  }

  #[test]
  fn batches_per_type_in_first_appearance_order() {
    let dispatcher = EventDispatcher::<u32, String>::new();
    let recorder = Arc::new(Recorder::default());
    dispatcher
      .register(ListenerRegistration::new(recorder.clone()))
      .unwrap();

    dispatcher
      .notify(vec![
        event(EventType::Read, 1, "a"),
        event(EventType::Created, 2, "b"),
        event(EventType::Read, 3, "c"),
        event(EventType::Removed, 4, "d"),
        event(EventType::Created, 5, "e"),
      ])
      .unwrap();

    let calls = recorder.calls.lock().clone();
    assert_eq!(
      calls,
      vec![
        (EventType::Read, vec![1, 3]),
        (EventType::Created, vec![2, 5]),
      ]
    );
  }

  #[test]
  fn strips_old_values_unless_requested() {
    let dispatcher = EventDispatcher::<u32, String>::new();
    let seen_without = Arc::new(Mutex::new(Vec::new()));
    let seen_with = Arc::new(Mutex::new(Vec::new()));

    let sink = seen_without.clone();
    let without: Arc<dyn CacheEntryListener<u32, String>> =
      Arc::new(EventHandlers::<u32, String>::new().on(EventType::Updated, move |events| {
        sink.lock().extend(events.iter().map(|e| e.old_value().is_some()));
        Ok(())
      }));
    let sink = seen_with.clone();
    let with: Arc<dyn CacheEntryListener<u32, String>> =
      Arc::new(EventHandlers::<u32, String>::new().on(EventType::Updated, move |events| {
        sink.lock().extend(events.iter().map(|e| e.old_value().is_some()));
        Ok(())
      }));

    dispatcher.register(ListenerRegistration::new(without)).unwrap();
    dispatcher
      .register(ListenerRegistration::new(with).old_value_required(true))
      .unwrap();

    let updated = CacheEntryEvent::updated(1, Arc::new("new".to_string()), Arc::new("old".to_string()));
    dispatcher.notify(vec![updated]).unwrap();

    assert_eq!(*seen_without.lock(), vec![false]);
    assert_eq!(*seen_with.lock(), vec![true]);
  }

  #[test]
  fn failures_do_not_starve_later_listeners() {
    let dispatcher = EventDispatcher::<u32, String>::new();
    let failing: Arc<dyn CacheEntryListener<u32, String>> = Arc::new(
      EventHandlers::<u32, String>::new().on(EventType::Created, |_| Err(ListenerError::new("boom"))),
    );
    let recorder = Arc::new(Recorder::default());

    dispatcher.register(ListenerRegistration::new(failing)).unwrap();
    dispatcher
      .register(ListenerRegistration::new(recorder.clone()))
      .unwrap();

    let err = dispatcher
      .notify(vec![event(EventType::Created, 1, "a")])
      .unwrap_err();
    assert_eq!(err.message(), "boom");
    assert_eq!(recorder.calls.lock().len(), 1);
  }

  #[test]
  fn rejects_duplicates_and_async_and_unregisters_by_identity() {
    let dispatcher = EventDispatcher::<u32, String>::new();
    let recorder = Arc::new(Recorder::default());
    let other = Arc::new(Recorder::default());

    dispatcher
      .register(ListenerRegistration::new(recorder.clone()))
      .unwrap();
    assert!(matches!(
      dispatcher.register(ListenerRegistration::new(recorder.clone())),
      Err(CacheError::ListenerRegistrationRejected(_))
    ));
    assert!(matches!(
      dispatcher.register(ListenerRegistration::new(other.clone()).synchronous(false)),
      Err(CacheError::ListenerRegistrationRejected(_))
    ));
    assert!(dispatcher.has_listeners());

    assert!(!dispatcher.unregister(&other));
    assert!(dispatcher.unregister(&recorder));
    assert!(!dispatcher.unregister(&recorder));
    assert!(!dispatcher.has_listeners());
  }
}
