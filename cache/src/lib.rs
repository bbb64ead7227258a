//! A concurrent, in-process key-value cache with entry-lifecycle events and
//! named cache management.
//!
//! # Features
//! - **High Concurrency**: Built with a sharded architecture to minimize lock contention.
//! - **Non-Clone Support**: Stores values in an `Arc<V>`, avoiding `V: Clone` bounds.
//! - **Expiry Policies**: Entries can expire a fixed time after creation, last
//!   update or last access. Expiration is lazy and observed on access.
//! - **Entry Events**: Synchronous listeners receive created, updated,
//!   removed, expired and read events, optionally through a filter.
//! - **Entry Processors**: Atomic read-modify-write of a single entry.
//! - **Cache Managers**: Named caches grouped under a URI and a process-wide
//!   [`CachingProvider`].
//! - **Serde**: Optional `serde` derives for `Status` and `EventType`.
//!
//! # Example
//!
//! ```
//! use fibre_jcache::{CacheBuilder, EventHandlers, EventType, ListenerRegistration};
//! use std::sync::Arc;
//!
//! let cache = CacheBuilder::<String, u64>::new().build("hits").unwrap();
//! let listener = Arc::new(EventHandlers::<String, u64>::new().on(EventType::Created, |events| {
//!   for event in events {
//!     println!("created {}", event.key());
//!   }
//!   Ok(())
//! }));
//! cache.register_listener(ListenerRegistration::new(listener)).unwrap();
//!
//! cache.put("home".to_string(), 1).unwrap();
//! assert_eq!(cache.get(&"home".to_string()).unwrap().as_deref(), Some(&1));
//! ```

// Public modules that form the API
pub mod builder;
pub mod entry_api;
pub mod error;
pub mod event;
pub mod expiry;
pub mod handles;
pub mod iter;
pub mod listener;
pub mod manager;
pub mod provider;
pub mod status;

// Internal, crate-only modules
mod dispatch;
mod entry;
mod shared;
mod store;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use entry_api::{Entry, EntryProcessor, MutableEntry};
pub use error::{BuildError, CacheError, ListenerError, Result};
pub use event::{CacheEntryEvent, EventType};
pub use expiry::{
  AccessedExpiryPolicy, CreatedExpiryPolicy, EternalExpiryPolicy, Expiry, ExpiryContext,
  ExpiryPolicy, ModifiedExpiryPolicy, TouchedExpiryPolicy,
};
pub use handles::Cache;
pub use iter::Iter;
pub use listener::{
  CacheEntryEventFilter, CacheEntryListener, EventHandlers, ListenerRegistration, ListenerResult,
};
pub use manager::{AnyCache, CacheManager, Caches};
pub use provider::{CachingProvider, DEFAULT_URI};
pub use status::Status;
