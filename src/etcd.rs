//! Thin key-value wrapper sketching the boundary to an external
//! persistence/service-discovery backend, which this crate deliberately
//! does not implement. Ships an in-memory fake for tests and local
//! development; a real etcd client lives behind the same trait.

use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    pub revision: u64,
}

/// A change observed by [`KvStore::watch`].
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Put(KeyValue),
    Delete { key: String },
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<KeyValue>>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<u64>;
    fn delete(&self, key: &str) -> Result<bool>;
    /// Returns a snapshot of events recorded since `since_revision`. A real
    /// client would stream these; the in-memory fake buffers them instead.
    fn watch(&self, prefix: &str, since_revision: u64) -> Result<Vec<WatchEvent>>;
}

struct Entry {
    value: Vec<u8>,
    revision: u64,
}

/// In-memory [`KvStore`] for tests and local development. Not durable and
/// not shared across processes.
#[derive(Default)]
pub struct InMemoryKvStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    entries: BTreeMap<String, Entry>,
    revision: u64,
    events: Vec<(u64, WatchEvent)>,
}

impl InMemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        #[allow(clippy::unwrap_used)]
        let state = self.inner.lock().unwrap();
        Ok(state.entries.get(key).map(|e| KeyValue {
            key: key.to_string(),
            value: e.value.clone(),
            revision: e.revision,
        }))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        #[allow(clippy::unwrap_used)]
        let mut state = self.inner.lock().unwrap();
        state.revision += 1;
        let revision = state.revision;
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                revision,
            },
        );
        state.events.push((
            revision,
            WatchEvent::Put(KeyValue {
                key: key.to_string(),
                value,
                revision,
            }),
        ));
        Ok(revision)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        #[allow(clippy::unwrap_used)]
        let mut state = self.inner.lock().unwrap();
        let existed = state.entries.remove(key).is_some();
        if existed {
            state.revision += 1;
            let revision = state.revision;
            state.events.push((
                revision,
                WatchEvent::Delete {
                    key: key.to_string(),
                },
            ));
        }
        Ok(existed)
    }

    fn watch(&self, prefix: &str, since_revision: u64) -> Result<Vec<WatchEvent>> {
        #[allow(clippy::unwrap_used)]
        let state = self.inner.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|(rev, _)| *rev > since_revision)
            .filter(|(_, event)| match event {
                WatchEvent::Put(kv) => kv.key.starts_with(prefix),
                WatchEvent::Delete { key } => key.starts_with(prefix),
            })
            .map(|(_, event)| event.clone())
            .collect())
    }
}

/// Convenience constructor matching the shape a real etcd client would have:
/// currently always returns the in-memory fake, since this crate ships no
/// network client. Kept separate so callers depend on this function rather
/// than on `InMemoryKvStore` directly.
pub fn connect_in_memory() -> Result<Arc<dyn KvStore>> {
    Ok(InMemoryKvStore::shared())
}
