//! Workflow document storage abstraction.
//!
//! Every workflow engine owns one header+lines document type and keeps it
//! behind this trait. The in-memory implementation backs tests and dev;
//! a database adapter would implement the same trait over real
//! transactions. Documents are whole-row replaced on update; line edits
//! always go through the header so a document is saved (and audited) as
//! one unit.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DomainError, DomainResult};

/// Key/value store for one workflow document type.
pub trait DocumentStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn insert(&self, key: K, value: V);
    /// Replace an existing document. `NotFound` if it was never inserted.
    fn update(&self, key: K, value: V) -> DomainResult<()>;
    fn list(&self) -> Vec<V>;
    /// Issue the next human document number, e.g. `next_number("PO")`
    /// yields `PO-000001`. Unique per store instance.
    fn next_number(&self, prefix: &str) -> String;
}

impl<K, V, S> DocumentStore<K, V> for Arc<S>
where
    S: DocumentStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn insert(&self, key: K, value: V) {
        (**self).insert(key, value)
    }

    fn update(&self, key: K, value: V) -> DomainResult<()> {
        (**self).update(key, value)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn next_number(&self, prefix: &str) -> String {
        (**self).next_number(prefix)
    }
}

/// In-memory document store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
    sequence: AtomicU64,
}

impl<K, V> InMemoryDocumentStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }
}

impl<K, V> DocumentStore<K, V> for InMemoryDocumentStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn insert(&self, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn update(&self, key: K, value: V) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::validation("document store lock poisoned"))?;
        match map.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DomainError::not_found("document")),
        }
    }

    fn list(&self) -> Vec<V> {
        self.inner
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    fn next_number(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n:06}")
    }
}
