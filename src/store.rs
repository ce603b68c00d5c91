//! Concurrent in-memory registry of expectations.
//!
//! The store keeps expectations in insertion order behind a readers-writer
//! lock. Readers take a cheap copy-on-read snapshot of the pointer list, so
//! matching never holds the lock while evaluating patterns and writers never
//! wait on in-flight matches.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::expectation::Expectation;

/// Registry of expectations keyed by id, preserving insertion order.
#[derive(Debug, Default)]
pub struct ExpectationStore {
    inner: RwLock<Vec<Arc<Expectation>>>,
}

impl ExpectationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an expectation, assigning a content-hash id when none was
    /// given. An expectation with the id of an existing entry replaces it in
    /// place, keeping its insertion position. Returns the id.
    pub fn add(&self, mut expectation: Expectation) -> String {
        let id = expectation
            .id
            .clone()
            .unwrap_or_else(|| expectation.content_id());
        expectation.id = Some(id.clone());
        let entry = Arc::new(expectation);

        let mut inner = self.inner.write();
        match inner
            .iter_mut()
            .find(|e| e.id.as_deref() == Some(id.as_str()))
        {
            Some(slot) => *slot = entry,
            None => inner.push(entry),
        }
        id
    }

    /// Returns a snapshot of all expectations in insertion order.
    pub fn list(&self) -> Vec<Arc<Expectation>> {
        self.inner.read().clone()
    }

    /// Removes the expectation with the given id. Idempotent; returns whether
    /// an entry was removed.
    pub fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        let before = inner.len();
        inner.retain(|e| e.id.as_deref() != Some(id));
        inner.len() != before
    }

    /// Removes all expectations.
    pub fn reset(&self) {
        self.inner.write().clear();
    }

    /// Number of stored expectations.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
