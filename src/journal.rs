//! Append-only log of received mock requests.
//!
//! Every request outside the management prefix is recorded here before
//! matching, in wire arrival order as observed by the dispatcher. Test suites
//! query the journal through the management API to assert on received
//! traffic. The journal is unbounded by default; a bounded journal drops its
//! oldest entries once full.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{expectation::RequestPattern, matching, request::ReceivedRequest};

/// Insertion-ordered record of received requests.
#[derive(Debug, Default)]
pub struct Journal {
    inner: RwLock<VecDeque<Arc<ReceivedRequest>>>,
    capacity: Option<usize>,
}

impl Journal {
    /// Creates an unbounded journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal keeping at most `capacity` entries, dropping the
    /// oldest past the bound.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Appends an entry. Appends are totally ordered.
    pub fn append(&self, entry: Arc<ReceivedRequest>) {
        let mut inner = self.inner.write();
        if let Some(capacity) = self.capacity {
            while inner.len() >= capacity {
                inner.pop_front();
            }
        }
        inner.push_back(entry);
    }

    /// Entries matching a request pattern, in insertion order. Runs as a
    /// linear scan over a snapshot, with the same pattern semantics as
    /// expectation matching.
    pub fn search(&self, pattern: &RequestPattern) -> Vec<Arc<ReceivedRequest>> {
        let snapshot: Vec<_> = self.inner.read().iter().cloned().collect();
        snapshot
            .into_iter()
            .filter(|entry| matching::pattern_matches(pattern, entry))
            .collect()
    }

    /// Number of entries matching a request pattern.
    pub fn count(&self, pattern: &RequestPattern) -> usize {
        self.search(pattern).len()
    }

    /// Discards all entries.
    pub fn reset(&self) {
        self.inner.write().clear();
    }

    /// Total number of recorded entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the journal holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
