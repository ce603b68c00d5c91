//! Named finite-state variables driving multi-step mock flows.
//!
//! A scenario is a named string-valued state. Expectations can require a
//! scenario state to match and can transition the scenario when they win.
//! Scenarios that were never set, and scenarios that were reset, read as the
//! `"Scenario.START"` sentinel; explicitly setting a scenario to the sentinel
//! is indistinguishable from never having set it.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::expectation::SCENARIO_START;

/// Store mapping scenario names to their current state.
#[derive(Debug, Default)]
pub struct ScenarioStore {
    inner: RwLock<HashMap<String, String>>,
}

impl ScenarioStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a scenario; `"Scenario.START"` for unknown names.
    pub fn get(&self, name: &str) -> String {
        self.inner
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| SCENARIO_START.to_string())
    }

    /// Sets a scenario to the given state. Atomic per scenario.
    pub fn set(&self, name: &str, state: &str) {
        self.inner
            .write()
            .insert(name.to_string(), state.to_string());
    }

    /// Resets one scenario back to the start sentinel.
    pub fn reset_one(&self, name: &str) {
        self.inner.write().remove(name);
    }

    /// Resets every scenario.
    pub fn reset_all(&self) {
        self.inner.write().clear();
    }

    /// Snapshot of all known scenarios as `(name, state)` pairs, sorted by
    /// name for stable listings.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scenario_reads_as_start() {
        let store = ScenarioStore::new();
        assert_eq!(store.get("checkout"), SCENARIO_START);
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = ScenarioStore::new();
        store.set("checkout", "paid");
        assert_eq!(store.get("checkout"), "paid");
    }

    #[test]
    fn reset_one_returns_to_start() {
        let store = ScenarioStore::new();
        store.set("a", "x");
        store.set("b", "y");
        store.reset_one("a");
        assert_eq!(store.get("a"), SCENARIO_START);
        assert_eq!(store.get("b"), "y");
    }

    #[test]
    fn explicit_start_equals_unset() {
        let store = ScenarioStore::new();
        store.set("a", SCENARIO_START);
        assert_eq!(store.get("a"), store.get("never-touched"));
    }

    #[test]
    fn snapshot_is_sorted() {
        let store = ScenarioStore::new();
        store.set("b", "2");
        store.set("a", "1");
        assert_eq!(
            store.snapshot(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }
}
