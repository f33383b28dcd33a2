//! Metric registry
//!
//! Maps strategy ids to the metric definitions the exporter counts. Writers
//! are the reconciler and the metric API; the scanner is the reader.
//!
//! The map lives behind an `Arc` so readers can take a snapshot under the
//! read lock and walk it after releasing the lock. Writers copy the map when
//! a snapshot is still alive, so an iteration sees each entry either before
//! or after a concurrent write, never half-written.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::StrategyMetric;

/// Registry snapshot handed to readers
pub type RegistrySnapshot = Arc<HashMap<String, StrategyMetric>>;

/// Thread-safe strategy id -> metric definition map
#[derive(Debug, Default)]
pub struct MetricRegistry {
    entries: RwLock<RegistrySnapshot>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the entry for `id`
    pub fn get(&self, id: &str) -> Option<StrategyMetric> {
        self.entries.read().get(id).cloned()
    }

    /// Insert or fully replace the entry for `id`, returning the previous one
    pub fn set(&self, id: impl Into<String>, entry: StrategyMetric) -> Option<StrategyMetric> {
        let mut entries = self.entries.write();
        Arc::make_mut(&mut entries).insert(id.into(), entry)
    }

    /// Insert `entry` unless `id` is taken; returns whether it was inserted
    pub fn insert_if_absent(&self, id: impl Into<String>, entry: StrategyMetric) -> bool {
        let id = id.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        Arc::make_mut(&mut entries).insert(id, entry);
        true
    }

    /// Run `f` only if `id` still maps to `expected`.
    ///
    /// The read lock is held while `f` runs, so no writer can replace or
    /// remove the entry until it returns.
    pub fn with_current<R, F>(&self, id: &str, expected: &StrategyMetric, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let entries = self.entries.read();
        if entries.get(id) != Some(expected) {
            return None;
        }
        Some(f())
    }

    /// Remove the entry for `id`, returning it if it existed
    pub fn delete(&self, id: &str) -> Option<StrategyMetric> {
        let mut entries = self.entries.write();
        if !entries.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut entries).remove(id)
    }

    /// Visit every entry of a point-in-time snapshot.
    ///
    /// The lock is released before the first call to `visit`, so slow
    /// visitors do not block writers. Return `false` to stop early.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &StrategyMetric) -> bool,
    {
        let snapshot = self.snapshot();
        for (id, entry) in snapshot.iter() {
            if !visit(id, entry) {
                break;
            }
        }
    }

    /// Point-in-time view of the whole registry
    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
