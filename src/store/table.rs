//! Committed rows and their row locks
//!
//! A `Table` pairs a `DashMap` of committed rows with a second `DashMap` of
//! per-key row locks. Readers outside a unit of work read committed rows and
//! never wait on a row lock. A unit of work may hold a row lock across
//! `.await` points; no `DashMap` shard guard is ever held across one.
//!
//! # Thread Safety
//!
//! Row values are only replaced by [`Table::publish`], which the unit of work
//! calls on commit while it still holds the row lock. Lock handles are created
//! on demand, so a key can be locked before its row exists (used for lazy
//! wallet creation).

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Committed rows of one entity type plus one async mutex per key
#[derive(Debug)]
pub struct Table<K, V>
where
    K: Eq + Hash + Copy,
{
    /// Committed row values
    rows: DashMap<K, V>,

    /// Row locks, created lazily and never removed
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Copy,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Snapshot of the committed row
    pub fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|row| row.value().clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    /// Snapshot of every committed row matching the predicate, in arbitrary order
    pub fn scan<F>(&self, predicate: F) -> Vec<V>
    where
        F: Fn(&V) -> bool,
    {
        self.rows
            .iter()
            .filter(|row| predicate(row.value()))
            .map(|row| row.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Shared handle to the row lock for `key`
    ///
    /// The shard guard is released before the handle is returned, so callers
    /// may await the lock freely.
    pub(crate) fn lock_handle(&self, key: K) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key).or_default().value())
    }

    /// Replace the committed value of a row
    pub(crate) fn publish(&self, key: K, value: V) {
        self.rows.insert(key, value);
    }
}

impl<K, V> Default for Table<K, V>
where
    K: Eq + Hash + Copy,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_get() {
        let table: Table<u32, String> = Table::new();

        assert!(table.get(&1).is_none());
        table.publish(1, "one".to_string());

        assert_eq!(table.get(&1), Some("one".to_string()));
        assert!(table.contains(&1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_scan_filters_rows() {
        let table: Table<u32, u32> = Table::new();
        for i in 0..10 {
            table.publish(i, i * 10);
        }

        let mut even = table.scan(|value| value % 20 == 0);
        even.sort();

        assert_eq!(even, vec![0, 20, 40, 60, 80]);
    }

    #[test]
    fn test_lock_handle_is_shared_per_key() {
        let table: Table<u32, u32> = Table::new();

        let first = table.lock_handle(1);
        let second = table.lock_handle(1);
        let other = table.lock_handle(2);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_lock_handle_exists_before_row() {
        let table: Table<u32, u32> = Table::new();

        let handle = table.lock_handle(5);
        let guard = handle.lock().await;

        assert!(table.lock_handle(5).try_lock().is_err());
        drop(guard);
        assert!(table.lock_handle(5).try_lock().is_ok());
        assert!(table.is_empty());
    }
}
