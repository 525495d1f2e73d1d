// src/sync/cache.rs

//! Keyed map of single-flight values.
//!
//! The map lock is held only long enough to insert-or-fetch the entry;
//! computations run outside the lock, so a slow computation for one key
//! never blocks access to another.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::sync::{ComputationFailure, SingleFlightValue};

pub struct SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    entries: Mutex<HashMap<K, Arc<SingleFlightValue<V>>>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &K) -> Arc<SingleFlightValue<V>> {
        let mut entries = self.entries.lock().unwrap();
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(SingleFlightValue::new())),
        )
    }

    /// Compute the value for `key` if nobody has yet; concurrent callers
    /// for the same key share one computation.
    pub async fn get_or_compute<F, Fut>(&self, key: &K, f: F) -> Result<V, ComputationFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        self.entry(key).get_or_compute(f).await
    }

    /// Resolve `key` directly without a computation.
    pub fn set(&self, key: &K, value: V) {
        self.entry(key).set(value);
    }

    /// Drop the entry for `key` so the next access recomputes it.
    /// Returns whether an entry was removed.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Drop every entry whose key matches the predicate.
    /// Returns whether anything was removed.
    pub fn remove_where<P>(&self, mut pred: P) -> bool
    where
        P: FnMut(&K) -> bool,
    {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !pred(key));
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl<K, V> Default for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
