//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// Lazily created mutex per key.
///
/// Used to serialize "search for a free asset, then commit" per product.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut slots = self.slots.lock().map_err(|_| StoreError::poisoned())?;
        Ok(slots.entry(key.clone()).or_default().clone())
    }

    /// Run `f` while holding the lock of every key.
    ///
    /// Keys are locked in sorted order, so callers with overlapping key sets
    /// cannot deadlock. Duplicates are locked once.
    pub fn with_locks<R>(
        &self,
        keys: impl IntoIterator<Item = K>,
        f: impl FnOnce() -> R,
    ) -> Result<R, StoreError> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let slots = keys
            .iter()
            .map(|k| self.slot(k))
            .collect::<Result<Vec<_>, _>>()?;

        // A panic in another holder leaves `()` behind; nothing to repair.
        let _guards: Vec<_> = slots
            .iter()
            .map(|slot| slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
            .collect();

        Ok(f())
    }

    /// Number of keys ever locked.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
