//! In-memory key-value store
//!
//! Backs the `/api/{key}` routes. Keys are unique, non-empty strings and
//! the last writer wins. Values are arbitrary byte strings (possibly empty).
//!
//! The map is a `std::collections::HashMap` (SipHash, open addressing with
//! amortized O(1) average-case operations and automatic growth). Growth and
//! value copies go through `try_reserve` so an allocation failure is
//! reported as [`StoreError::Allocation`] instead of aborting the process.

use std::collections::HashMap;
use thiserror::Error;

/// Initial bucket capacity used by [`KvStore::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Errors returned by store mutations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("allocation failed while storing key of {0} bytes")]
    Allocation(usize),
}

/// Single-owner key-value map.
///
/// The store is owned by the router, which is owned by the event loop, so
/// no internal locking is needed: at most one mutator exists at a time.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: HashMap<String, Vec<u8>>,
}

impl KvStore {
    /// Create an empty store with [`DEFAULT_CAPACITY`] preallocated slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let mut owned = Vec::new();
        owned
            .try_reserve_exact(value.len())
            .map_err(|_| StoreError::Allocation(key.len()))?;
        owned.extend_from_slice(value);

        if let Some(slot) = self.entries.get_mut(key) {
            *slot = owned;
            return Ok(());
        }

        self.entries
            .try_reserve(1)
            .map_err(|_| StoreError::Allocation(key.len()))?;
        self.entries.insert(key.to_owned(), owned);
        Ok(())
    }

    /// Copy of the stored value, or `None` for an unknown key.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    /// Remove `key`; returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_single_entry() {
        let mut store = KvStore::with_capacity(4);
        store.set("a", b"1").unwrap();
        store.set("a", b"2").unwrap();

        assert_eq!(store.size(), 1);
        assert_eq!(store.get("a"), Some(b"2".to_vec()));
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut store = KvStore::new();
        assert_eq!(store.set("", b"x"), Err(StoreError::EmptyKey));
        assert!(store.is_empty());
    }
}
