//! In-memory ordered store

use super::errors::StoreResult;
use super::kv::{KvIter, KvStore};
use std::collections::BTreeMap;
use std::ops::Bound;

/// `BTreeMap`-backed store, used for tests and ephemeral deployments
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.data.contains_key(key))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn iter_range(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<KvIter<'_>> {
        // BTreeMap::range panics on inverted bounds
        if matches!(end, Some(end) if end <= start) {
            return Ok(Box::new(std::iter::empty()));
        }

        let upper = match end {
            Some(end) => Bound::Excluded(end.to_vec()),
            None => Bound::Unbounded,
        };
        Ok(Box::new(
            self.data
                .range((Bound::Included(start.to_vec()), upper))
                .map(|(k, v)| (k.clone(), v.clone())),
        ))
    }
}
