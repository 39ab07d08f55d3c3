/*
    kv.rs - Ordered key-value abstraction

    Every component above the store talks to this trait only. Keys are
    compared as raw bytes and iteration is always ascending, so a prefix
    scan returns exactly the entries scoped under that prefix, in order.
*/

use super::cache::CacheStore;
use super::errors::{StoreError, StoreResult};
use tracing::trace;

/// A raw key/value pair returned by iteration
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Cursor over an ordered range. Dropping it releases the underlying cursor.
pub type KvIter<'a> = Box<dyn Iterator<Item = KvPair> + 'a>;

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered key-value store with prefix iteration
pub trait KvStore {
    /// Read the value stored under `key`
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Tell whether `key` is present
    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite `key`
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Iterate `[start, end)` in ascending key order; `None` means unbounded
    fn iter_range(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<KvIter<'_>>;

    /// Iterate every entry whose key starts with `prefix`
    fn iter_prefix(&self, prefix: &[u8]) -> StoreResult<KvIter<'_>> {
        let end = prefix_end(prefix);
        self.iter_range(prefix, end.as_deref())
    }

    /// Apply a batch of writes in order
    fn write_batch(&mut self, ops: Vec<BatchOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                BatchOp::Set(key, value) => self.set(&key, &value)?,
                BatchOp::Delete(key) => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty prefix or all `0xff`),
/// in which case the scan is unbounded.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Collect the keys under `prefix` without holding the cursor afterwards
pub fn prefix_keys(store: &dyn KvStore, prefix: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
    Ok(store.iter_prefix(prefix)?.map(|(key, _)| key).collect())
}

/// Delete every key under `prefix`, returning how many entries were removed
pub fn delete_prefix(store: &mut dyn KvStore, prefix: &[u8]) -> StoreResult<usize> {
    let keys = prefix_keys(store, prefix)?;
    let count = keys.len();
    store.write_batch(keys.into_iter().map(BatchOp::Delete).collect())?;
    trace!(prefix = %hex::encode(prefix), count, "deleted prefix");
    Ok(count)
}

/// Run `f` as one atomic state transition.
///
/// All writes go to a [`CacheStore`] overlay; they reach `store` in a
/// single batch only when `f` returns `Ok`. On `Err` nothing is written.
pub fn transact<T, E, F>(store: &mut dyn KvStore, f: F) -> Result<T, E>
where
    F: FnOnce(&mut CacheStore<'_>) -> Result<T, E>,
    E: From<StoreError>,
{
    let mut cache = CacheStore::new(store);
    match f(&mut cache) {
        Ok(value) => {
            cache.commit()?;
            Ok(value)
        }
        Err(err) => {
            trace!(pending = cache.pending_len(), "transition failed, discarding writes");
            Err(err)
        }
    }
}
