/*
    cache.rs - Copy-on-write transaction overlay

    A CacheStore buffers writes on top of a parent store. Reads observe the
    buffered writes first, iteration merges both views in key order, and
    nothing reaches the parent until commit(). Dropping the cache discards
    every pending write.
*/

use super::errors::StoreResult;
use super::kv::{BatchOp, KvIter, KvPair, KvStore};
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;

/// Transaction-scoped overlay over another store
pub struct CacheStore<'a> {
    parent: &'a mut dyn KvStore,
    /// `None` marks a pending delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheStore<'a> {
    /// Open an empty overlay on `parent`
    pub fn new(parent: &'a mut dyn KvStore) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Number of buffered writes
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush every buffered write to the parent as one batch
    pub fn commit(self) -> StoreResult<()> {
        let ops = self
            .pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOp::Set(key, value),
                None => BatchOp::Delete(key),
            })
            .collect();
        self.parent.write_batch(ops)
    }

    /// Drop every buffered write
    pub fn discard(self) {}
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self.pending.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn iter_range(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<KvIter<'_>> {
        if matches!(end, Some(end) if end <= start) {
            return Ok(Box::new(std::iter::empty()));
        }

        let upper = match end {
            Some(end) => Bound::Excluded(end.to_vec()),
            None => Bound::Unbounded,
        };
        let overlay = self
            .pending
            .range((Bound::Included(start.to_vec()), upper))
            .map(|(k, v)| (k.clone(), v.clone()));

        Ok(Box::new(MergeIter {
            parent: self.parent.iter_range(start, end)?.peekable(),
            overlay: overlay.peekable(),
        }))
    }
}

/// Merges the parent cursor with the overlay; overlay entries win on equal keys
struct MergeIter<P, O>
where
    P: Iterator<Item = KvPair>,
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    parent: Peekable<P>,
    overlay: Peekable<O>,
}

impl<P, O> Iterator for MergeIter<P, O>
where
    P: Iterator<Item = KvPair>,
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    type Item = KvPair;

    fn next(&mut self) -> Option<KvPair> {
        loop {
            let take_overlay = match (self.parent.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some((pk, _)), Some((ok, _))) => {
                    if ok == pk {
                        // Shadowed by the overlay
                        self.parent.next();
                        true
                    } else {
                        ok < pk
                    }
                }
            };

            if !take_overlay {
                return self.parent.next();
            }

            match self.overlay.next() {
                Some((key, Some(value))) => return Some((key, value)),
                Some((_, None)) => continue,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::MemoryStore;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(b"a1", b"parent-a1").unwrap();
        store.set(b"a3", b"parent-a3").unwrap();
        store.set(b"a5", b"parent-a5").unwrap();
        store
    }

    #[test]
    fn test_reads_see_pending_writes() {
        let mut parent = seeded();
        let mut cache = CacheStore::new(&mut parent);

        cache.set(b"a1", b"cached").unwrap();
        cache.delete(b"a3").unwrap();

        assert_eq!(cache.get(b"a1").unwrap(), Some(b"cached".to_vec()));
        assert_eq!(cache.get(b"a3").unwrap(), None);
        assert_eq!(cache.get(b"a5").unwrap(), Some(b"parent-a5".to_vec()));
    }

    #[test]
    fn test_iteration_merges_overlay() {
        let mut parent = seeded();
        let mut cache = CacheStore::new(&mut parent);

        cache.set(b"a2", b"new").unwrap();
        cache.set(b"a5", b"replaced").unwrap();
        cache.delete(b"a3").unwrap();
        cache.set(b"b1", b"outside").unwrap();

        let entries: Vec<_> = cache.iter_prefix(b"a").unwrap().collect();
        assert_eq!(
            entries,
            vec![
                (b"a1".to_vec(), b"parent-a1".to_vec()),
                (b"a2".to_vec(), b"new".to_vec()),
                (b"a5".to_vec(), b"replaced".to_vec()),
            ]
        );
    }

    #[test]
    fn test_dropping_cache_discards() {
        let mut parent = seeded();
        {
            let mut cache = CacheStore::new(&mut parent);
            cache.delete(b"a1").unwrap();
            cache.set(b"zz", b"value").unwrap();
            cache.discard();
        }
        assert!(parent.has(b"a1").unwrap());
        assert!(!parent.has(b"zz").unwrap());
    }

    #[test]
    fn test_nested_cache_commits_into_outer() {
        let mut parent = seeded();
        let mut outer = CacheStore::new(&mut parent);
        {
            let mut inner = CacheStore::new(&mut outer);
            inner.set(b"a9", b"inner").unwrap();
            inner.commit().unwrap();
        }
        assert_eq!(outer.get(b"a9").unwrap(), Some(b"inner".to_vec()));
        outer.commit().unwrap();
        assert_eq!(parent.get(b"a9").unwrap(), Some(b"inner".to_vec()));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let mut parent = seeded();
        let cache = CacheStore::new(&mut parent);
        assert_eq!(cache.iter_range(b"a5", Some(b"a1")).unwrap().count(), 0);
    }
}
