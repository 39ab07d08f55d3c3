//! SQLite-backed ordered key-value store

use super::errors::StoreResult;
use super::kv::{BatchOp, KvIter, KvStore};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable store over a pooled SQLite database
pub struct SqlStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqlStore {
    /// Create a store with the given connection pool, running migrations
    pub fn new(pool: Pool<SqliteConnectionManager>) -> StoreResult<Self> {
        super::migrations::migrate(&pool)?;
        Ok(Self { pool })
    }

    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> StoreResult<Self> {
        Self::open_with_timeout(path, pool_size, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open (or create) a database file, waiting up to `busy_timeout` on locks
    pub fn open_with_timeout(path: impl AsRef<Path>, pool_size: u32, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
        });
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
        debug!(path = %path.display(), pool_size, "opened sqlite store");
        Self::new(pool)
    }

    /// Create a new in-memory store.
    ///
    /// Every `:memory:` connection is its own database, so the pool is
    /// capped at one connection.
    pub fn memory() -> StoreResult<Self> {
        let pool = Pool::builder().max_size(1).build(SqliteConnectionManager::memory())?;
        Self::new(pool)
    }

    /// Number of stored entries
    pub fn len(&self) -> StoreResult<usize> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for SqlStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn iter_range(&self, start: &[u8], end: Option<&[u8]>) -> StoreResult<KvIter<'_>> {
        let conn = self.pool.get()?;

        // Rows are collected eagerly so the pooled connection goes back right away
        let rows: Vec<(Vec<u8>, Vec<u8>)> = match end {
            Some(end) => {
                let mut stmt = conn.prepare(
                    "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key ASC",
                )?;
                let mapped = stmt.query_map(params![start, end], |row| Ok((row.get(0)?, row.get(1)?)))?;
                mapped.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key ASC")?;
                let mapped = stmt.query_map(params![start], |row| Ok((row.get(0)?, row.get(1)?)))?;
                mapped.collect::<Result<_, _>>()?
            }
        };

        Ok(Box::new(rows.into_iter()))
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let count = ops.len();
        for op in ops {
            match op {
                BatchOp::Set(key, value) => {
                    tx.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, value],
                    )?;
                }
                BatchOp::Delete(key) => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        debug!(count, "committed write batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::transact;
    use crate::core_store::StoreError;
    use tempfile::TempDir;

    #[test]
    fn test_sql_store_basic_operations() {
        let mut store = SqlStore::memory().unwrap();
        assert!(store.is_empty().unwrap());

        store.set(b"alpha", b"1").unwrap();
        store.set(b"alpha", b"2").unwrap();
        assert_eq!(store.get(b"alpha").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len().unwrap(), 1);

        store.delete(b"alpha").unwrap();
        assert_eq!(store.get(b"alpha").unwrap(), None);
    }

    #[test]
    fn test_sql_store_byte_order_matches_memory_store() {
        let mut store = SqlStore::memory().unwrap();
        let keys: Vec<Vec<u8>> =
            vec![vec![0x01, 0xff], vec![0x01], vec![0x01, 0x00, 0x05], vec![0x02], vec![0x01, 0x80]];
        for key in &keys {
            store.set(key, b"v").unwrap();
        }

        let scanned: Vec<_> = store.iter_prefix(&[0x01]).unwrap().map(|(k, _)| k).collect();
        assert_eq!(
            scanned,
            vec![vec![0x01], vec![0x01, 0x00, 0x05], vec![0x01, 0x80], vec![0x01, 0xff]]
        );
    }

    #[test]
    fn test_sql_store_transaction_rolls_back() {
        let mut store = SqlStore::memory().unwrap();
        store.set(b"stable", b"yes").unwrap();

        let result: Result<(), StoreError> = transact(&mut store, |tx| {
            tx.delete(b"stable")?;
            Err(StoreError::Storage("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(store.has(b"stable").unwrap());
    }

    #[test]
    fn test_sql_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subspaces.db");

        {
            let mut store = SqlStore::open(&path, 2).unwrap();
            store.set(b"persisted", b"value").unwrap();
        }

        let store = SqlStore::open(&path, 2).unwrap();
        assert_eq!(store.get(b"persisted").unwrap(), Some(b"value".to_vec()));
    }
}
