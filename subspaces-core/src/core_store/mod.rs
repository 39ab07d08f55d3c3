/*
    core_store - Ordered key-value state layer

    Everything the subspace keeper persists goes through the KvStore trait.
    Handles:
    - Byte-ordered get/set/delete with prefix and range iteration
    - Copy-on-write transactions (commit or discard)
    - In-memory and SQLite backends
    - The value codec shared by every record
*/

pub mod cache;
pub mod errors;
pub mod kv;
pub mod memory_store;
pub mod migrations;
pub mod sql_store;

pub use cache::CacheStore;
pub use errors::{decode, encode, StoreError, StoreResult};
pub use kv::{delete_prefix, prefix_end, prefix_keys, transact, BatchOp, KvIter, KvPair, KvStore};
pub use memory_store::MemoryStore;
pub use sql_store::SqlStore;
