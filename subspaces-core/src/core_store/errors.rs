/*
    errors.rs - Error types for the store subsystem

    Defines all error types that can occur in:
    - Backend I/O (SQLite, connection pool)
    - Value encoding/decoding
    - Corrupted keys found while scanning
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Connection pool could not hand out a connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Corrupted data detected
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Pool(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Encode a value with the store codec
pub fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a value previously written with [`encode`]
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
}
