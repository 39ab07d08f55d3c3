//! Database migrations for the SQLite key-value backend
//!
//! Each migration is applied atomically and tracked in the
//! `kv_schema_version` table.

use super::errors::{StoreError, StoreResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Current schema version for the key-value backend
pub const CURRENT_KV_SCHEMA_VERSION: i32 = 1;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Ordered key-value table",
        up_sql: r#"
            -- BLOB keys compare with memcmp, which gives byte-lexicographic order
            CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            ) WITHOUT ROWID;
        "#,
        down_sql: Some(
            r#"
            DROP TABLE IF EXISTS kv;
        "#,
        ),
    }]
}

fn ensure_version_table(conn: &rusqlite::Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get current schema version from database
pub fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> StoreResult<i32> {
    let conn = pool.get()?;
    ensure_version_table(&conn)?;

    let version: Option<i32> = conn
        .query_row(
            "SELECT version FROM kv_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> StoreResult<()> {
    let current_version = get_current_version(pool)?;
    let pending: Vec<_> =
        get_migrations().into_iter().filter(|m| m.version > current_version).collect();

    if pending.is_empty() {
        return Ok(());
    }

    let conn = pool.get()?;
    for migration in pending {
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.up_sql)
            .map_err(|e| StoreError::Migration(format!("v{}: {}", migration.version, e)))?;

        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        tx.execute(
            "INSERT INTO kv_schema_version (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, now as i64],
        )?;

        tx.commit()?;
        info!(version = migration.version, description = migration.description, "applied migration");
    }

    Ok(())
}

/// Roll back to `target_version`, running down migrations newest first
pub fn rollback(pool: &Pool<SqliteConnectionManager>, target_version: i32) -> StoreResult<()> {
    let current_version = get_current_version(pool)?;
    if target_version >= current_version {
        return Ok(());
    }

    let mut to_revert: Vec<_> = get_migrations()
        .into_iter()
        .filter(|m| m.version > target_version && m.version <= current_version)
        .collect();
    to_revert.sort_by(|a, b| b.version.cmp(&a.version));

    let conn = pool.get()?;
    for migration in to_revert {
        let down_sql = migration.down_sql.ok_or_else(|| {
            StoreError::Migration(format!("v{} has no down migration", migration.version))
        })?;

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(down_sql)?;
        tx.execute("DELETE FROM kv_schema_version WHERE version = ?1", params![migration.version])?;
        tx.commit()?;
        info!(version = migration.version, "rolled back migration");
    }

    Ok(())
}
