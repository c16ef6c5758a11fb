//! Store construction, schema, and shared transaction helpers.

use crate::error::{StoreError, StoreResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA_SQL: &str = r#"
-- Users and credentials
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    salt TEXT NOT NULL,
    salted_hash BLOB NOT NULL
);

-- Per-user quota, set administratively
CREATE TABLE IF NOT EXISTS perms (
    user_id INTEGER PRIMARY KEY,
    quota INTEGER NOT NULL
);

-- Per-user allocation accounting
CREATE TABLE IF NOT EXISTS user_info (
    user_id INTEGER PRIMARY KEY,
    allocated INTEGER NOT NULL,
    revision INTEGER NOT NULL
);

-- File metadata; file names are unique per user
CREATE TABLE IF NOT EXISTS file_info (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    last_mod INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    file_hash TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_file_info_user_name ON file_info(user_id, file_name);

-- Chunk blobs, keyed by position within their file
CREATE TABLE IF NOT EXISTS file_chunks (
    file_id INTEGER NOT NULL,
    chunk_num INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL,
    chunk BLOB NOT NULL,
    PRIMARY KEY (file_id, chunk_num)
);

-- Bearer session tokens, stored hashed
CREATE TABLE IF NOT EXISTS session_tokens (
    token_hash TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_session_tokens_user ON session_tokens(user_id);
"#;

/// The backend data model for file storage.
///
/// All composite verbs run inside a single transaction; a transaction that
/// is dropped without an explicit commit rolls back, so any `?` exit from a
/// verb leaves the database untouched.
pub struct Store {
    pool: Pool<Sqlite>,
    chunk_size: i64,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// Schema creation is idempotent; reopening an existing database is a
    /// no-op beyond the connection setup.
    pub async fn open(path: impl AsRef<Path>, chunk_size: i64) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Internal(format!("creating database directory: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        // SQLite permits limited write concurrency; a single connection
        // serializes writers and avoids persistent lock failures.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool, chunk_size };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema. Safe to call on an already-initialized database.
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// The server-wide maximum chunk byte length.
    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Read the owner of `file_id`, failing `NotFound` for an unknown file.
    pub(crate) async fn owner_of(
        conn: &mut SqliteConnection,
        file_id: i64,
    ) -> StoreResult<i64> {
        let owner: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM file_info WHERE file_id = ?")
                .bind(file_id)
                .fetch_optional(&mut *conn)
                .await?;
        owner.ok_or_else(|| StoreError::NotFound(format!("file {file_id}")))
    }

    /// Ownership guard: fail `NotOwner` unless `user_id` owns `file_id`.
    pub(crate) async fn check_owner(
        conn: &mut SqliteConnection,
        user_id: i64,
        file_id: i64,
    ) -> StoreResult<()> {
        let owner = Self::owner_of(conn, file_id).await?;
        if owner != user_id {
            return Err(StoreError::NotOwner(file_id));
        }
        Ok(())
    }

    /// Add `delta` to the user's allocated byte count and bump the revision
    /// counter. Fails unless exactly one row was updated.
    pub(crate) async fn adjust_allocation(
        conn: &mut SqliteConnection,
        user_id: i64,
        delta: i64,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE user_info SET allocated = allocated + ?, revision = revision + 1 \
             WHERE user_id = ?",
        )
        .bind(delta)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Internal(format!(
                "allocation update for user {user_id} affected {} rows",
                result.rows_affected()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("icebox.db");

        let store = Store::open(&db_path, 128).await.unwrap();
        store.health_check().await.unwrap();
        drop(store);

        // Reopening an existing database must not fail.
        let store = Store::open(&db_path, 128).await.unwrap();
        store.health_check().await.unwrap();
        assert_eq!(store.chunk_size(), 128);
    }
}
