//! User, quota, accounting, and session-token verbs.

use crate::error::{StoreError, StoreResult};
use crate::models::{User, UserInfo};
use crate::store::Store;
use time::OffsetDateTime;

impl Store {
    /// True iff no user exists with the given name.
    pub async fn is_username_free(&self, name: &str) -> StoreResult<bool> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT user_id FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(existing.is_none())
    }

    /// Create a user. `salted_hash` is the combined password-and-salt hash;
    /// `salt` is the user-specific generated salt.
    pub async fn add_user(&self, name: &str, salt: &str, salted_hash: &[u8]) -> StoreResult<User> {
        let result = sqlx::query("INSERT INTO users (name, salt, salted_hash) VALUES (?, ?, ?)")
            .bind(name)
            .bind(salt)
            .bind(salted_hash)
            .execute(self.pool())
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => StoreError::DuplicateName(name.to_string()),
                _ => StoreError::Database(e),
            })?;

        Ok(User {
            user_id: result.last_insert_rowid(),
            name: name.to_string(),
            salt: salt.to_string(),
            salted_hash: salted_hash.to_vec(),
        })
    }

    /// Look up a user by name.
    pub async fn get_user(&self, name: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, name, salt, salted_hash FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        user.ok_or_else(|| StoreError::NotFound(format!("user '{name}'")))
    }

    /// Set the user's quota. Does not authenticate the caller.
    pub async fn set_user_quota(&self, user_id: i64, quota: i64) -> StoreResult<()> {
        sqlx::query("INSERT OR REPLACE INTO perms (user_id, quota) VALUES (?, ?)")
            .bind(user_id)
            .bind(quota)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Read the user's quota.
    pub async fn get_user_quota(&self, user_id: i64) -> StoreResult<i64> {
        let quota: Option<i64> = sqlx::query_scalar("SELECT quota FROM perms WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        quota.ok_or_else(|| StoreError::NotFound(format!("quota for user {user_id}")))
    }

    /// Administrative override of allocation and revision. Bypasses
    /// accounting; used when materializing a new user.
    pub async fn set_user_info(
        &self,
        user_id: i64,
        allocated: i64,
        revision: i64,
    ) -> StoreResult<()> {
        sqlx::query("INSERT OR REPLACE INTO user_info (user_id, allocated, revision) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(allocated)
            .bind(revision)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Apply a signed allocation delta and bump the revision counter.
    pub async fn update_user_info(&self, user_id: i64, alloc_delta: i64) -> StoreResult<()> {
        let mut conn = self.pool().acquire().await?;
        Self::adjust_allocation(&mut conn, user_id, alloc_delta).await
    }

    /// Read the user's allocation and revision counters.
    pub async fn get_user_info(&self, user_id: i64) -> StoreResult<UserInfo> {
        let info = sqlx::query_as::<_, UserInfo>(
            "SELECT allocated, revision FROM user_info WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        info.ok_or_else(|| StoreError::NotFound(format!("user info for user {user_id}")))
    }

    /// Rename a user.
    pub async fn rename_user(&self, user_id: i64, new_name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET name = ? WHERE user_id = ?")
            .bind(new_name)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => {
                    StoreError::DuplicateName(new_name.to_string())
                }
                _ => StoreError::Database(e),
            })?;
        if result.rows_affected() != 1 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Replace a user's salt and salted password hash.
    pub async fn set_user_password(
        &self,
        user_id: i64,
        salt: &str,
        salted_hash: &[u8],
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET salt = ?, salted_hash = ? WHERE user_id = ?")
            .bind(salt)
            .bind(salted_hash)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() != 1 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Remove a user and everything they own: chunks, files, quota,
    /// accounting, and outstanding session tokens.
    pub async fn remove_user(&self, name: &str) -> StoreResult<()> {
        let user = self.get_user(name).await?;

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "DELETE FROM file_chunks WHERE file_id IN \
             (SELECT file_id FROM file_info WHERE user_id = ?)",
        )
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM file_info WHERE user_id = ?")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM perms WHERE user_id = ?")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_info WHERE user_id = ?")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_tokens WHERE user_id = ?")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(user = %name, "removed user and owned data");
        Ok(())
    }

    /// Record a session token hash for a user.
    pub async fn insert_session_token(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO session_tokens (token_hash, user_id, expires_at) \
             VALUES (?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Resolve a session token hash to its user, if the token exists and
    /// has not expired.
    pub async fn get_session_user(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let row: Option<(i64, OffsetDateTime)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM session_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, name, salt, salted_hash FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    /// Delete expired session tokens. Returns the number removed.
    pub async fn purge_expired_tokens(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE expires_at <= ?")
            .bind(OffsetDateTime::now_utc())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    async fn open_store() -> (tempfile::TempDir, Store) {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::open(temp.path().join("icebox.db"), 128)
            .await
            .unwrap();
        (temp, store)
    }

    #[tokio::test]
    async fn add_and_get_user() {
        let (_temp, store) = open_store().await;

        assert!(store.is_username_free("alice").await.unwrap());
        let user = store.add_user("alice", "salt", b"hash").await.unwrap();
        assert!(user.user_id > 0);
        assert!(!store.is_username_free("alice").await.unwrap());

        let fetched = store.get_user("alice").await.unwrap();
        assert_eq!(fetched.user_id, user.user_id);
        assert_eq!(fetched.salt, "salt");
        assert_eq!(fetched.salted_hash, b"hash");
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let (_temp, store) = open_store().await;
        store.add_user("alice", "s1", b"h1").await.unwrap();
        let err = store.add_user("alice", "s2", b"h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn quota_and_info_roundtrip() {
        let (_temp, store) = open_store().await;
        let user = store.add_user("bob", "s", b"h").await.unwrap();

        store.set_user_quota(user.user_id, 1000).await.unwrap();
        assert_eq!(store.get_user_quota(user.user_id).await.unwrap(), 1000);

        store.set_user_info(user.user_id, 0, 0).await.unwrap();
        let info = store.get_user_info(user.user_id).await.unwrap();
        assert_eq!(info.allocated, 0);
        assert_eq!(info.revision, 0);

        store.update_user_info(user.user_id, 42).await.unwrap();
        let info = store.get_user_info(user.user_id).await.unwrap();
        assert_eq!(info.allocated, 42);
        assert_eq!(info.revision, 1);
    }

    #[tokio::test]
    async fn update_user_info_requires_row() {
        let (_temp, store) = open_store().await;
        let err = store.update_user_info(999, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[tokio::test]
    async fn session_tokens_expire() {
        let (_temp, store) = open_store().await;
        let user = store.add_user("carol", "s", b"h").await.unwrap();

        let now = OffsetDateTime::now_utc();
        store
            .insert_session_token("live", user.user_id, now + Duration::hours(1))
            .await
            .unwrap();
        store
            .insert_session_token("stale", user.user_id, now - Duration::hours(1))
            .await
            .unwrap();

        assert!(store.get_session_user("live").await.unwrap().is_some());
        assert!(store.get_session_user("stale").await.unwrap().is_none());
        assert!(store.get_session_user("unknown").await.unwrap().is_none());

        assert_eq!(store.purge_expired_tokens().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_user_cascades() {
        let (_temp, store) = open_store().await;
        let user = store.add_user("dave", "s", b"h").await.unwrap();
        store.set_user_quota(user.user_id, 1000).await.unwrap();
        store.set_user_info(user.user_id, 0, 0).await.unwrap();

        let fi = store
            .add_file_info(user.user_id, "notes.txt", 1, 1, "hash")
            .await
            .unwrap();
        store
            .add_file_chunk(user.user_id, fi.file_id, 0, "chash", b"data")
            .await
            .unwrap();

        store.remove_user("dave").await.unwrap();
        assert!(store.is_username_free("dave").await.unwrap());
        assert!(matches!(
            store.get_file_chunk(fi.file_id, 0).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
