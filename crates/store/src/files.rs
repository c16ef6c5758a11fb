//! File metadata verbs.

use crate::error::{StoreError, StoreResult};
use crate::models::FileInfo;
use crate::store::Store;

impl Store {
    /// Register a new file for a user. Fails `DuplicateFile` if the user
    /// already has a file with this name; the existence check and the
    /// insert happen in one conditional statement.
    pub async fn add_file_info(
        &self,
        user_id: i64,
        file_name: &str,
        last_mod: i64,
        chunk_count: i64,
        file_hash: &str,
    ) -> StoreResult<FileInfo> {
        let result = sqlx::query(
            "INSERT INTO file_info (user_id, file_name, last_mod, chunk_count, file_hash) \
             SELECT ?, ?, ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM file_info WHERE user_id = ? AND file_name = ?)",
        )
        .bind(user_id)
        .bind(file_name)
        .bind(last_mod)
        .bind(chunk_count)
        .bind(file_hash)
        .bind(user_id)
        .bind(file_name)
        .execute(self.pool())
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::DuplicateFile(file_name.to_string()));
        }

        Ok(FileInfo {
            file_id: result.last_insert_rowid(),
            user_id,
            file_name: file_name.to_string(),
            last_mod,
            chunk_count,
            file_hash: file_hash.to_string(),
        })
    }

    /// Load a file's metadata by id. Ownership check and load run in one
    /// transaction.
    pub async fn get_file_info(&self, user_id: i64, file_id: i64) -> StoreResult<FileInfo> {
        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        let info = sqlx::query_as::<_, FileInfo>(
            "SELECT file_id, user_id, file_name, last_mod, chunk_count, file_hash \
             FROM file_info WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(info)
    }

    /// Load a file's metadata by name. Ownership is implicit: the lookup is
    /// scoped to the caller's rows.
    pub async fn get_file_info_by_name(
        &self,
        user_id: i64,
        file_name: &str,
    ) -> StoreResult<FileInfo> {
        let info = sqlx::query_as::<_, FileInfo>(
            "SELECT file_id, user_id, file_name, last_mod, chunk_count, file_hash \
             FROM file_info WHERE user_id = ? AND file_name = ?",
        )
        .bind(user_id)
        .bind(file_name)
        .fetch_optional(self.pool())
        .await?;
        info.ok_or_else(|| StoreError::NotFound(format!("file '{file_name}'")))
    }

    /// All files registered by a user. Empty vec if none.
    pub async fn get_all_user_file_infos(&self, user_id: i64) -> StoreResult<Vec<FileInfo>> {
        let infos = sqlx::query_as::<_, FileInfo>(
            "SELECT file_id, user_id, file_name, last_mod, chunk_count, file_hash \
             FROM file_info WHERE user_id = ? ORDER BY file_name",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(infos)
    }

    /// Chunk numbers in `[0, chunk_count)` that have not been stored for
    /// the file, ascending. Reflects a point-in-time snapshot.
    pub async fn get_missing_chunk_numbers_for_file(
        &self,
        user_id: i64,
        file_id: i64,
    ) -> StoreResult<Vec<i64>> {
        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        let chunk_count: i64 =
            sqlx::query_scalar("SELECT chunk_count FROM file_info WHERE file_id = ?")
                .bind(file_id)
                .fetch_one(&mut *tx)
                .await?;

        let known: Vec<i64> = sqlx::query_scalar(
            "SELECT chunk_num FROM file_chunks WHERE file_id = ? ORDER BY chunk_num",
        )
        .bind(file_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut missing = Vec::new();
        for i in 0..chunk_count {
            if known.binary_search(&i).is_err() {
                missing.push(i);
            }
        }
        Ok(missing)
    }

    /// Delete a file, its chunks, and the allocation they occupied.
    ///
    /// The freed bytes are applied as one bulk decrement, so the user's
    /// revision advances by exactly one.
    pub async fn remove_file(&self, user_id: i64, file_id: i64) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        let freed: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(LENGTH(chunk)), 0) FROM file_chunks WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM file_chunks WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM file_info WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(StoreError::NotFound(format!("file {file_id}")));
        }

        Self::adjust_allocation(&mut tx, user_id, -freed).await?;

        tx.commit().await?;
        tracing::debug!(user_id, file_id, freed, "removed file");
        Ok(())
    }
}
