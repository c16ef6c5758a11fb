//! Chunk storage verbs.
//!
//! Every mutation pairs the chunk write with an allocation update inside
//! the same transaction, so quota exhaustion never leaves a partially
//! written chunk.

use crate::error::{StoreError, StoreResult};
use crate::models::{FileChunk, FileChunkInfo};
use crate::store::Store;

impl Store {
    /// Store a chunk at `(file_id, chunk_num)`, replacing any existing one.
    ///
    /// The chunk's length is charged against the user's quota before the
    /// write. On replacement the new chunk's length is added to the user's
    /// allocation without subtracting the old chunk's; repeated re-puts of
    /// the same chunk number therefore inflate the allocated counter. That
    /// matches the long-standing accounting behavior clients observe and is
    /// kept deliberately.
    ///
    /// `chunk_num` is not validated against the file's chunk count; an
    /// out-of-range chunk is stored and retrievable, but never reported
    /// missing.
    pub async fn add_file_chunk(
        &self,
        user_id: i64,
        file_id: i64,
        chunk_num: i64,
        chunk_hash: &str,
        chunk: &[u8],
    ) -> StoreResult<()> {
        let chunk_len = chunk.len() as i64;
        if chunk_len > self.chunk_size() {
            return Err(StoreError::ChunkTooLarge {
                len: chunk_len,
                max: self.chunk_size(),
            });
        }

        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        let quota: Option<i64> = sqlx::query_scalar("SELECT quota FROM perms WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let quota = quota.ok_or_else(|| StoreError::NotFound(format!("quota for user {user_id}")))?;

        let allocated: Option<i64> =
            sqlx::query_scalar("SELECT allocated FROM user_info WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let allocated =
            allocated.ok_or_else(|| StoreError::NotFound(format!("user info for user {user_id}")))?;

        if quota - allocated < chunk_len {
            return Err(StoreError::QuotaExceeded {
                quota,
                allocated,
                chunk_len,
            });
        }

        let result = sqlx::query(
            "INSERT OR REPLACE INTO file_chunks (file_id, chunk_num, chunk_hash, chunk) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(file_id)
        .bind(chunk_num)
        .bind(chunk_hash)
        .bind(chunk)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() != 1 {
            return Err(StoreError::Internal(format!(
                "chunk insert affected {} rows",
                result.rows_affected()
            )));
        }

        Self::adjust_allocation(&mut tx, user_id, chunk_len).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove the chunk at `(file_id, chunk_num)` and refund its bytes to
    /// the user's allocation. Fails `NotFound` if the chunk is absent.
    pub async fn remove_file_chunk(
        &self,
        user_id: i64,
        file_id: i64,
        chunk_num: i64,
    ) -> StoreResult<bool> {
        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        // Read the stored chunk's length so the refund matches the bytes
        // actually held.
        let stored_len: Option<i64> = sqlx::query_scalar(
            "SELECT LENGTH(chunk) FROM file_chunks WHERE file_id = ? AND chunk_num = ?",
        )
        .bind(file_id)
        .bind(chunk_num)
        .fetch_optional(&mut *tx)
        .await?;
        let stored_len = stored_len
            .ok_or_else(|| StoreError::NotFound(format!("chunk {chunk_num} of file {file_id}")))?;

        let result = sqlx::query("DELETE FROM file_chunks WHERE file_id = ? AND chunk_num = ?")
            .bind(file_id)
            .bind(chunk_num)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() < 1 {
            return Err(StoreError::Internal(format!(
                "chunk delete affected {} rows",
                result.rows_affected()
            )));
        }

        Self::adjust_allocation(&mut tx, user_id, -stored_len).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Fetch a chunk's hash and bytes.
    ///
    /// Not ownership-guarded: callers are expected to have resolved the
    /// file through `get_file_info` first.
    pub async fn get_file_chunk(&self, file_id: i64, chunk_num: i64) -> StoreResult<FileChunk> {
        let chunk = sqlx::query_as::<_, FileChunk>(
            "SELECT file_id, chunk_num, chunk_hash, chunk FROM file_chunks \
             WHERE file_id = ? AND chunk_num = ?",
        )
        .bind(file_id)
        .bind(chunk_num)
        .fetch_optional(self.pool())
        .await?;
        chunk.ok_or_else(|| StoreError::NotFound(format!("chunk {chunk_num} of file {file_id}")))
    }

    /// List the stored chunks' positions and hashes for a file, ascending.
    pub async fn get_file_chunk_infos(
        &self,
        user_id: i64,
        file_id: i64,
    ) -> StoreResult<Vec<FileChunkInfo>> {
        let mut tx = self.pool().begin().await?;
        Self::check_owner(&mut tx, user_id, file_id).await?;

        let infos = sqlx::query_as::<_, FileChunkInfo>(
            "SELECT chunk_num, chunk_hash FROM file_chunks WHERE file_id = ? ORDER BY chunk_num",
        )
        .bind(file_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(infos)
    }
}
