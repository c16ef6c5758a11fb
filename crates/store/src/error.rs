//! Storage engine error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("user does not own file {0}")]
    NotOwner(i64),

    #[error("username '{0}' is already taken")]
    DuplicateName(String),

    #[error("file '{0}' is already registered")]
    DuplicateFile(String),

    #[error("quota exceeded: quota {quota}, allocated {allocated}, chunk is {chunk_len} bytes")]
    QuotaExceeded {
        quota: i64,
        allocated: i64,
        chunk_len: i64,
    },

    #[error("chunk is {len} bytes but the server limit is {max} bytes")]
    ChunkTooLarge { len: i64, max: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
