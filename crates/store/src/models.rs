//! Database models mapping to the storage schema.

use sqlx::FromRow;

/// User record. Does not carry allocation or revision statistics; those
/// live in [`UserInfo`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub salt: String,
    pub salted_hash: Vec<u8>,
}

/// Per-user allocation accounting.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct UserInfo {
    /// Running sum of stored chunk bytes owned by the user.
    pub allocated: i64,
    /// Monotone counter, bumped on every change to `allocated`.
    pub revision: i64,
}

/// Metadata stored about a single file for one user.
#[derive(Debug, Clone, FromRow)]
pub struct FileInfo {
    pub file_id: i64,
    pub user_id: i64,
    pub file_name: String,
    /// Modification time, seconds since the unix epoch.
    pub last_mod: i64,
    /// Number of chunks covering the file at the server's chunk size.
    pub chunk_count: i64,
    /// Whole-file digest computed by the client; opaque to the server.
    pub file_hash: String,
}

/// A stored chunk: client-computed digest plus opaque ciphertext bytes.
#[derive(Debug, Clone, FromRow)]
pub struct FileChunk {
    pub file_id: i64,
    pub chunk_num: i64,
    pub chunk_hash: String,
    pub chunk: Vec<u8>,
}

/// A chunk's position and digest, without its bytes.
#[derive(Debug, Clone, FromRow)]
pub struct FileChunkInfo {
    pub chunk_num: i64,
    pub chunk_hash: String,
}
