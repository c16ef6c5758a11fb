//! Core domain types and shared logic for Icebox.
//!
//! This crate defines the data model used across the other crates:
//! - Content, chunk, and whole-file hashes
//! - Chunk arithmetic and local-file hash info
//! - Configuration types shared by the server and client

pub mod chunker;
pub mod config;
pub mod error;
pub mod hash;

pub use chunker::{FileHashInfo, chunk_count_for_len, for_each_chunk};
pub use error::{Error, Result};
pub use hash::{ChunkHash, ContentHash, FileHash};

/// Default chunk size: 4 MiB
pub const DEFAULT_CHUNK_SIZE: i64 = 4 * 1024 * 1024;

/// Default session token lifetime in seconds: 24 hours
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
