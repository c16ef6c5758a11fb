//! Storage engine for Icebox.
//!
//! This crate owns the relational data model and all storage verbs:
//! - Users, quotas, and per-user allocation accounting
//! - File metadata and chunk blobs
//! - Session tokens for the transport layer
//!
//! Every composite verb runs inside a single sqlite transaction; allocation
//! updates and chunk mutations commit or roll back together.

pub mod error;
pub mod models;
pub mod store;

mod chunks;
mod files;
mod users;

pub use error::{StoreError, StoreResult};
pub use models::{FileChunk, FileChunkInfo, FileInfo, User, UserInfo};
pub use store::Store;
