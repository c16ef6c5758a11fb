//! Icebox client library: API client and the sync reconciliation engine.

pub mod api_client;
pub mod sync;

pub use api_client::{ApiClient, ClientError};
pub use sync::{SyncError, SyncStatus, sync_dir, sync_file};
