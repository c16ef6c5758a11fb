//! Server test utilities.

use icebox_core::config::ServerConfig;
use icebox_server::auth::{generate_salt, salted_password_hash};
use icebox_server::{AppState, create_router};
use icebox_store::Store;
use std::sync::Arc;
use tempfile::TempDir;

/// Chunk size used by test servers; small enough to exercise multi-chunk
/// files with tiny payloads.
pub const TEST_CHUNK_SIZE: i64 = 128;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server backed by a temp-dir database.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("icebox.db");

        let store = Arc::new(
            Store::open(&db_path, TEST_CHUNK_SIZE)
                .await
                .expect("failed to open store"),
        );

        let config = ServerConfig {
            database_path: db_path,
            chunk_size: TEST_CHUNK_SIZE,
            ..ServerConfig::for_testing()
        };

        let state = AppState::new(config, store);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying store.
    pub fn store(&self) -> Arc<Store> {
        self.state.store.clone()
    }

    /// Create a user directly in the store, the way the admin CLI does.
    pub async fn create_user(&self, name: &str, password: &str, quota: i64) -> i64 {
        let salt = generate_salt();
        let salted_hash = salted_password_hash(&salt, password);
        let user = self
            .store()
            .add_user(name, &salt, &salted_hash)
            .await
            .expect("failed to add user");
        self.store()
            .set_user_quota(user.user_id, quota)
            .await
            .expect("failed to set quota");
        self.store()
            .set_user_info(user.user_id, 0, 0)
            .await
            .expect("failed to set user info");
        user.user_id
    }
}
