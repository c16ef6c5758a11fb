//! Application state shared across handlers.

use icebox_core::config::ServerConfig;
use icebox_store::Store;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Storage engine.
    pub store: Arc<Store>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
