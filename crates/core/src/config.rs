//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path to the sqlite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Maximum byte length of a single chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    /// Session token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("icebox.db")
}

fn default_chunk_size() -> i64 {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_token_ttl_secs() -> i64 {
    crate::DEFAULT_TOKEN_TTL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: default_database_path(),
            chunk_size: default_chunk_size(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl ServerConfig {
    /// Config suitable for tests: small chunks, throwaway database path.
    ///
    /// **For testing only.** Callers are expected to override
    /// `database_path` with a temp location.
    pub fn for_testing() -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            database_path: PathBuf::from("test-icebox.db"),
            chunk_size: 128,
            token_ttl_secs: 3600,
        }
    }
}

/// Client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://127.0.0.1:8080").
    #[serde(default)]
    pub host: Option<String>,
    /// Username for login.
    #[serde(default)]
    pub user: Option<String>,
    /// Extra-strict sync: verify per-chunk hashes even when the whole-file
    /// hash matches.
    #[serde(default = "default_extra_strict")]
    pub extra_strict: bool,
}

fn default_extra_strict() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            extra_strict: default_extra_strict(),
        }
    }
}
