//! Icebox HTTP server library.
//!
//! Exposes the storage engine over a token-authenticated JSON API. Chunk
//! bodies travel as opaque bytes; everything else is JSON.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
