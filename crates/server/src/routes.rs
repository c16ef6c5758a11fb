//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Slack on top of the chunk size for the request body limit, covering
/// framing overhead.
const BODY_LIMIT_SLACK: usize = 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.store.chunk_size() as usize + BODY_LIMIT_SLACK;

    Router::new()
        // Login is the only unauthenticated endpoint.
        .route("/api/users/login", post(handlers::login))
        .route("/api/user/stats", get(handlers::user_stats))
        .route(
            "/api/files",
            get(handlers::get_all_files).post(handlers::put_file),
        )
        // The static "name" segment must be registered alongside the
        // {file_id} capture; axum prefers the static match.
        .route("/api/file/name", get(handlers::get_file_by_name))
        .route(
            "/api/file/{file_id}",
            get(handlers::get_file_by_id).delete(handlers::delete_file),
        )
        .route("/api/chunk/{file_id}", get(handlers::get_chunk_list))
        .route(
            "/api/chunk/{file_id}/{chunk_num}",
            get(handlers::get_chunk),
        )
        .route(
            "/api/chunk/{file_id}/{chunk_num}/{chunk_hash}",
            put(handlers::put_chunk),
        )
        // Chunk bodies may exceed axum's default 2 MiB body cap.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
