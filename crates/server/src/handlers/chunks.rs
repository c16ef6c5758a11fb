//! Chunk transfer handlers. Chunk bodies are opaque bytes; only the list
//! endpoint speaks JSON.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use icebox_core::hash::ChunkHash;
use serde::Serialize;

/// Name of the response header carrying a chunk's stored hash.
pub const CHUNK_HASH_HEADER: &str = "x-chunk-hash";

/// A stored chunk's position and digest.
#[derive(Debug, Serialize)]
pub struct ChunkInfoEntry {
    pub chunk_num: i64,
    pub chunk_hash: String,
}

/// Listing of a file's stored chunks.
#[derive(Debug, Serialize)]
pub struct ChunkListResponse {
    pub chunks: Vec<ChunkInfoEntry>,
}

/// GET /api/chunk/{file_id} - list stored chunk positions and hashes.
pub async fn get_chunk_list(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(file_id): Path<i64>,
) -> ApiResult<Json<ChunkListResponse>> {
    let chunks = state
        .store
        .get_file_chunk_infos(auth.user_id, file_id)
        .await?;
    Ok(Json(ChunkListResponse {
        chunks: chunks
            .into_iter()
            .map(|c| ChunkInfoEntry {
                chunk_num: c.chunk_num,
                chunk_hash: c.chunk_hash,
            })
            .collect(),
    }))
}

/// GET /api/chunk/{file_id}/{chunk_num} - fetch chunk bytes.
///
/// The store-level chunk read is not ownership-guarded; resolving the file
/// through `get_file_info` first performs the check.
pub async fn get_chunk(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path((file_id, chunk_num)): Path<(i64, i64)>,
) -> ApiResult<Response> {
    state.store.get_file_info(auth.user_id, file_id).await?;
    let chunk = state.store.get_file_chunk(file_id, chunk_num).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::HeaderName::from_static(CHUNK_HASH_HEADER),
                chunk.chunk_hash,
            ),
        ],
        chunk.chunk,
    )
        .into_response())
}

/// PUT /api/chunk/{file_id}/{chunk_num}/{chunk_hash} - store chunk bytes.
///
/// The server recomputes the digest over the received body and rejects the
/// upload if it does not match the hash in the path, so a corrupted
/// transfer never lands in storage.
pub async fn put_chunk(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path((file_id, chunk_num, chunk_hash)): Path<(i64, i64, String)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let expected = ChunkHash::from_hex(&chunk_hash)
        .map_err(|e| ApiError::BadRequest(format!("invalid chunk hash: {e}")))?;
    expected
        .verify(&body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .store
        .add_file_chunk(auth.user_id, file_id, chunk_num, &chunk_hash, &body)
        .await?;
    tracing::debug!(user = %auth.name, file_id, chunk_num, len = body.len(), "stored chunk");
    Ok(StatusCode::NO_CONTENT)
}
