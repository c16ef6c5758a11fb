//! File registration and lookup handlers.

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use icebox_store::FileInfo;
use serde::{Deserialize, Serialize};

/// File metadata as reported to clients, including which chunks the server
/// is still missing.
#[derive(Debug, Serialize)]
pub struct FileInfoResponse {
    pub file_id: i64,
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
    pub missing_chunks: Vec<i64>,
}

/// File metadata without the missing-chunk report, used for listings.
#[derive(Debug, Serialize)]
pub struct FileInfoEntry {
    pub file_id: i64,
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
}

impl From<FileInfo> for FileInfoEntry {
    fn from(fi: FileInfo) -> Self {
        Self {
            file_id: fi.file_id,
            file_name: fi.file_name,
            last_mod: fi.last_mod,
            chunk_count: fi.chunk_count,
            file_hash: fi.file_hash,
        }
    }
}

/// Listing of all files for the caller.
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileInfoEntry>,
}

/// Registration request for a new file.
#[derive(Debug, Deserialize)]
pub struct FilePutRequest {
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
}

async fn with_missing(state: &AppState, fi: FileInfo) -> ApiResult<FileInfoResponse> {
    let missing = state
        .store
        .get_missing_chunk_numbers_for_file(fi.user_id, fi.file_id)
        .await?;
    Ok(FileInfoResponse {
        file_id: fi.file_id,
        file_name: fi.file_name,
        last_mod: fi.last_mod,
        chunk_count: fi.chunk_count,
        file_hash: fi.file_hash,
        missing_chunks: missing,
    })
}

/// GET /api/files - list the caller's registered files.
pub async fn get_all_files(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> ApiResult<Json<FileListResponse>> {
    let files = state.store.get_all_user_file_infos(auth.user_id).await?;
    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileInfoEntry::from).collect(),
    }))
}

/// POST /api/files - register a new file. Fails 409 if the name exists.
pub async fn put_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(req): Json<FilePutRequest>,
) -> ApiResult<(StatusCode, Json<FileInfoResponse>)> {
    let fi = state
        .store
        .add_file_info(
            auth.user_id,
            &req.file_name,
            req.last_mod,
            req.chunk_count,
            &req.file_hash,
        )
        .await?;
    tracing::info!(user = %auth.name, file = %fi.file_name, chunks = fi.chunk_count, "registered file");

    let response = with_missing(&state, fi).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Query string for by-name lookup.
#[derive(Debug, Deserialize)]
pub struct FileByNameQuery {
    pub name: String,
}

/// GET /api/file/name?name= - look up a file by its remote path.
pub async fn get_file_by_name(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<FileByNameQuery>,
) -> ApiResult<Json<FileInfoResponse>> {
    let fi = state
        .store
        .get_file_info_by_name(auth.user_id, &query.name)
        .await?;
    Ok(Json(with_missing(&state, fi).await?))
}

/// GET /api/file/{file_id} - look up a file by id.
pub async fn get_file_by_id(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(file_id): Path<i64>,
) -> ApiResult<Json<FileInfoResponse>> {
    let fi = state.store.get_file_info(auth.user_id, file_id).await?;
    Ok(Json(with_missing(&state, fi).await?))
}

/// DELETE /api/file/{file_id} - remove a file, its chunks, and the
/// allocation they occupied.
pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(file_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.remove_file(auth.user_id, file_id).await?;
    tracing::info!(user = %auth.name, file_id, "deleted file");
    Ok(StatusCode::NO_CONTENT)
}
