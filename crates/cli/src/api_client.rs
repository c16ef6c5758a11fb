//! HTTP client for the icebox API.

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Client-side transport errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("login failed: {0}")]
    Login(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

// =============================================================================
// Request/response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub chunk_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfoResponse {
    pub file_id: i64,
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
    pub missing_chunks: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfoEntry {
    pub file_id: i64,
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Vec<FileInfoEntry>,
}

#[derive(Debug, Serialize)]
pub struct FilePutRequest {
    pub file_name: String,
    pub last_mod: i64,
    pub chunk_count: i64,
    pub file_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ChunkInfoEntry {
    pub chunk_num: i64,
    pub chunk_hash: String,
}

#[derive(Debug, Deserialize)]
struct ChunkListResponse {
    chunks: Vec<ChunkInfoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UserStatsResponse {
    pub quota: i64,
    pub allocated: i64,
    pub revision: i64,
}

/// An authenticated connection to an icebox server.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    user_id: i64,
    chunk_size: i64,
}

impl ApiClient {
    /// Log in with username and password, returning an authenticated client.
    pub async fn login(base_url: &str, user: &str, password: &str) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::new();

        let url = join(&base_url, "/api/users/login")?;
        let response = http
            .post(url)
            .form(&[("user", user), ("password", password)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::Login(format!("{status}: {body}")));
        }
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::Login(format!("invalid login response: {e}")))?;

        Ok(Self {
            http,
            base_url,
            token: login.token,
            user_id: login.user_id,
            chunk_size: login.chunk_size,
        })
    }

    /// The server's chunk size; local files are chunked at this length.
    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        join(&self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> ClientResult<T> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::Api { status, body });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Api {
            status,
            body: format!("invalid response body: {e}"),
        })
    }

    async fn send_empty(&self, req: reqwest::RequestBuilder) -> ClientResult<()> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// Look up a file by its remote path. Returns `None` if the server does
    /// not know the file.
    pub async fn get_file_by_name(&self, name: &str) -> ClientResult<Option<FileInfoResponse>> {
        let mut url = self.url("/api/file/name")?;
        url.query_pairs_mut().append_pair("name", name);
        match self.send_json(self.http.get(url)).await {
            Ok(info) => Ok(Some(info)),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Look up a file by id.
    pub async fn get_file(&self, file_id: i64) -> ClientResult<FileInfoResponse> {
        let url = self.url(&format!("/api/file/{file_id}"))?;
        self.send_json(self.http.get(url)).await
    }

    /// Register a new file.
    pub async fn register_file(&self, req: &FilePutRequest) -> ClientResult<FileInfoResponse> {
        let url = self.url("/api/files")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    /// Delete a file and its chunks.
    pub async fn delete_file(&self, file_id: i64) -> ClientResult<()> {
        let url = self.url(&format!("/api/file/{file_id}"))?;
        self.send_empty(self.http.delete(url)).await
    }

    /// List all of the caller's files.
    pub async fn list_files(&self) -> ClientResult<Vec<FileInfoEntry>> {
        let url = self.url("/api/files")?;
        let response: FileListResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.files)
    }

    /// List a file's stored chunk positions and hashes.
    pub async fn get_chunk_list(&self, file_id: i64) -> ClientResult<Vec<ChunkInfoEntry>> {
        let url = self.url(&format!("/api/chunk/{file_id}"))?;
        let response: ChunkListResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.chunks)
    }

    /// Fetch a chunk's bytes and its stored hash.
    pub async fn get_chunk(&self, file_id: i64, chunk_num: i64) -> ClientResult<(Vec<u8>, Option<String>)> {
        let url = self.url(&format!("/api/chunk/{file_id}/{chunk_num}"))?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let hash = response
            .headers()
            .get("x-chunk-hash")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok((bytes, hash))
    }

    /// Upload a chunk's bytes under its hash.
    pub async fn put_chunk(
        &self,
        file_id: i64,
        chunk_num: i64,
        chunk_hash: &str,
        data: Vec<u8>,
    ) -> ClientResult<()> {
        let url = self.url(&format!("/api/chunk/{file_id}/{chunk_num}/{chunk_hash}"))?;
        self.send_empty(self.http.put(url).body(data)).await
    }

    /// Fetch the caller's quota and accounting counters.
    pub async fn user_stats(&self) -> ClientResult<UserStatsResponse> {
        let url = self.url("/api/user/stats")?;
        self.send_json(self.http.get(url)).await
    }
}

fn join(base: &Url, path: &str) -> ClientResult<Url> {
    base.join(path)
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))
}
