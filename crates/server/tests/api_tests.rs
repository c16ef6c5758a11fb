//! Integration tests for the HTTP API endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use icebox_core::hash::ChunkHash;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Helper to make JSON requests.
async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Log in through the API and return the bearer token.
async fn login(router: &axum::Router, user: &str, password: &str) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("user={user}&password={password}")))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login failed");

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap();
    body["token"].as_str().unwrap().to_string()
}

/// PUT chunk bytes; returns the response status.
async fn put_chunk(
    router: &axum::Router,
    token: &str,
    file_id: i64,
    chunk_num: i64,
    data: &[u8],
) -> StatusCode {
    let hash = ChunkHash::compute(data).to_hex();
    put_chunk_with_hash(router, token, file_id, chunk_num, &hash, data).await
}

async fn put_chunk_with_hash(
    router: &axum::Router,
    token: &str,
    file_id: i64,
    chunk_num: i64,
    hash: &str,
    data: &[u8],
) -> StatusCode {
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/chunk/{file_id}/{chunk_num}/{hash}"))
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/octet-stream")
        .body(Body::from(data.to_vec()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap().status()
}

/// GET chunk bytes; returns (status, hash header, bytes).
async fn get_chunk(
    router: &axum::Router,
    token: &str,
    file_id: i64,
    chunk_num: i64,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/chunk/{file_id}/{chunk_num}"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let hash = response
        .headers()
        .get("x-chunk-hash")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, hash, body)
}

/// Register a file and return its id.
async fn register_file(
    router: &axum::Router,
    token: &str,
    name: &str,
    last_mod: i64,
    chunk_count: i64,
    file_hash: &str,
) -> i64 {
    let (status, body) = json_request(
        router,
        "POST",
        "/api/files",
        Some(json!({
            "file_name": name,
            "last_mod": last_mod,
            "chunk_count": chunk_count,
            "file_hash": file_hash,
        })),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["file_id"].as_i64().unwrap()
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = TestServer::new().await;
    server.create_user("alice", "hunter2", 10_000).await;

    // Wrong password
    let request = Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from("user=alice&password=wrong"))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Unknown user fails identically
    let request = Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from("user=nobody&password=hunter2"))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_token_grants_access() {
    let server = TestServer::new().await;
    server.create_user("alice", "hunter2", 10_000).await;

    let (status, _) = json_request(&server.router, "GET", "/api/user/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&server.router, "alice", "hunter2").await;
    let (status, body) =
        json_request(&server.router, "GET", "/api/user/stats", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quota"].as_i64(), Some(10_000));
    assert_eq!(body["allocated"].as_i64(), Some(0));
    assert_eq!(body["revision"].as_i64(), Some(0));
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let server = TestServer::new().await;
    let (status, _) = json_request(
        &server.router,
        "GET",
        "/api/files",
        None,
        Some("not-a-real-token"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_list_and_conflict() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "docs/a.txt", 1000, 3, "fh").await;
    assert!(file_id > 0);

    // Duplicate registration conflicts.
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/api/files",
        Some(json!({
            "file_name": "docs/a.txt",
            "last_mod": 2000,
            "chunk_count": 1,
            "file_hash": "other",
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"].as_str(), Some("duplicate_file"));

    let (status, body) =
        json_request(&server.router, "GET", "/api/files", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["file_name"].as_str(), Some("docs/a.txt"));
}

#[tokio::test]
async fn lookup_reports_missing_chunks() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 3, "fh").await;

    let data = vec![7u8; 100];
    assert_eq!(
        put_chunk(&server.router, &token, file_id, 1, &data).await,
        StatusCode::NO_CONTENT
    );

    let (status, body) = json_request(
        &server.router,
        "GET",
        &format!("/api/file/{file_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["missing_chunks"], json!([0, 2]));

    let (status, body) = json_request(
        &server.router,
        "GET",
        "/api/file/name?name=a.bin",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_id"].as_i64(), Some(file_id));
    assert_eq!(body["missing_chunks"], json!([0, 2]));

    let (status, _) = json_request(
        &server.router,
        "GET",
        "/api/file/name?name=unknown.bin",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chunk_roundtrip_preserves_bytes() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 1, "fh").await;

    // Payload with embedded NUL bytes; they must survive the round trip.
    let data = b"before\0middle\0\0after".to_vec();
    let expected_hash = ChunkHash::compute(&data).to_hex();
    assert_eq!(
        put_chunk(&server.router, &token, file_id, 0, &data).await,
        StatusCode::NO_CONTENT
    );

    let (status, hash, body) = get_chunk(&server.router, &token, file_id, 0).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hash.as_deref(), Some(expected_hash.as_str()));
    assert_eq!(body, data);
}

#[tokio::test]
async fn chunk_hash_mismatch_rejected() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 1, "fh").await;
    let bogus = ChunkHash::compute(b"other bytes").to_hex();
    let status =
        put_chunk_with_hash(&server.router, &token, file_id, 0, &bogus, b"real bytes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing stored, nothing charged.
    let (_, body) =
        json_request(&server.router, "GET", "/api/user/stats", None, Some(&token)).await;
    assert_eq!(body["allocated"].as_i64(), Some(0));
}

#[tokio::test]
async fn quota_exhaustion_blocks_upload() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 150).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 2, "fh").await;

    assert_eq!(
        put_chunk(&server.router, &token, file_id, 0, &[1u8; 128]).await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        put_chunk(&server.router, &token, file_id, 1, &[2u8; 128]).await,
        StatusCode::PAYLOAD_TOO_LARGE
    );

    let (_, body) =
        json_request(&server.router, "GET", "/api/user/stats", None, Some(&token)).await;
    assert_eq!(body["allocated"].as_i64(), Some(128));
    assert_eq!(body["revision"].as_i64(), Some(1));
}

#[tokio::test]
async fn users_are_isolated() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    server.create_user("mallory", "pw", 10_000).await;
    let alice = login(&server.router, "alice", "pw").await;
    let mallory = login(&server.router, "mallory", "pw").await;

    let file_id = register_file(&server.router, &alice, "secret.bin", 1, 1, "fh").await;
    let data = b"alice's data".to_vec();
    put_chunk(&server.router, &alice, file_id, 0, &data).await;

    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/api/file/{file_id}"),
        None,
        Some(&mallory),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = get_chunk(&server.router, &mallory, file_id, 0).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(
        put_chunk(&server.router, &mallory, file_id, 0, b"overwrite").await,
        StatusCode::FORBIDDEN
    );

    let (status, _) = json_request(
        &server.router,
        "DELETE",
        &format!("/api/file/{file_id}"),
        None,
        Some(&mallory),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Mallory's own namespace is unaffected: the same file name is free.
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/api/files",
        Some(json!({
            "file_name": "secret.bin",
            "last_mod": 1,
            "chunk_count": 1,
            "file_hash": "fh",
        })),
        Some(&mallory),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn delete_file_frees_allocation() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 2, "fh").await;
    put_chunk(&server.router, &token, file_id, 0, &[1u8; 128]).await;
    put_chunk(&server.router, &token, file_id, 1, &[2u8; 72]).await;

    let (_, body) =
        json_request(&server.router, "GET", "/api/user/stats", None, Some(&token)).await;
    assert_eq!(body["allocated"].as_i64(), Some(200));

    let (status, _) = json_request(
        &server.router,
        "DELETE",
        &format!("/api/file/{file_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) =
        json_request(&server.router, "GET", "/api/user/stats", None, Some(&token)).await;
    assert_eq!(body["allocated"].as_i64(), Some(0));

    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/api/file/{file_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chunk_list_returns_stored_hashes() {
    let server = TestServer::new().await;
    server.create_user("alice", "pw", 10_000).await;
    let token = login(&server.router, "alice", "pw").await;

    let file_id = register_file(&server.router, &token, "a.bin", 1, 2, "fh").await;
    let c0 = b"chunk zero".to_vec();
    let c1 = b"chunk one".to_vec();
    put_chunk(&server.router, &token, file_id, 0, &c0).await;
    put_chunk(&server.router, &token, file_id, 1, &c1).await;

    let (status, body) = json_request(
        &server.router,
        "GET",
        &format!("/api/chunk/{file_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chunks = body["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(
        chunks[0]["chunk_hash"].as_str(),
        Some(ChunkHash::compute(&c0).to_hex().as_str())
    );
    assert_eq!(
        chunks[1]["chunk_hash"].as_str(),
        Some(ChunkHash::compute(&c1).to_hex().as_str())
    );
}
