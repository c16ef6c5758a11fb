//! Authentication: password salting, token issuance, and the middleware
//! that resolves bearer tokens to users.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::Instrument;

/// Authenticated request extension: the caller the token resolved to.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub name: String,
}

/// Generate a random per-user salt (16 bytes, hex-encoded).
pub fn generate_salt() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Combine a salt and password into the stored credential hash.
pub fn salted_password_hash(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Generate a random bearer token secret using cryptographically secure RNG.
pub fn generate_token_secret() -> String {
    use base64::Engine;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token for storage lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Issue a new session token for a user and persist its hash.
pub async fn issue_session_token(state: &AppState, user_id: i64) -> ApiResult<String> {
    let secret = generate_token_secret();
    let expires_at = OffsetDateTime::now_utc() + Duration::seconds(state.config.token_ttl_secs);
    state
        .store
        .insert_session_token(&hash_token(&secret), user_id, expires_at)
        .await?;
    Ok(secret)
}

/// Extract bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Authentication middleware: resolves a bearer token to its user and
/// attaches the identity as a request extension. Requests without a valid
/// token pass through unauthenticated; handlers decide whether to require
/// identity.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut user_field = String::from("-");

    if let Some(token) = extract_bearer_token(&req) {
        let token_hash = hash_token(token);
        if let Some(user) = state.store.get_session_user(&token_hash).await? {
            user_field = user.name.clone();
            req.extensions_mut().insert(AuthenticatedUser {
                user_id: user.user_id,
                name: user.name,
            });
        }
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", user = %user_field))
        .await;
    Ok(response)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}
