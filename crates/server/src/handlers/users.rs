//! Login and user statistics handlers.

use crate::auth::{AuthenticatedUser, issue_session_token, salted_password_hash};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::{Form, Json};
use icebox_store::StoreError;
use serde::{Deserialize, Serialize};

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    pub user_id: i64,
    /// The server's chunk size; clients must chunk at this length.
    pub chunk_size: i64,
}

/// POST /api/users/login - exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = match state.store.get_user(&form.user).await {
        Ok(user) => user,
        // Unknown user and bad password fail identically.
        Err(StoreError::NotFound(_)) => {
            return Err(ApiError::Unauthorized(
                "invalid username or password".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let presented = salted_password_hash(&user.salt, &form.password);
    if presented != user.salted_hash {
        return Err(ApiError::Unauthorized(
            "invalid username or password".to_string(),
        ));
    }

    let token = issue_session_token(&state, user.user_id).await?;
    tracing::info!(user = %user.name, "login");

    Ok(Json(LoginResponse {
        token,
        user_id: user.user_id,
        chunk_size: state.store.chunk_size(),
    }))
}

/// Quota and accounting counters for the caller.
#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub quota: i64,
    pub allocated: i64,
    pub revision: i64,
}

/// GET /api/user/stats - quota, allocation, and revision for the caller.
pub async fn user_stats(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> ApiResult<Json<UserStatsResponse>> {
    let quota = state.store.get_user_quota(auth.user_id).await?;
    let info = state.store.get_user_info(auth.user_id).await?;
    Ok(Json(UserStatsResponse {
        quota,
        allocated: info.allocated,
        revision: info.revision,
    }))
}
