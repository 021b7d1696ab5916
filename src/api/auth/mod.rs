//! Authentication endpoints: login, logout and the current user

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::management::users::UserResponse;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};

pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    debug!(username = %request.username, "Login attempt");

    let user = state
        .services
        .users
        .authenticate(&request.username, &request.password)
        .await?;

    let issued = state.jwt.generate(&user)?;
    let expires_at = issued
        .claims
        .expires_at()
        .ok_or_else(|| ApiError::internal("Token expiration out of range"))?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at,
        user: UserResponse::from(&user),
    }))
}

/// POST /auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(_user: RequireUser) -> StatusCode {
    StatusCode::OK
}

/// GET /auth/me
pub async fn get_current_user(RequireUser(user): RequireUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
