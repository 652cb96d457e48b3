//! Login and identity endpoints.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ApiResponse, Caller, SharedState};
use crate::auth::verify_password;
use crate::error::AppError;
use crate::models::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub user: User,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<SharedState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let (user, password_hash) = state
        .repo
        .find_credentials(&body.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&body.password, &password_hash) {
        tracing::debug!("Failed login for {}", user.email);
        return Err(invalid());
    }

    // Token expiry is checked against wall-clock time, so issue on it too.
    let token = state
        .auth
        .issue(&user, Utc::now())
        .map_err(|err| AppError::Internal(err.to_string()))?;

    tracing::info!("User {} logged in as {}", user.id, user.role);
    Ok(Json(ApiResponse::ok(
        "Login successful",
        LoginResponse {
            token,
            token_type: "Bearer",
            user,
        },
    )))
}

/// `GET /auth/me`
pub async fn me(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state
        .repo
        .find_user(&caller.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(ApiResponse::ok("Current user", user)))
}
