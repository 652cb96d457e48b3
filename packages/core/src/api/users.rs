//! Account administration. Everything here except `/nurses` is admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{clean, required, ApiResponse, Caller, SharedState};
use crate::auth::{hash_password, MIN_PASSWORD_LENGTH};
use crate::error::AppError;
use crate::models::{Role, User};
use crate::repository::NewUser;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = required("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation(format!("'{}' is not a valid email address", email))),
    }
}

fn hash_new_password(password: &str) -> Result<String, AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    hash_password(password).map_err(|err| AppError::Internal(err.to_string()))
}

async fn require_user(state: &SharedState, id: &str) -> Result<User, AppError> {
    state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// `GET /users?role=`
pub async fn list_users(
    State(state): State<SharedState>,
    caller: Caller,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    caller.require(&[Role::Admin])?;
    let users = state.repo.list_users(query.role).await?;
    Ok(Json(ApiResponse::ok("Users retrieved", users)))
}

/// `GET /nurses` - used to pick a nurse when registering a patient.
pub async fn list_nurses(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let nurses = state.repo.list_users(Some(Role::Nurse)).await?;
    Ok(Json(ApiResponse::ok("Nurses retrieved", nurses)))
}

/// `POST /users`
pub async fn create_user(
    State(state): State<SharedState>,
    caller: Caller,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    caller.require(&[Role::Admin])?;

    let new = NewUser {
        name: required("name", &body.name)?,
        email: validate_email(&body.email)?,
        password_hash: hash_new_password(&body.password)?,
        role: body.role,
    };
    let user = state.repo.insert_user(&new).await?;

    tracing::info!("Admin {} created {} account {}", caller.user_id, user.role, user.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("User created", user))))
}

/// `GET /users/:id`
pub async fn get_user(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    caller.require(&[Role::Admin])?;
    let user = require_user(&state, &id).await?;
    Ok(Json(ApiResponse::ok("User retrieved", user)))
}

/// `PATCH /users/:id`
pub async fn update_user(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    caller.require(&[Role::Admin])?;
    let mut user = require_user(&state, &id).await?;

    if let Some(name) = body.name {
        user.name = required("name", &name)?;
    }
    if let Some(email) = body.email {
        user.email = validate_email(&email)?;
    }
    if let Some(role) = body.role {
        if user.id == caller.user_id && role != Role::Admin {
            return Err(AppError::Validation(
                "You cannot remove your own admin role".to_string(),
            ));
        }
        user.role = role;
    }
    let password_hash = match clean(body.password) {
        Some(password) => Some(hash_new_password(&password)?),
        None => None,
    };

    if !state.repo.save_user(&user, password_hash.as_deref()).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    let user = require_user(&state, &id).await?;
    Ok(Json(ApiResponse::ok("User updated", user)))
}

/// `DELETE /users/:id`
pub async fn delete_user(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    caller.require(&[Role::Admin])?;
    if id == caller.user_id {
        return Err(AppError::Validation("You cannot delete your own account".to_string()));
    }
    if !state.repo.delete_user(&id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Admin {} deleted user {}", caller.user_id, id);
    Ok(Json(ApiResponse::ok("User deleted", ())))
}
