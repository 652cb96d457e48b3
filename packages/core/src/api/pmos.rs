//! Treatment supervisor (PMO) assignments. Staff-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{clean, required, ApiResponse, Caller, SharedState};
use crate::error::AppError;
use crate::models::{Pmo, Role};
use crate::repository::NewPmo;

const STAFF: &[Role] = &[Role::Admin, Role::Nurse];

#[derive(Debug, Default, Deserialize)]
pub struct PmoQuery {
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePmoRequest {
    pub patient_id: String,
    /// Must be an account with the `pmo` role.
    pub user_id: String,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePmoRequest {
    pub patient_id: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub address: Option<String>,
}

async fn require_pmo(state: &SharedState, id: &str) -> Result<Pmo, AppError> {
    state
        .repo
        .find_pmo(id)
        .await?
        .ok_or_else(|| AppError::NotFound("PMO not found".to_string()))
}

async fn require_existing_patient(state: &SharedState, patient_id: &str) -> Result<(), AppError> {
    if state.repo.find_patient(patient_id).await?.is_none() {
        return Err(AppError::Validation(format!("Patient {} does not exist", patient_id)));
    }
    Ok(())
}

/// `GET /pmos?patient_id=`
pub async fn list_pmos(
    State(state): State<SharedState>,
    caller: Caller,
    Query(query): Query<PmoQuery>,
) -> Result<Json<ApiResponse<Vec<Pmo>>>, AppError> {
    caller.require(STAFF)?;
    let pmos = state.repo.list_pmos(clean(query.patient_id).as_deref()).await?;
    Ok(Json(ApiResponse::ok("PMOs retrieved", pmos)))
}

/// `POST /pmos`
pub async fn create_pmo(
    State(state): State<SharedState>,
    caller: Caller,
    Json(body): Json<CreatePmoRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Pmo>>), AppError> {
    caller.require(STAFF)?;

    let patient_id = required("patient_id", &body.patient_id)?;
    let user_id = required("user_id", &body.user_id)?;
    require_existing_patient(&state, &patient_id).await?;
    match state.repo.find_user(&user_id).await? {
        Some(user) if user.role == Role::Pmo => {}
        Some(_) => {
            return Err(AppError::Validation(format!(
                "User {} does not have the pmo role",
                user_id
            )))
        }
        None => return Err(AppError::Validation(format!("User {} does not exist", user_id))),
    }
    if state.repo.find_pmo_by_user(&user_id).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "User {} already supervises a patient",
            user_id
        )));
    }

    let pmo = state
        .repo
        .insert_pmo(&NewPmo {
            patient_id,
            user_id,
            phone: clean(body.phone),
            relationship: clean(body.relationship),
            address: clean(body.address),
        })
        .await?;

    tracing::info!("PMO {} assigned to patient {}", pmo.user_id, pmo.patient_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("PMO created", pmo))))
}

/// `GET /pmos/:id`
pub async fn get_pmo(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Pmo>>, AppError> {
    caller.require(STAFF)?;
    let pmo = require_pmo(&state, &id).await?;
    Ok(Json(ApiResponse::ok("PMO retrieved", pmo)))
}

/// `PATCH /pmos/:id`
pub async fn update_pmo(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdatePmoRequest>,
) -> Result<Json<ApiResponse<Pmo>>, AppError> {
    caller.require(STAFF)?;
    let mut pmo = require_pmo(&state, &id).await?;

    if let Some(patient_id) = body.patient_id {
        let patient_id = required("patient_id", &patient_id)?;
        require_existing_patient(&state, &patient_id).await?;
        pmo.patient_id = patient_id;
    }
    if body.phone.is_some() {
        pmo.phone = clean(body.phone);
    }
    if body.relationship.is_some() {
        pmo.relationship = clean(body.relationship);
    }
    if body.address.is_some() {
        pmo.address = clean(body.address);
    }

    if !state.repo.save_pmo(&pmo).await? {
        return Err(AppError::NotFound("PMO not found".to_string()));
    }
    let pmo = require_pmo(&state, &id).await?;
    Ok(Json(ApiResponse::ok("PMO updated", pmo)))
}

/// `DELETE /pmos/:id` - removes the assignment, not the user account.
pub async fn delete_pmo(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    caller.require(STAFF)?;
    if !state.repo.delete_pmo(&id).await? {
        return Err(AppError::NotFound("PMO not found".to_string()));
    }
    Ok(Json(ApiResponse::ok("PMO deleted", ())))
}
