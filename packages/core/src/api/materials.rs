//! Educational materials. Each one references either an uploaded file or
//! a video link, never both.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{clean, required, ApiResponse, Caller, SharedState};
use crate::error::AppError;
use crate::models::{EducationalMaterial, Role};
use crate::repository::NewMaterial;

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    pub title: String,
    pub content: String,
    pub file_url: Option<String>,
    pub video_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub video_link: Option<String>,
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

/// Returns the cleaned `(file_url, video_link)` pair if exactly one is set.
fn validate_media(
    file_url: Option<String>,
    video_link: Option<String>,
) -> Result<(Option<String>, Option<String>), AppError> {
    let file_url = clean(file_url);
    let video_link = clean(video_link);

    match (&file_url, &video_link) {
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Provide either file_url or video_link, not both".to_string(),
        )),
        (None, None) => Err(AppError::Validation(
            "Either file_url or video_link is required".to_string(),
        )),
        (Some(url), None) | (None, Some(url)) if !is_http_url(url) => Err(AppError::Validation(
            format!("'{}' is not an http(s) URL", url),
        )),
        _ => Ok((file_url, video_link)),
    }
}

async fn require_material(state: &SharedState, id: &str) -> Result<EducationalMaterial, AppError> {
    state
        .repo
        .find_material(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".to_string()))
}

/// `GET /materials`
pub async fn list_materials(
    State(state): State<SharedState>,
    _caller: Caller,
) -> Result<Json<ApiResponse<Vec<EducationalMaterial>>>, AppError> {
    let materials = state.repo.list_materials().await?;
    Ok(Json(ApiResponse::ok("Materials retrieved", materials)))
}

/// `GET /materials/:id`
pub async fn get_material(
    State(state): State<SharedState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<EducationalMaterial>>, AppError> {
    let material = require_material(&state, &id).await?;
    Ok(Json(ApiResponse::ok("Material retrieved", material)))
}

/// `POST /materials`
pub async fn create_material(
    State(state): State<SharedState>,
    caller: Caller,
    Json(body): Json<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EducationalMaterial>>), AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;

    let (file_url, video_link) = validate_media(body.file_url, body.video_link)?;
    let material = state
        .repo
        .insert_material(&NewMaterial {
            title: required("title", &body.title)?,
            content: required("content", &body.content)?,
            file_url,
            video_link,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Material created", material))))
}

/// `PATCH /materials/:id`
///
/// Sending one media field replaces the other, so a file can be swapped
/// for a video in a single request.
pub async fn update_material(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdateMaterialRequest>,
) -> Result<Json<ApiResponse<EducationalMaterial>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let mut material = require_material(&state, &id).await?;

    if let Some(title) = body.title {
        material.title = required("title", &title)?;
    }
    if let Some(content) = body.content {
        material.content = required("content", &content)?;
    }
    if body.file_url.is_some() || body.video_link.is_some() {
        let (file_url, video_link) = validate_media(body.file_url, body.video_link)?;
        material.file_url = file_url;
        material.video_link = video_link;
    }

    if !state.repo.save_material(&material).await? {
        return Err(AppError::NotFound("Material not found".to_string()));
    }
    let material = require_material(&state, &id).await?;
    Ok(Json(ApiResponse::ok("Material updated", material)))
}

/// `DELETE /materials/:id`
pub async fn delete_material(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    if !state.repo.delete_material(&id).await? {
        return Err(AppError::NotFound("Material not found".to_string()));
    }
    Ok(Json(ApiResponse::ok("Material deleted", ())))
}
