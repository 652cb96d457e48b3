//! Patient registry plus the treatment-clock endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clean, required, ApiResponse, Caller, Page, SharedState};
use crate::error::AppError;
use crate::models::{Patient, Role};
use crate::monitor::LapseStatus;
use crate::repository::{NewPatient, PatientFilter, PatientSort, SortOrder};

const DEFAULT_PER_PAGE: i64 = 15;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub nurse_id: Option<String>,
    pub sort: Option<PatientSort>,
    pub order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PatientQuery {
    fn into_filter(self, caller: &Caller) -> PatientFilter {
        PatientFilter {
            search: clean(self.search),
            status: clean(self.status),
            nurse_id: clean(self.nurse_id),
            pmo_user_id: (caller.role == Role::Pmo).then(|| caller.user_id.clone()),
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            page: self.page.unwrap_or(1).max(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub nik: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub start_treatment_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub nurse_id: Option<String>,
}

/// Partial update. An empty string clears an optional text field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub nik: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub start_treatment_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub nurse_id: Option<String>,
}

/// A patient plus derived treatment progress.
#[derive(Debug, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    pub under_treatment: bool,
    pub treatment_days: Option<i64>,
}

impl PatientView {
    fn new(patient: Patient, now: DateTime<Utc>) -> Self {
        Self {
            under_treatment: patient.is_under_treatment(),
            treatment_days: patient.treatment_days(now),
            patient,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub patient_id: String,
    pub start_treatment_date: DateTime<Utc>,
}

/// Reject a `nurse_id` that does not belong to a nurse account.
async fn validate_nurse(state: &SharedState, nurse_id: &str) -> Result<(), AppError> {
    match state.repo.find_user(nurse_id).await? {
        Some(user) if user.role == Role::Nurse => Ok(()),
        Some(_) => Err(AppError::Validation(format!("User {} is not a nurse", nurse_id))),
        None => Err(AppError::Validation(format!("Nurse {} does not exist", nurse_id))),
    }
}

fn validate_status(status: Option<String>) -> Option<String> {
    clean(status).map(|s| s.to_lowercase())
}

/// `GET /patients`
pub async fn list_patients(
    State(state): State<SharedState>,
    caller: Caller,
    Query(query): Query<PatientQuery>,
) -> Result<Json<ApiResponse<Page<PatientView>>>, AppError> {
    let filter = query.into_filter(&caller);
    let (patients, total) = state.repo.list_patients(&filter).await?;
    let now = state.monitor.now();

    let page = Page {
        items: patients
            .into_iter()
            .map(|p| PatientView::new(p, now))
            .collect(),
        total,
        page: filter.page,
        per_page: filter.per_page,
    };
    Ok(Json(ApiResponse::ok("Patients retrieved", page)))
}

/// `POST /patients`
///
/// A nurse registering a patient without naming a nurse becomes the
/// patient's nurse.
pub async fn create_patient(
    State(state): State<SharedState>,
    caller: Caller,
    Json(body): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PatientView>>), AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;

    let nurse_id = match clean(body.nurse_id) {
        Some(id) => Some(id),
        None if caller.role == Role::Nurse => Some(caller.user_id.clone()),
        None => None,
    };
    if let Some(nurse_id) = nurse_id.as_deref() {
        validate_nurse(&state, nurse_id).await?;
    }

    let new = NewPatient {
        name: required("name", &body.name)?,
        nik: clean(body.nik),
        gender: clean(body.gender),
        date_of_birth: body.date_of_birth,
        address: clean(body.address),
        phone: clean(body.phone),
        start_treatment_date: body.start_treatment_date,
        status: validate_status(body.status),
        nurse_id,
    };
    let patient = state.repo.insert_patient(&new).await?;
    state.invalidate_dashboard().await;

    tracing::info!("Patient {} registered by {}", patient.id, caller.user_id);
    let view = PatientView::new(patient, state.monitor.now());
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Patient created", view))))
}

/// `GET /patients/:id`
pub async fn get_patient(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PatientView>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let patient = state.require_patient(&id).await?;
    Ok(Json(ApiResponse::ok(
        "Patient retrieved",
        PatientView::new(patient, state.monitor.now()),
    )))
}

/// `GET /patients/qr/:uuid` - resolve a scanned patient card.
pub async fn find_by_qr(
    State(state): State<SharedState>,
    _caller: Caller,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<PatientView>>, AppError> {
    let id = Uuid::parse_str(code.trim())
        .map_err(|_| AppError::Validation("QR code is not a patient identifier".to_string()))?;
    let patient = state.require_patient(&id.to_string()).await?;
    Ok(Json(ApiResponse::ok(
        "Patient found",
        PatientView::new(patient, state.monitor.now()),
    )))
}

/// `PATCH /patients/:id`
pub async fn update_patient(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdatePatientRequest>,
) -> Result<Json<ApiResponse<PatientView>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let mut patient = state.require_patient(&id).await?;

    if let Some(name) = body.name {
        patient.name = required("name", &name)?;
    }
    if body.nik.is_some() {
        patient.nik = clean(body.nik);
    }
    if body.gender.is_some() {
        patient.gender = clean(body.gender);
    }
    if body.date_of_birth.is_some() {
        patient.date_of_birth = body.date_of_birth;
    }
    if body.address.is_some() {
        patient.address = clean(body.address);
    }
    if body.phone.is_some() {
        patient.phone = clean(body.phone);
    }
    if body.status.is_some() {
        patient.status = validate_status(body.status)
            .ok_or_else(|| AppError::Validation("status cannot be blank".to_string()))?;
    }
    if body.nurse_id.is_some() {
        patient.nurse_id = clean(body.nurse_id);
        if let Some(nurse_id) = patient.nurse_id.as_deref() {
            validate_nurse(&state, nurse_id).await?;
        }
    }

    if !state.repo.save_patient(&patient).await? {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }
    if let Some(start) = body.start_treatment_date {
        state.repo.set_start_treatment_date(&id, start).await?;
    }
    state.invalidate_dashboard().await;

    let patient = state.require_patient(&id).await?;
    Ok(Json(ApiResponse::ok(
        "Patient updated",
        PatientView::new(patient, state.monitor.now()),
    )))
}

/// `DELETE /patients/:id` - cascades to logs and PMO assignments.
pub async fn delete_patient(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    caller.require(&[Role::Admin])?;
    if !state.repo.delete_patient(&id).await? {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }
    state.invalidate_dashboard().await;

    tracing::info!("Patient {} deleted by {}", id, caller.user_id);
    Ok(Json(ApiResponse::ok("Patient deleted", ())))
}

/// `POST /patients/:id/restart-treatment`
pub async fn restart_treatment(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<RestartResponse>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let at = state.monitor.restart_treatment(&id).await?;
    state.invalidate_dashboard().await;

    Ok(Json(ApiResponse::ok(
        "Treatment restarted",
        RestartResponse {
            patient_id: id,
            start_treatment_date: at,
        },
    )))
}

/// `GET /patients/:id/lapse` - read-only; never moves the clock.
pub async fn lapse_status(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LapseStatus>>, AppError> {
    state.ensure_patient_access(&caller, &id).await?;
    let status = state.monitor.lapse_status(&id).await?;
    let message = if status.lapsed {
        "Treatment has lapsed"
    } else {
        "Treatment is on schedule"
    };
    Ok(Json(ApiResponse::ok(message, status)))
}
