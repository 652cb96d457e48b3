//! Daily medication logs.
//!
//! Storing a log re-runs the lapse check for that patient straight away.
//! The check looks at the patient's last intake before this log, so a
//! patient who reports after the grace period gets a fresh treatment clock
//! without waiting for the next scheduled sweep.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, Caller, SharedState};
use crate::error::AppError;
use crate::models::{DailyMonitoringLog, Role};
use crate::monitor::CheckOutcome;
use crate::repository::NewLog;

const DEFAULT_LOG_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLogRequest {
    /// Defaults to the time the request is handled.
    pub taken_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLogRequest {
    pub taken_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedLog {
    pub log: DailyMonitoringLog,
    /// `None` when the post-insert lapse check could not run.
    pub check: Option<CheckOutcome>,
}

/// Admins may touch any log; a PMO only logs of the patient they supervise.
async fn ensure_log_owner(
    state: &SharedState,
    caller: &Caller,
    log: &DailyMonitoringLog,
) -> Result<(), AppError> {
    caller.require(&[Role::Admin, Role::Pmo])?;
    state.ensure_patient_access(caller, &log.patient_id).await
}

async fn require_log(state: &SharedState, id: &str) -> Result<DailyMonitoringLog, AppError> {
    state
        .repo
        .find_log(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Log not found".to_string()))
}

fn reject_future(taken_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppError> {
    if taken_at > now {
        return Err(AppError::Validation(
            "taken_at cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

/// `GET /patients/:id/logs?limit=`
pub async fn list_logs(
    State(state): State<SharedState>,
    caller: Caller,
    Path(patient_id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<Vec<DailyMonitoringLog>>>, AppError> {
    state.ensure_patient_access(&caller, &patient_id).await?;
    state.require_patient(&patient_id).await?;

    let logs = state
        .repo
        .list_logs_for_patient(&patient_id, query.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .await?;
    Ok(Json(ApiResponse::ok("Logs retrieved", logs)))
}

/// `POST /patients/:id/logs`
pub async fn create_log(
    State(state): State<SharedState>,
    caller: Caller,
    Path(patient_id): Path<String>,
    Json(body): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedLog>>), AppError> {
    state.ensure_patient_access(&caller, &patient_id).await?;
    state.require_patient(&patient_id).await?;

    let now = state.monitor.now();
    let taken_at = body.taken_at.unwrap_or(now);
    reject_future(taken_at, now)?;
    let prior_last_log_at = state.monitor.latest_log_at(&patient_id).await?;

    let log = state
        .repo
        .insert_log(&NewLog {
            patient_id: patient_id.clone(),
            taken_at,
            description: body.description.unwrap_or_default().trim().to_string(),
        })
        .await?;

    // The log is already stored; a failed check leaves it in place and the
    // next sweep picks the patient up.
    let check = match state
        .monitor
        .check_patient(&patient_id, prior_last_log_at)
        .await
    {
        Ok(outcome) => {
            if outcome.reset_to.is_some() {
                state.invalidate_dashboard().await;
            }
            Some(outcome)
        }
        Err(err) => {
            tracing::error!("Lapse check after log {} failed: {}", log.id, err);
            None
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Log recorded", CreatedLog { log, check })),
    ))
}

/// `PATCH /logs/:id`
pub async fn update_log(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdateLogRequest>,
) -> Result<Json<ApiResponse<DailyMonitoringLog>>, AppError> {
    let mut log = require_log(&state, &id).await?;
    ensure_log_owner(&state, &caller, &log).await?;

    if let Some(taken_at) = body.taken_at {
        reject_future(taken_at, state.monitor.now())?;
        log.taken_at = taken_at;
    }
    if let Some(description) = body.description {
        log.description = description.trim().to_string();
    }

    if !state.repo.save_log(&log).await? {
        return Err(AppError::NotFound("Log not found".to_string()));
    }
    let log = require_log(&state, &id).await?;
    Ok(Json(ApiResponse::ok("Log updated", log)))
}

/// `DELETE /logs/:id`
pub async fn delete_log(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let log = require_log(&state, &id).await?;
    ensure_log_owner(&state, &caller, &log).await?;

    if !state.repo.delete_log(&id).await? {
        return Err(AppError::NotFound("Log not found".to_string()));
    }
    Ok(Json(ApiResponse::ok("Log deleted", ())))
}
