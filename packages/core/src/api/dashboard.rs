//! Staff dashboard numbers.
//!
//! Admins get clinic-wide counts; a nurse gets counts for their own
//! caseload. Results are cached per scope for a short TTL and dropped
//! whenever treatment clocks move.

use axum::{extract::State, Json};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, Caller, SharedState};
use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// `None` for the clinic-wide view.
    pub nurse_id: Option<String>,
    pub total_patients: i64,
    pub active_patients: i64,
    pub lapsed_patients: i64,
    pub total_nurses: i64,
    pub total_pmos: i64,
    pub total_materials: i64,
    pub logs_today: i64,
    pub generated_at: DateTime<Utc>,
}

/// `GET /dashboard/summary`
pub async fn summary(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<ApiResponse<DashboardSummary>>, AppError> {
    caller.require(&[Role::Admin, Role::Nurse])?;
    let scope = (caller.role == Role::Nurse).then(|| caller.user_id.clone());

    if let Some(cached) = state.dashboard_cache.lock().await.get(&scope) {
        return Ok(Json(ApiResponse::ok("Dashboard summary", cached)));
    }

    let summary = build_summary(&state, scope.as_deref()).await?;
    state
        .dashboard_cache
        .lock()
        .await
        .set(scope, summary.clone());

    Ok(Json(ApiResponse::ok("Dashboard summary", summary)))
}

async fn build_summary(
    state: &SharedState,
    nurse_id: Option<&str>,
) -> Result<DashboardSummary, AppError> {
    let repo = &state.repo;
    let now = state.monitor.now();
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now);

    let mut lapsed_patients = 0;
    for patient in repo.list_active_patients().await? {
        if nurse_id.is_some() && patient.nurse_id.as_deref() != nurse_id {
            continue;
        }
        if state.monitor.lapse_status(&patient.id).await?.lapsed {
            lapsed_patients += 1;
        }
    }

    Ok(DashboardSummary {
        nurse_id: nurse_id.map(str::to_string),
        total_patients: repo.count_patients(nurse_id).await?,
        active_patients: repo.count_active_patients(nurse_id).await?,
        lapsed_patients,
        total_nurses: repo.count_users(Role::Nurse).await?,
        total_pmos: repo.count_pmos().await?,
        total_materials: repo.count_materials().await?,
        logs_today: repo.count_logs_since(start_of_day, nurse_id).await?,
        generated_at: now,
    })
}
