use axum::{extract::State, Json};

use super::{ApiResponse, Caller, SharedState};
use crate::error::AppError;
use crate::models::Role;
use crate::monitor::SweepReport;

/// `POST /monitor/sweep` - run a lapse sweep now instead of waiting for
/// the scheduler. Waits if a scheduled sweep is already in progress.
pub async fn trigger_sweep(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<ApiResponse<SweepReport>>, AppError> {
    caller.require(&[Role::Admin])?;
    tracing::info!("Manual lapse sweep requested by {}", caller.user_id);

    let report = match state.monitor.sweep().await {
        Ok(report) => report,
        Err(err) => {
            state.metrics.record_sweep_error();
            return Err(err.into());
        }
    };
    state.metrics.record_sweep(&report);
    if report.reset_count > 0 {
        state.invalidate_dashboard().await;
    }

    Ok(Json(ApiResponse::ok(report.message.clone(), report)))
}
