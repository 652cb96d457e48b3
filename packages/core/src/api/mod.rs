//! HTTP surface of the care coordinator.
//!
//! [`create_router`] assembles every route over one shared [`AppState`].
//! Handlers authenticate through the [`Caller`] extractor and answer with
//! the [`ApiResponse`] envelope.

pub mod auth;
pub mod caller;
pub mod dashboard;
pub mod envelope;
pub mod health;
pub mod logs;
pub mod materials;
pub mod monitor;
pub mod patients;
pub mod pmos;
pub mod users;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::AuthKeys;
use crate::cache::ResponseCache;
use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::models::{Patient, Role};
use crate::monitor::TreatmentMonitor;
use crate::repository::TbRepository;

pub use caller::Caller;
pub use dashboard::DashboardSummary;
pub use envelope::{ApiResponse, Page};

/// Dashboard summaries keyed by nurse id; `None` is the clinic-wide view.
pub type DashboardCache = ResponseCache<Option<String>, DashboardSummary>;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub repo: Arc<TbRepository>,
    pub monitor: Arc<TreatmentMonitor>,
    pub metrics: Arc<AppMetrics>,
    pub auth: Arc<AuthKeys>,
    pub dashboard_cache: Mutex<DashboardCache>,
}

impl AppState {
    pub fn new(
        repo: Arc<TbRepository>,
        monitor: Arc<TreatmentMonitor>,
        metrics: Arc<AppMetrics>,
        auth: Arc<AuthKeys>,
        dashboard_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            monitor,
            metrics,
            auth,
            dashboard_cache: Mutex::new(ResponseCache::new(dashboard_ttl)),
        }
    }

    /// Forget cached dashboard numbers after treatment clocks moved.
    pub async fn invalidate_dashboard(&self) {
        self.dashboard_cache.lock().await.invalidate_all();
    }

    pub(crate) async fn require_patient(&self, id: &str) -> Result<Patient, AppError> {
        self.repo
            .find_patient(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))
    }

    /// Staff see every patient; a PMO only the patient they supervise.
    pub(crate) async fn ensure_patient_access(
        &self,
        caller: &Caller,
        patient_id: &str,
    ) -> Result<(), AppError> {
        match caller.role {
            Role::Admin | Role::Nurse => Ok(()),
            Role::Pmo => {
                if self.repo.pmo_supervises(&caller.user_id, patient_id).await? {
                    Ok(())
                } else {
                    Err(AppError::Forbidden(
                        "You do not supervise this patient".to_string(),
                    ))
                }
            }
        }
    }
}

/// Build the full application router.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/nurses", get(users::list_nurses))
        .route(
            "/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route("/patients/qr/:uuid", get(patients::find_by_qr))
        .route(
            "/patients/:id",
            get(patients::get_patient)
                .patch(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route(
            "/patients/:id/restart-treatment",
            post(patients::restart_treatment),
        )
        .route("/patients/:id/lapse", get(patients::lapse_status))
        .route(
            "/patients/:id/logs",
            get(logs::list_logs).post(logs::create_log),
        )
        .route(
            "/logs/:id",
            axum::routing::patch(logs::update_log).delete(logs::delete_log),
        )
        .route("/pmos", get(pmos::list_pmos).post(pmos::create_pmo))
        .route(
            "/pmos/:id",
            get(pmos::get_pmo)
                .patch(pmos::update_pmo)
                .delete(pmos::delete_pmo),
        )
        .route(
            "/materials",
            get(materials::list_materials).post(materials::create_material),
        )
        .route(
            "/materials/:id",
            get(materials::get_material)
                .patch(materials::update_material)
                .delete(materials::delete_material),
        )
        .route("/dashboard/summary", get(dashboard::summary))
        .route("/monitor/sweep", post(monitor::trigger_sweep))
        .layer(middleware::from_fn_with_state(state.clone(), track_http))
        .layer(cors)
        .with_state(state)
}

/// Count and time every request, labelled by its route template.
async fn track_http(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    state
        .metrics
        .http_requests_total
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();
    state
        .metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());

    response
}

/// Trim optional text; blank becomes `None`.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim required text, rejecting blanks with a validation error naming `field`.
pub(crate) fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
