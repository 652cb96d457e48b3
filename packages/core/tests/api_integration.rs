//! Integration tests for the HTTP API.
//!
//! Each test boots the full Axum router (same assembly as `main.rs`) over an
//! in-memory SQLite database and drives it with `tower::ServiceExt::oneshot`;
//! no live server is needed.
//!
//! The treatment monitor runs on a `ManualClock` so lapse decisions happen at
//! fixed instants. Tokens are minted directly with `AuthKeys` to keep password
//! hashing out of every test; the login tests hash for real.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tb_care_coordinator::{
    api::{self, AppState},
    auth::{hash_password, AuthKeys},
    db,
    metrics::AppMetrics,
    models::{Role, User},
    monitor::{Clock, ManualClock, MonitorConfig, TreatmentMonitor},
    repository::{NewLog, NewPatient, NewPmo, NewUser, TbRepository},
};

const SECRET: &str = "integration-test-secret";

// ---- Helpers ----------------------------------------------------------------

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

struct TestApp {
    app: Router,
    repo: Arc<TbRepository>,
    clock: Arc<ManualClock>,
    keys: AuthKeys,
}

/// Build the complete router with a 72 hour grace period.
async fn build_test_app() -> TestApp {
    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    let repo = Arc::new(TbRepository::new(pool));
    let clock = Arc::new(ManualClock::new(fixed_now()));

    let monitor = Arc::new(TreatmentMonitor::new(
        repo.clone(),
        clock.clone(),
        MonitorConfig::with_grace_hours(72),
    ));
    let state = Arc::new(AppState::new(
        repo.clone(),
        monitor,
        Arc::new(AppMetrics::new().unwrap()),
        Arc::new(AuthKeys::new(SECRET, 24)),
        StdDuration::from_secs(30),
    ));

    TestApp {
        app: api::create_router(state),
        repo,
        clock,
        keys: AuthKeys::new(SECRET, 24),
    }
}

impl TestApp {
    /// Insert an account and return it with a valid bearer token.
    async fn user(&self, email: &str, role: Role) -> (User, String) {
        let user = self
            .repo
            .insert_user(&NewUser {
                name: format!("User {}", email),
                email: email.to_string(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .unwrap();
        let token = self.keys.issue(&user, Utc::now()).unwrap();
        (user, token)
    }

    async fn patient(&self, name: &str, start: Option<DateTime<Utc>>) -> String {
        self.repo
            .insert_patient(&NewPatient {
                name: name.to_string(),
                start_treatment_date: start,
                ..NewPatient::default()
            })
            .await
            .unwrap()
            .id
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn start_date(&self, patient_id: &str) -> Option<DateTime<Utc>> {
        self.repo
            .find_patient(patient_id)
            .await
            .unwrap()
            .unwrap()
            .start_treatment_date
    }
}

fn parse_time(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|| panic!("not a timestamp: {}", value))
}

// ---- Public endpoints ------------------------------------------------------

#[tokio::test]
async fn health_returns_200_with_ok_body() {
    let t = build_test_app().await;
    let resp = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn metrics_counts_requests_by_route_template() {
    let t = build_test_app().await;
    let (_, token) = t.user("admin@clinic.id", Role::Admin).await;
    let id = t.patient("Siti", None).await;
    t.get(&format!("/patients/{}", id), &token).await;

    let resp = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("tb_care_http_requests_total"));
    assert!(text.contains("path=\"/patients/:id\""));
    assert!(text.contains("tb_care_sweeps_total"));
}

// ---- Auth -------------------------------------------------------------------

#[tokio::test]
async fn login_issues_token_that_authenticates_me() {
    let t = build_test_app().await;
    t.repo
        .insert_user(&NewUser {
            name: "Nurse Ani".into(),
            email: "ani@clinic.id".into(),
            password_hash: hash_password("correct horse").unwrap(),
            role: Role::Nurse,
        })
        .await
        .unwrap();

    let (status, json) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "ANI@clinic.id", "password": "correct horse"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["role"], "nurse");
    assert!(json["data"]["user"].get("password_hash").is_none());
    let token = json["data"]["token"].as_str().unwrap().to_string();

    let (status, json) = t.get("/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "ani@clinic.id");
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let t = build_test_app().await;
    t.repo
        .insert_user(&NewUser {
            name: "Admin".into(),
            email: "admin@clinic.id".into(),
            password_hash: hash_password("right-password").unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let (status, json) = t
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "admin@clinic.id", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn missing_or_forged_token_is_401() {
    let t = build_test_app().await;

    let (status, json) = t.call(Method::GET, "/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (user, _) = t.user("nurse@clinic.id", Role::Nurse).await;
    let forged = AuthKeys::new("some-other-secret-value", 24)
        .issue(&user, Utc::now())
        .unwrap();
    let (status, _) = t.get("/patients", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn nurse_cannot_manage_users() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;

    let (status, json) = t.get("/users", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);

    let (status, json) = t.get("/nurses", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_creates_user_and_duplicate_email_conflicts() {
    let t = build_test_app().await;
    let (_, token) = t.user("admin@clinic.id", Role::Admin).await;
    let body = json!({
        "name": "Budi",
        "email": "budi@clinic.id",
        "password": "a-long-password",
        "role": "pmo"
    });

    let (status, json) = t.post("/users", &token, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["role"], "pmo");

    let (status, _) = t.post("/users", &token, body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .post(
            "/users",
            &token,
            json!({"name": "X", "email": "x@clinic.id", "password": "short", "role": "nurse"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---- Patients ---------------------------------------------------------------

#[tokio::test]
async fn nurse_registers_patient_as_their_own() {
    let t = build_test_app().await;
    let (nurse, token) = t.user("nurse@clinic.id", Role::Nurse).await;

    let (status, json) = t
        .post(
            "/patients",
            &token,
            json!({
                "name": "Siti Aminah",
                "nik": "3201010101010001",
                "start_treatment_date": (fixed_now() - Duration::days(10)).to_rfc3339()
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["nurse_id"], nurse.id.as_str());
    assert_eq!(json["data"]["status"], "aktif");
    assert_eq!(json["data"]["under_treatment"], true);
    assert_eq!(json["data"]["treatment_days"], 10);
}

#[tokio::test]
async fn patient_with_non_nurse_assignee_is_rejected() {
    let t = build_test_app().await;
    let (admin, token) = t.user("admin@clinic.id", Role::Admin).await;

    let (status, _) = t
        .post("/patients", &token, json!({"name": "Siti", "nurse_id": admin.id}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = t.post("/patients", &token, json!({"name": "  "})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn patient_listing_filters_sorts_and_pages() {
    let t = build_test_app().await;
    let (_, token) = t.user("admin@clinic.id", Role::Admin).await;
    for name in ["Citra", "Ahmad", "Budi", "Ayu"] {
        t.patient(name, Some(fixed_now())).await;
    }

    let (status, json) = t.get("/patients?sort=name&order=asc&per_page=2", &token).await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["total"], 4);
    assert_eq!(data["per_page"], 2);
    assert_eq!(data["items"][0]["name"], "Ahmad");
    assert_eq!(data["items"][1]["name"], "Ayu");

    let (_, json) = t
        .get("/patients?sort=name&order=asc&per_page=2&page=2", &token)
        .await;
    assert_eq!(json["data"]["items"][0]["name"], "Budi");

    let (_, json) = t.get("/patients?search=ay", &token).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["name"], "Ayu");

    let (_, json) = t.get("/patients?per_page=1000", &token).await;
    assert_eq!(json["data"]["per_page"], 100);
}

#[tokio::test]
async fn pmo_sees_only_supervised_patient() {
    let t = build_test_app().await;
    let (pmo_user, pmo_token) = t.user("pmo@family.id", Role::Pmo).await;
    let mine = t.patient("Mine", Some(fixed_now())).await;
    let other = t.patient("Other", Some(fixed_now())).await;
    t.repo
        .insert_pmo(&NewPmo {
            patient_id: mine.clone(),
            user_id: pmo_user.id.clone(),
            ..NewPmo::default()
        })
        .await
        .unwrap();

    let (status, json) = t.get("/patients", &pmo_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], mine.as_str());

    let (status, _) = t.get(&format!("/patients/{}/lapse", other), &pmo_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.get(&format!("/patients/{}/lapse", mine), &pmo_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn qr_lookup_resolves_patient_uuid() {
    let t = build_test_app().await;
    let (_, token) = t.user("pmo@family.id", Role::Pmo).await;
    let id = t.patient("Siti", None).await;

    let (status, json) = t.get(&format!("/patients/qr/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Siti");

    let (status, _) = t.get("/patients/qr/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = t
        .get("/patients/qr/00000000-0000-4000-8000-000000000000", &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_keeps_treatment_clock_unless_given() {
    let t = build_test_app().await;
    let (_, token) = t.user("admin@clinic.id", Role::Admin).await;
    let start = fixed_now() - Duration::days(4);
    let id = t.patient("Siti", Some(start)).await;

    let (status, json) = t
        .call(
            Method::PATCH,
            &format!("/patients/{}", id),
            Some(&token),
            Some(json!({"phone": "0812", "status": "Selesai"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["phone"], "0812");
    assert_eq!(json["data"]["status"], "selesai");
    assert_eq!(json["data"]["under_treatment"], false);
    assert_eq!(t.start_date(&id).await, Some(start));
}

#[tokio::test]
async fn deleting_patient_is_admin_only() {
    let t = build_test_app().await;
    let (_, nurse_token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let (_, admin_token) = t.user("admin@clinic.id", Role::Admin).await;
    let id = t.patient("Siti", None).await;
    let uri = format!("/patients/{}", id);

    let (status, _) = t.call(Method::DELETE, &uri, Some(&nurse_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call(Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.get(&uri, &admin_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---- Treatment clock --------------------------------------------------------

#[tokio::test]
async fn lapse_status_reports_without_resetting() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let start = fixed_now() - Duration::days(10);
    let id = t.patient("Siti", Some(start)).await;

    let (status, json) = t.get(&format!("/patients/{}/lapse", id), &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["lapsed"], true);
    assert_eq!(parse_time(&json["data"]["deadline"]), start + Duration::days(3));
    assert_eq!(t.start_date(&id).await, Some(start));
}

#[tokio::test]
async fn report_after_lapse_restarts_clock_without_sweep() {
    let t = build_test_app().await;
    let (pmo_user, pmo_token) = t.user("pmo@family.id", Role::Pmo).await;
    let start = fixed_now() - Duration::days(10);
    let id = t.patient("Siti", Some(start)).await;
    t.repo
        .insert_pmo(&NewPmo {
            patient_id: id.clone(),
            user_id: pmo_user.id.clone(),
            ..NewPmo::default()
        })
        .await
        .unwrap();

    let (status, json) = t
        .post(
            &format!("/patients/{}/logs", id),
            &pmo_token,
            json!({"description": "Obat diminum pagi"}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parse_time(&json["data"]["log"]["taken_at"]), fixed_now());
    assert_eq!(json["data"]["check"]["under_treatment"], true);
    assert_eq!(parse_time(&json["data"]["check"]["reference_time"]), start);
    assert_eq!(parse_time(&json["data"]["check"]["reset_to"]), fixed_now());

    let (_, json) = t.get(&format!("/patients/{}/lapse", id), &pmo_token).await;
    assert_eq!(json["data"]["lapsed"], false);
    assert_eq!(t.start_date(&id).await, Some(fixed_now()));
}

#[tokio::test]
async fn report_within_grace_keeps_start_date() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let start = fixed_now() - Duration::days(1);
    let id = t.patient("Siti", Some(start)).await;

    let (status, json) = t
        .post(&format!("/patients/{}/logs", id), &token, json!({}))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["data"]["check"]["reset_to"].is_null());
    assert_eq!(t.start_date(&id).await, Some(start));
}

#[tokio::test]
async fn backdated_log_for_lapsed_patient_restarts_clock() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let id = t.patient("Siti", Some(fixed_now() - Duration::days(20))).await;

    let (status, json) = t
        .post(
            &format!("/patients/{}/logs", id),
            &token,
            json!({"taken_at": (fixed_now() - Duration::days(5)).to_rfc3339()}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parse_time(&json["data"]["check"]["reset_to"]), fixed_now());
    assert_eq!(t.start_date(&id).await, Some(fixed_now()));
}

#[tokio::test]
async fn future_log_is_rejected() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let id = t.patient("Siti", Some(fixed_now())).await;

    let (status, _) = t
        .post(
            &format!("/patients/{}/logs", id),
            &token,
            json!({"taken_at": (fixed_now() + Duration::hours(2)).to_rfc3339()}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(t.repo.latest_log_at(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn pmo_cannot_log_for_unsupervised_patient() {
    let t = build_test_app().await;
    let (_, pmo_token) = t.user("pmo@family.id", Role::Pmo).await;
    let id = t.patient("Siti", Some(fixed_now())).await;

    let (status, _) = t
        .post(&format!("/patients/{}/logs", id), &pmo_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn nurse_cannot_edit_logs_but_owning_pmo_can() {
    let t = build_test_app().await;
    let (_, nurse_token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let (pmo_user, pmo_token) = t.user("pmo@family.id", Role::Pmo).await;
    let id = t.patient("Siti", Some(fixed_now())).await;
    t.repo
        .insert_pmo(&NewPmo {
            patient_id: id.clone(),
            user_id: pmo_user.id.clone(),
            ..NewPmo::default()
        })
        .await
        .unwrap();
    let log = t
        .repo
        .insert_log(&NewLog {
            patient_id: id.clone(),
            taken_at: fixed_now() - Duration::hours(1),
            description: "pagi".into(),
        })
        .await
        .unwrap();
    let uri = format!("/logs/{}", log.id);

    let (status, _) = t
        .call(Method::PATCH, &uri, Some(&nurse_token), Some(json!({"description": "x"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t
        .call(Method::PATCH, &uri, Some(&pmo_token), Some(json!({"description": "sore"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["description"], "sore");

    let (status, _) = t.call(Method::DELETE, &uri, Some(&pmo_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn manual_restart_moves_clock_to_now() {
    let t = build_test_app().await;
    let (_, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let id = t.patient("Siti", Some(fixed_now() - Duration::days(1))).await;

    let (status, json) = t
        .post(&format!("/patients/{}/restart-treatment", id), &token, json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_time(&json["data"]["start_treatment_date"]), fixed_now());
    assert_eq!(t.start_date(&id).await, Some(fixed_now()));

    let (status, _) = t
        .post("/patients/missing/restart-treatment", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_sweep_resets_only_lapsed_patients_once() {
    let t = build_test_app().await;
    let (_, admin_token) = t.user("admin@clinic.id", Role::Admin).await;
    let (_, nurse_token) = t.user("nurse@clinic.id", Role::Nurse).await;

    let stale = t.patient("Stale", Some(fixed_now() - Duration::days(30))).await;
    let recent = t.patient("Recent", Some(fixed_now() - Duration::days(30))).await;
    t.repo
        .insert_log(&NewLog {
            patient_id: recent.clone(),
            taken_at: fixed_now() - Duration::days(1),
            description: String::new(),
        })
        .await
        .unwrap();

    let (status, _) = t.post("/monitor/sweep", &nurse_token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t.post("/monitor/sweep", &admin_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reset_count"], 1);
    assert_eq!(json["data"]["evaluated"], 2);
    assert_eq!(json["data"]["reset_patient_ids"][0], stale.as_str());
    assert_eq!(t.start_date(&stale).await, Some(fixed_now()));
    assert_eq!(t.start_date(&recent).await, Some(fixed_now() - Duration::days(30)));

    t.clock.advance(Duration::minutes(1));
    let (_, json) = t.post("/monitor/sweep", &admin_token, json!({})).await;
    assert_eq!(json["data"]["reset_count"], 0);
    assert_eq!(json["success"], true);
}

// ---- PMOs and materials -----------------------------------------------------

#[tokio::test]
async fn pmo_assignment_requires_pmo_account() {
    let t = build_test_app().await;
    let (nurse, token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let (pmo_user, _) = t.user("pmo@family.id", Role::Pmo).await;
    let id = t.patient("Siti", None).await;

    let (status, _) = t
        .post("/pmos", &token, json!({"patient_id": id, "user_id": nurse.id}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = t
        .post(
            "/pmos",
            &token,
            json!({"patient_id": id, "user_id": pmo_user.id, "relationship": "Anak"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["relationship"], "Anak");

    let (status, _) = t
        .post("/pmos", &token, json!({"patient_id": id, "user_id": pmo_user.id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn materials_need_exactly_one_media_reference() {
    let t = build_test_app().await;
    let (_, nurse_token) = t.user("nurse@clinic.id", Role::Nurse).await;
    let (_, pmo_token) = t.user("pmo@family.id", Role::Pmo).await;

    let (status, _) = t
        .post(
            "/materials",
            &nurse_token,
            json!({"title": "TB 101", "content": "Basics"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = t
        .post(
            "/materials",
            &nurse_token,
            json!({"title": "TB 101", "content": "Basics", "video_link": "https://video.example/tb"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = t
        .post(
            "/materials",
            &pmo_token,
            json!({"title": "x", "content": "y", "file_url": "https://cdn.example/x.pdf"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t.get(&format!("/materials/{}", id), &pmo_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["title"], "TB 101");
}

// ---- Dashboard --------------------------------------------------------------

#[tokio::test]
async fn dashboard_counts_lapsed_patients_and_is_invalidated_by_restart() {
    let t = build_test_app().await;
    let (_, token) = t.user("admin@clinic.id", Role::Admin).await;
    let lapsed = t.patient("Lapsed", Some(fixed_now() - Duration::days(5))).await;
    t.patient("OnTrack", Some(fixed_now() - Duration::days(1))).await;
    t.patient("NotStarted", None).await;

    let (status, json) = t.get("/dashboard/summary", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_patients"], 3);
    assert_eq!(json["data"]["active_patients"], 2);
    assert_eq!(json["data"]["lapsed_patients"], 1);

    t.post(&format!("/patients/{}/restart-treatment", lapsed), &token, json!({}))
        .await;

    let (_, json) = t.get("/dashboard/summary", &token).await;
    assert_eq!(json["data"]["lapsed_patients"], 0);
    assert_eq!(parse_time(&json["data"]["generated_at"]), t.clock.now());
}

#[tokio::test]
async fn dashboard_is_staff_only() {
    let t = build_test_app().await;
    let (_, token) = t.user("pmo@family.id", Role::Pmo).await;
    let (status, _) = t.get("/dashboard/summary", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
