//! Domain records for the care-coordination backend.
//!
//! These are the shapes the repository reads and writes and the API layer
//! serialises. Request bodies live next to the handlers that accept them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Patient statuses that mean "under active treatment".
pub const ACTIVE_STATUSES: &[&str] = &["aktif", "active"];

/// Status assigned to new patients when none is given.
pub const DEFAULT_PATIENT_STATUS: &str = "aktif";

/// Canonical stored form of a status: trimmed and lowercased. The
/// repository writes statuses in this form so SQL comparisons agree with
/// [`is_active_status`].
pub fn normalize_status(status: &str) -> String {
    status.trim().to_lowercase()
}

/// `true` if a free-text patient status means the patient is under treatment.
pub fn is_active_status(status: &str) -> bool {
    ACTIVE_STATUSES.contains(&normalize_status(status).as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Nurse,
    Pmo,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Nurse => "nurse",
            Role::Pmo => "pmo",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "nurse" => Ok(Role::Nurse),
            "pmo" => Ok(Role::Pmo),
            other => Err(format!(
                "Invalid role '{}'. Must be one of: admin, nurse, pmo",
                other
            )),
        }
    }
}

/// An account. The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// UUID; doubles as the QR-code identifier.
    pub id: String,
    pub name: String,
    pub nik: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// When the treatment clock began. `None` means treatment has not started.
    pub start_treatment_date: Option<DateTime<Utc>>,
    pub status: String,
    pub nurse_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn is_under_treatment(&self) -> bool {
        is_active_status(&self.status) && self.start_treatment_date.is_some()
    }

    /// Whole days elapsed on the treatment clock at `now`.
    pub fn treatment_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.start_treatment_date
            .map(|start| (now - start).num_days().max(0))
    }
}

/// One reported medication intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMonitoringLog {
    pub id: String,
    pub patient_id: String,
    pub taken_at: DateTime<Utc>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A treatment supervisor ("Pengawas Minum Obat").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pmo {
    pub id: String,
    pub patient_id: String,
    pub user_id: String,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationalMaterial {
    pub id: String,
    pub title: String,
    pub content: String,
    pub file_url: Option<String>,
    pub video_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
