//! Database repository for the care-coordination records.
//!
//! All SQLite read/write logic lives here, split by table. Handlers hold an
//! `Arc<TbRepository>`; the treatment monitor reaches the same repository
//! through the [`PatientStore`](crate::monitor::PatientStore) trait.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (see
//! [`crate::db::format_timestamp`]) so `ORDER BY` and `MAX()` on text
//! columns are chronological.

mod logs;
mod materials;
mod patients;
mod pmos;
mod users;

use sqlx::SqlitePool;
use uuid::Uuid;

pub use logs::NewLog;
pub use materials::NewMaterial;
pub use patients::{NewPatient, PatientFilter, PatientSort, SortOrder};
pub use pmos::NewPmo;
pub use users::NewUser;

/// Repository for reading and writing care records to SQLite.
pub struct TbRepository {
    pool: SqlitePool,
}

impl TbRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Decode an optional timestamp column.
fn optional_timestamp(
    raw: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, sqlx::Error> {
    raw.as_deref().map(crate::db::parse_timestamp).transpose()
}
