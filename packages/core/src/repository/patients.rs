use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{new_id, optional_timestamp, TbRepository};
use crate::db::{format_timestamp, parse_timestamp};
use crate::models::{normalize_status, Patient, DEFAULT_PATIENT_STATUS};

/// SQL predicate matching patients under active treatment. Mirrors
/// [`Patient::is_under_treatment`] for statuses stored through
/// [`normalize_status`].
const ACTIVE_PREDICATE: &str =
    "LOWER(TRIM(status)) IN ('aktif', 'active') AND start_treatment_date IS NOT NULL";

const PATIENT_COLUMNS: &str = "id, name, nik, gender, date_of_birth, address, phone, \
     start_treatment_date, status, nurse_id, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct NewPatient {
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

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientSort {
    Name,
    StartTreatmentDate,
    #[default]
    CreatedAt,
}

impl PatientSort {
    fn column(&self) -> &'static str {
        match self {
            PatientSort::Name => "name",
            PatientSort::StartTreatmentDate => "start_treatment_date",
            PatientSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, sort and page parameters for listing patients.
#[derive(Debug, Clone)]
pub struct PatientFilter {
    /// Case-insensitive substring match on name or NIK.
    pub search: Option<String>,
    pub status: Option<String>,
    pub nurse_id: Option<String>,
    /// Restrict to patients supervised by this PMO account.
    pub pmo_user_id: Option<String>,
    pub sort: PatientSort,
    pub order: SortOrder,
    /// 1-based.
    pub page: i64,
    pub per_page: i64,
}

impl Default for PatientFilter {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            nurse_id: None,
            pmo_user_id: None,
            sort: PatientSort::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: 15,
        }
    }
}

impl PatientFilter {
    /// Build the WHERE clause and its bind values, in bind order.
    fn conditions(&self) -> (String, Vec<String>) {
        let mut conditions = vec!["1=1".to_string()];
        let mut binds = Vec::new();

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("(LOWER(name) LIKE ? OR LOWER(COALESCE(nik, '')) LIKE ?)".to_string());
            let like = format!("%{}%", search.to_lowercase());
            binds.push(like.clone());
            binds.push(like);
        }
        if let Some(status) = self.status.as_deref() {
            conditions.push("LOWER(TRIM(status)) = ?".to_string());
            binds.push(status.trim().to_lowercase());
        }
        if let Some(nurse_id) = self.nurse_id.as_deref() {
            conditions.push("nurse_id = ?".to_string());
            binds.push(nurse_id.to_string());
        }
        if let Some(user_id) = self.pmo_user_id.as_deref() {
            conditions.push("id IN (SELECT patient_id FROM pmos WHERE user_id = ?)".to_string());
            binds.push(user_id.to_string());
        }

        (conditions.join(" AND "), binds)
    }
}

fn patient_from_row(row: &SqliteRow) -> Result<Patient, sqlx::Error> {
    let date_of_birth: Option<String> = row.try_get("date_of_birth")?;
    let date_of_birth = date_of_birth
        .as_deref()
        .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .transpose()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        nik: row.try_get("nik")?,
        gender: row.try_get("gender")?,
        date_of_birth,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        start_treatment_date: optional_timestamp(row.try_get("start_treatment_date")?)?,
        status: row.try_get("status")?,
        nurse_id: row.try_get("nurse_id")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl TbRepository {
    pub async fn insert_patient(&self, new: &NewPatient) -> Result<Patient, sqlx::Error> {
        let id = new_id();
        let now = format_timestamp(Utc::now());
        let status = new
            .status
            .as_deref()
            .map(normalize_status)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PATIENT_STATUS.to_string());

        sqlx::query(
            "INSERT INTO patients
             (id, name, nik, gender, date_of_birth, address, phone,
              start_treatment_date, status, nurse_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.nik)
        .bind(&new.gender)
        .bind(new.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&new.address)
        .bind(&new.phone)
        .bind(new.start_treatment_date.map(format_timestamp))
        .bind(&status)
        .bind(&new.nurse_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_patient(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Fetch one patient by id. The id is also the QR-code payload.
    pub async fn find_patient(&self, id: &str) -> Result<Option<Patient>, sqlx::Error> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    /// One page of patients matching `filter`, plus the total match count.
    pub async fn list_patients(
        &self,
        filter: &PatientFilter,
    ) -> Result<(Vec<Patient>, i64), sqlx::Error> {
        let (where_clause, binds) = filter.conditions();
        let per_page = filter.per_page.clamp(1, 100);
        let offset = (filter.page.max(1) - 1) * per_page;

        let sql = format!(
            "SELECT {} FROM patients WHERE {} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            PATIENT_COLUMNS,
            where_clause,
            filter.sort.column(),
            filter.order.keyword(),
        );
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM patients WHERE {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for value in &binds {
            count_query = count_query.bind(value);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get("cnt")?;

        let patients = rows
            .iter()
            .map(patient_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((patients, total))
    }

    /// Write back every mutable field of `patient` except the treatment
    /// clock, which only moves through [`Self::set_start_treatment_date`].
    pub async fn save_patient(&self, patient: &Patient) -> Result<bool, sqlx::Error> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE patients
             SET name = ?, nik = ?, gender = ?, date_of_birth = ?, address = ?,
                 phone = ?, status = ?, nurse_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&patient.name)
        .bind(&patient.nik)
        .bind(&patient.gender)
        .bind(patient.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&patient.address)
        .bind(&patient.phone)
        .bind(normalize_status(&patient.status))
        .bind(&patient.nurse_id)
        .bind(&now)
        .bind(&patient.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_patient(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All patients under active treatment, oldest clock first.
    pub async fn list_active_patients(&self) -> Result<Vec<Patient>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM patients WHERE {} ORDER BY start_treatment_date ASC",
            PATIENT_COLUMNS, ACTIVE_PREDICATE
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(patient_from_row).collect()
    }

    /// Move the treatment clock. Returns `false` if the patient is gone.
    pub async fn set_start_treatment_date(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let at = format_timestamp(at);

        let result = sqlx::query(
            "UPDATE patients SET start_treatment_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&at)
        .bind(&at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count patients, optionally only those assigned to one nurse.
    pub async fn count_patients(&self, nurse_id: Option<&str>) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM patients WHERE (? IS NULL OR nurse_id = ?)",
        )
        .bind(nurse_id)
        .bind(nurse_id)
        .fetch_one(&self.pool)
        .await?;
        row.try_get("cnt")
    }

    pub async fn count_active_patients(&self, nurse_id: Option<&str>) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM patients WHERE {} AND (? IS NULL OR nurse_id = ?)",
            ACTIVE_PREDICATE
        );
        let row = sqlx::query(&sql)
            .bind(nurse_id)
            .bind(nurse_id)
            .fetch_one(&self.pool)
            .await?;
        row.try_get("cnt")
    }
}
