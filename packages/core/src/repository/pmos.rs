use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{new_id, TbRepository};
use crate::db::{format_timestamp, parse_timestamp};
use crate::models::Pmo;

#[derive(Debug, Clone, Default)]
pub struct NewPmo {
    pub patient_id: String,
    pub user_id: String,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub address: Option<String>,
}

const PMO_COLUMNS: &str =
    "id, patient_id, user_id, phone, relationship, address, created_at, updated_at";

fn pmo_from_row(row: &SqliteRow) -> Result<Pmo, sqlx::Error> {
    Ok(Pmo {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        user_id: row.try_get("user_id")?,
        phone: row.try_get("phone")?,
        relationship: row.try_get("relationship")?,
        address: row.try_get("address")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl TbRepository {
    pub async fn insert_pmo(&self, new: &NewPmo) -> Result<Pmo, sqlx::Error> {
        let id = new_id();
        let now = format_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO pmos
             (id, patient_id, user_id, phone, relationship, address, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.patient_id)
        .bind(&new.user_id)
        .bind(&new.phone)
        .bind(&new.relationship)
        .bind(&new.address)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_pmo(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_pmo(&self, id: &str) -> Result<Option<Pmo>, sqlx::Error> {
        let sql = format!("SELECT {} FROM pmos WHERE id = ?", PMO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pmo_from_row).transpose()
    }

    /// The PMO record owned by a user account, if any.
    pub async fn find_pmo_by_user(&self, user_id: &str) -> Result<Option<Pmo>, sqlx::Error> {
        let sql = format!("SELECT {} FROM pmos WHERE user_id = ?", PMO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pmo_from_row).transpose()
    }

    pub async fn list_pmos(&self, patient_id: Option<&str>) -> Result<Vec<Pmo>, sqlx::Error> {
        let rows = match patient_id {
            Some(patient_id) => {
                let sql = format!(
                    "SELECT {} FROM pmos WHERE patient_id = ? ORDER BY created_at ASC",
                    PMO_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(patient_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {} FROM pmos ORDER BY created_at ASC", PMO_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(pmo_from_row).collect()
    }

    /// `true` if `user_id` is the PMO assigned to `patient_id`.
    pub async fn pmo_supervises(
        &self,
        user_id: &str,
        patient_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM pmos WHERE user_id = ? AND patient_id = ?",
        )
        .bind(user_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("cnt")?;
        Ok(count > 0)
    }

    pub async fn save_pmo(&self, pmo: &Pmo) -> Result<bool, sqlx::Error> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE pmos
             SET patient_id = ?, phone = ?, relationship = ?, address = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&pmo.patient_id)
        .bind(&pmo.phone)
        .bind(&pmo.relationship)
        .bind(&pmo.address)
        .bind(&now)
        .bind(&pmo.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_pmo(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pmos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_pmos(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM pmos")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("cnt")
    }
}
