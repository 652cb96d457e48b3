use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{new_id, optional_timestamp, TbRepository};
use crate::db::{format_timestamp, parse_timestamp};
use crate::models::DailyMonitoringLog;

#[derive(Debug, Clone)]
pub struct NewLog {
    pub patient_id: String,
    pub taken_at: DateTime<Utc>,
    pub description: String,
}

const LOG_COLUMNS: &str = "id, patient_id, taken_at, description, created_at, updated_at";

fn log_from_row(row: &SqliteRow) -> Result<DailyMonitoringLog, sqlx::Error> {
    Ok(DailyMonitoringLog {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        taken_at: parse_timestamp(&row.try_get::<String, _>("taken_at")?)?,
        description: row.try_get("description")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl TbRepository {
    pub async fn insert_log(&self, new: &NewLog) -> Result<DailyMonitoringLog, sqlx::Error> {
        let id = new_id();
        let now = format_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO daily_monitoring_logs
             (id, patient_id, taken_at, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.patient_id)
        .bind(format_timestamp(new.taken_at))
        .bind(&new.description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_log(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_log(&self, id: &str) -> Result<Option<DailyMonitoringLog>, sqlx::Error> {
        let sql = format!("SELECT {} FROM daily_monitoring_logs WHERE id = ?", LOG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(log_from_row).transpose()
    }

    /// Logs for one patient, newest intake first. `limit` is clamped to 500.
    pub async fn list_logs_for_patient(
        &self,
        patient_id: &str,
        limit: i64,
    ) -> Result<Vec<DailyMonitoringLog>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM daily_monitoring_logs
             WHERE patient_id = ?
             ORDER BY taken_at DESC
             LIMIT ?",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id)
            .bind(limit.clamp(1, 500))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(log_from_row).collect()
    }

    pub async fn save_log(&self, log: &DailyMonitoringLog) -> Result<bool, sqlx::Error> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE daily_monitoring_logs
             SET taken_at = ?, description = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(format_timestamp(log.taken_at))
        .bind(&log.description)
        .bind(&now)
        .bind(&log.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_log(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM daily_monitoring_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Intake time of the most recent log for a patient, if any.
    pub async fn latest_log_at(
        &self,
        patient_id: &str,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT MAX(taken_at) AS latest FROM daily_monitoring_logs WHERE patient_id = ?",
        )
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;

        optional_timestamp(row.try_get("latest")?)
    }

    /// Logs taken at or after `since`, optionally only for one nurse's patients.
    pub async fn count_logs_since(
        &self,
        since: DateTime<Utc>,
        nurse_id: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM daily_monitoring_logs
             WHERE taken_at >= ?
               AND (? IS NULL OR patient_id IN (SELECT id FROM patients WHERE nurse_id = ?))",
        )
        .bind(format_timestamp(since))
        .bind(nurse_id)
        .bind(nurse_id)
        .fetch_one(&self.pool)
        .await?;

        row.try_get("cnt")
    }
}
