use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{new_id, TbRepository};
use crate::db::{format_timestamp, parse_timestamp};
use crate::models::EducationalMaterial;

#[derive(Debug, Clone, Default)]
pub struct NewMaterial {
    pub title: String,
    pub content: String,
    pub file_url: Option<String>,
    pub video_link: Option<String>,
}

const MATERIAL_COLUMNS: &str = "id, title, content, file_url, video_link, created_at, updated_at";

fn material_from_row(row: &SqliteRow) -> Result<EducationalMaterial, sqlx::Error> {
    Ok(EducationalMaterial {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        file_url: row.try_get("file_url")?,
        video_link: row.try_get("video_link")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl TbRepository {
    pub async fn insert_material(
        &self,
        new: &NewMaterial,
    ) -> Result<EducationalMaterial, sqlx::Error> {
        let id = new_id();
        let now = format_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO educational_materials
             (id, title, content, file_url, video_link, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.file_url)
        .bind(&new.video_link)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_material(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_material(
        &self,
        id: &str,
    ) -> Result<Option<EducationalMaterial>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM educational_materials WHERE id = ?",
            MATERIAL_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(material_from_row).transpose()
    }

    /// Newest first.
    pub async fn list_materials(&self) -> Result<Vec<EducationalMaterial>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM educational_materials ORDER BY created_at DESC",
            MATERIAL_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(material_from_row).collect()
    }

    pub async fn save_material(&self, material: &EducationalMaterial) -> Result<bool, sqlx::Error> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE educational_materials
             SET title = ?, content = ?, file_url = ?, video_link = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&material.title)
        .bind(&material.content)
        .bind(&material.file_url)
        .bind(&material.video_link)
        .bind(&now)
        .bind(&material.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_material(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM educational_materials WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_materials(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM educational_materials")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("cnt")
    }
}
