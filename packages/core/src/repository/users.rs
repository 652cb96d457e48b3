use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{new_id, TbRepository};
use crate::db::{format_timestamp, parse_timestamp};
use crate::models::{Role, User};

/// Fields for a new account. The hash is produced by [`crate::auth`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let role = role
        .parse::<Role>()
        .map_err(|msg| sqlx::Error::Decode(msg.into()))?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

impl TbRepository {
    pub async fn insert_user(&self, new: &NewUser) -> Result<User, sqlx::Error> {
        let id = new_id();
        let now = format_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.email.trim().to_lowercase())
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_user(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_user(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Look up an account and its password hash for login.
    pub async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, sqlx::Error> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE email = ?",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let user = user_from_row(&row)?;
                let hash: String = row.try_get("password_hash")?;
                Ok(Some((user, hash)))
            }
            None => Ok(None),
        }
    }

    /// List accounts, optionally restricted to one role, oldest first.
    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, sqlx::Error> {
        let rows = match role {
            Some(role) => {
                let sql = format!(
                    "SELECT {} FROM users WHERE role = ? ORDER BY created_at ASC",
                    USER_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(role.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {} FROM users ORDER BY created_at ASC", USER_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(user_from_row).collect()
    }

    /// Write back the mutable fields of `user`. A new password hash is only
    /// stored when given. Returns `false` if the id does not exist.
    pub async fn save_user(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            "UPDATE users
             SET name = ?, email = ?, role = ?,
                 password_hash = COALESCE(?, password_hash),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(user.email.trim().to_lowercase())
        .bind(user.role.as_str())
        .bind(password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users(&self, role: Role) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;

        row.try_get("cnt")
    }
}

#[cfg(test)]
mod tests {
    use crate::models::Role;
    use crate::repository::test_support::{make_repo, seed_user};

    #[tokio::test]
    async fn insert_normalises_email_and_finds_by_id() {
        let repo = make_repo().await;
        let user = seed_user(&repo, " Nurse@Example.COM ", Role::Nurse).await;

        assert_eq!(user.email, "nurse@example.com");
        let found = repo.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(found.role, Role::Nurse);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let repo = make_repo().await;
        seed_user(&repo, "dup@example.com", Role::Admin).await;

        let err = repo
            .insert_user(&crate::repository::NewUser {
                name: "Other".into(),
                email: "DUP@example.com".into(),
                password_hash: "x".into(),
                role: Role::Pmo,
            })
            .await
            .unwrap_err();

        let db_err = err.as_database_error().expect("database error");
        assert!(db_err.is_unique_violation());
    }

    #[tokio::test]
    async fn credentials_lookup_returns_hash() {
        let repo = make_repo().await;
        seed_user(&repo, "pmo@example.com", Role::Pmo).await;

        let (user, hash) = repo
            .find_credentials("PMO@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::Pmo);
        assert_eq!(hash, "not-a-real-hash");
        assert!(repo.find_credentials("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_users_filters_by_role() {
        let repo = make_repo().await;
        seed_user(&repo, "a@example.com", Role::Admin).await;
        seed_user(&repo, "n1@example.com", Role::Nurse).await;
        seed_user(&repo, "n2@example.com", Role::Nurse).await;

        assert_eq!(repo.list_users(None).await.unwrap().len(), 3);
        assert_eq!(repo.list_users(Some(Role::Nurse)).await.unwrap().len(), 2);
        assert_eq!(repo.count_users(Role::Nurse).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn save_user_keeps_password_when_not_given() {
        let repo = make_repo().await;
        let mut user = seed_user(&repo, "keep@example.com", Role::Nurse).await;
        user.name = "Renamed".into();

        assert!(repo.save_user(&user, None).await.unwrap());

        let (found, hash) = repo.find_credentials("keep@example.com").await.unwrap().unwrap();
        assert_eq!(found.name, "Renamed");
        assert_eq!(hash, "not-a-real-hash");
    }

    #[tokio::test]
    async fn delete_user_reports_missing_id() {
        let repo = make_repo().await;
        let user = seed_user(&repo, "gone@example.com", Role::Admin).await;

        assert!(repo.delete_user(&user.id).await.unwrap());
        assert!(!repo.delete_user(&user.id).await.unwrap());
    }
}
