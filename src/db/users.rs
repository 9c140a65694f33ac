use sqlx::SqliteConnection;
use crate::db::models::User;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        username: &str,
        password_hash: &[u8; 32],
        password_salt: &[u8; 32],
    ) -> Result<User, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO user (username, password_hash, password_salt, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash.as_slice())
        .bind(password_salt.as_slice())
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Username already exists.".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(user)
    }

    pub async fn get_by_username(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM user WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    pub async fn exists(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM user WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(found.is_some())
    }
}
