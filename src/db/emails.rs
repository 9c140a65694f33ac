use sqlx::SqliteConnection;
use crate::db::models::{Email, IndexRange, NewEmail};
use crate::error::AppError;

const SELECT_EMAIL: &str = r#"
SELECT e.id, e.message_subject, e.body,
       s.username AS sender_username,
       r.username AS recipient_username,
       e.created_at
FROM email e
JOIN user s ON e.sender_id = s.id
JOIN user r ON e.recipient_id = r.id
"#;

pub struct EmailRepository;

impl EmailRepository {
    pub async fn create(
        conn: &mut SqliteConnection,
        email: &NewEmail,
    ) -> Result<Email, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let id = sqlx::query(
            r#"
INSERT INTO email (sender_id, recipient_id, message_subject, body, created_at)
VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(email.sender_id)
        .bind(email.recipient_id)
        .bind(&email.message_subject)
        .bind(&email.body)
        .bind(created_at)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        // Fetch with usernames joined
        let email = Self::get_by_id(conn, id).await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created email".to_string()))?;

        Ok(email)
    }

    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<Email>, AppError> {
        let sql = format!("{SELECT_EMAIL} WHERE e.id = ?");

        let email = sqlx::query_as::<_, Email>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(email)
    }

    /// Messages addressed to `recipient_username`, oldest first, narrowed to `range`.
    pub async fn list_for_recipient(
        conn: &mut SqliteConnection,
        recipient_username: &str,
        range: IndexRange,
    ) -> Result<Vec<Email>, AppError> {
        let sql = format!(
            "{SELECT_EMAIL} WHERE r.username = ? ORDER BY e.created_at ASC, e.id ASC LIMIT ? OFFSET ?"
        );

        let emails = sqlx::query_as::<_, Email>(&sql)
            .bind(recipient_username)
            .bind(range.limit())
            .bind(range.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok(emails)
    }

    /// Returns `false` when no email had that id.
    pub async fn delete(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM email WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
