use serde::Serialize;
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub created_at: i64,
}

/// A message as returned to clients, with both ends resolved to usernames.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Email {
    pub id: i64,
    pub message_subject: String,
    pub body: String,
    pub sender_username: String,
    pub recipient_username: String,
    pub created_at: i64, // Unix milliseconds
}

#[derive(Debug, Clone)]
pub struct NewEmail {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub message_subject: String,
    pub body: String,
}

/// Half-open `[start, stop)` window over a recipient's messages in
/// chronological order. Either bound may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexRange {
    start: Option<i64>,
    stop: Option<i64>,
}

impl IndexRange {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Result<Self, AppError> {
        if start.is_some_and(|s| s < 0) || stop.is_some_and(|s| s < 0) {
            return Err(AppError::BadRequest(
                "Start and stop indices must be non-negative integers.".to_string(),
            ));
        }

        if let (Some(start), Some(stop)) = (start, stop) {
            if start > stop {
                return Err(AppError::BadRequest(
                    "Start index must not be greater than stop index.".to_string(),
                ));
            }
        }

        Ok(Self { start, stop })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> i64 {
        self.start.unwrap_or(0)
    }

    /// SQLite LIMIT value; -1 means unbounded.
    pub fn limit(&self) -> i64 {
        match self.stop {
            Some(stop) => stop - self.offset(),
            None => -1,
        }
    }
}
