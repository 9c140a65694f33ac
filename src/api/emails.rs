use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::Connection;

use crate::api::state::DbConn;
use crate::db::{Email, EmailRepository, IndexRange, NewEmail, UserRepository};
use crate::error::AppError;

const MAX_SUBJECT_LEN: usize = 255;
const MAX_BODY_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub message_subject: Option<String>,
    pub body: Option<String>,
    pub sender_username: Option<String>,
    pub recipient_username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub id: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct FetchEmailsQuery {
    pub recipient_username: Option<String>,
    // Kept as text so non-numeric input gets a JSON error instead of a rejection
    pub start: Option<String>,
    pub stop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEmailRequest {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteEmailResponse {
    pub message: String,
}

struct ValidEmail {
    message_subject: String,
    body: String,
    sender_username: String,
    recipient_username: String,
}

fn validate_email(req: SendEmailRequest) -> Result<ValidEmail, AppError> {
    let (Some(message_subject), Some(body), Some(sender_username), Some(recipient_username)) = (
        req.message_subject.filter(|s| !s.is_empty()),
        req.body.filter(|s| !s.is_empty()),
        req.sender_username.filter(|s| !s.is_empty()),
        req.recipient_username.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::BadRequest("All fields must be provided".to_string()));
    };

    if message_subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(AppError::BadRequest(
            "Subject cannot exceed 255 characters.".to_string(),
        ));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(AppError::BadRequest(
            "Body cannot exceed 5000 characters.".to_string(),
        ));
    }

    Ok(ValidEmail {
        message_subject,
        body,
        sender_username,
        recipient_username,
    })
}

fn parse_index(name: &str, raw: Option<&str>) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            AppError::BadRequest(format!("{} must be a non-negative integer.", name))
        }),
    }
}

/// POST /emails
pub async fn send_email(
    DbConn(mut conn): DbConn,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendEmailResponse>), AppError> {
    let Json(req) = payload?;
    let email = validate_email(req)?;

    // Take the write lock up front so the lookups never need a lock upgrade
    let mut tx = conn.begin_with("BEGIN IMMEDIATE").await?;

    let sender = UserRepository::get_by_username(&mut tx, &email.sender_username)
        .await?
        .ok_or_else(|| AppError::NotFound("Sender username does not exist.".to_string()))?;
    let recipient = UserRepository::get_by_username(&mut tx, &email.recipient_username)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipient username does not exist.".to_string()))?;

    let created = EmailRepository::create(
        &mut tx,
        &NewEmail {
            sender_id: sender.id,
            recipient_id: recipient.id,
            message_subject: email.message_subject,
            body: email.body,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::debug!(
        email_id = created.id,
        sender = %created.sender_username,
        recipient = %created.recipient_username,
        "email sent"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendEmailResponse {
            id: created.id,
            created_at: created.created_at,
        }),
    ))
}

/// GET /emails?recipient_username=X[&start=N][&stop=M]
pub async fn get_emails(
    DbConn(mut conn): DbConn,
    query: Result<Query<FetchEmailsQuery>, QueryRejection>,
) -> Result<Json<Vec<Email>>, AppError> {
    let Query(query) = query?;

    let recipient = query
        .recipient_username
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("Recipient username is required.".to_string()))?;

    let range = IndexRange::new(
        parse_index("start", query.start.as_deref())?,
        parse_index("stop", query.stop.as_deref())?,
    )?;

    if !UserRepository::exists(&mut conn, &recipient).await? {
        return Err(AppError::NotFound("Username does not exist.".to_string()));
    }

    let emails = EmailRepository::list_for_recipient(&mut conn, &recipient, range).await?;
    Ok(Json(emails))
}

/// DELETE /emails/{id}
pub async fn delete_email(
    conn: DbConn,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteEmailResponse>, AppError> {
    let Path(id) = id?;
    remove(conn, id).await
}

/// DELETE /emails with a `{"id": N}` body
pub async fn delete_email_by_body(
    conn: DbConn,
    payload: Result<Json<DeleteEmailRequest>, JsonRejection>,
) -> Result<Json<DeleteEmailResponse>, AppError> {
    let Json(req) = payload?;
    remove(conn, req.id).await
}

async fn remove(DbConn(mut conn): DbConn, id: i64) -> Result<Json<DeleteEmailResponse>, AppError> {
    if !EmailRepository::delete(&mut conn, id).await? {
        return Err(AppError::NotFound(format!("Email with id {} does not exist.", id)));
    }

    tracing::info!(email_id = id, "email deleted");

    Ok(Json(DeleteEmailResponse {
        message: format!("Successfully deleted email with id {}", id),
    }))
}
