use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::state::DbConn;
use crate::crypto::{generate_salt, hash_password};
use crate::db::UserRepository;
use crate::error::AppError;

const MIN_CREDENTIAL_LEN: usize = 2;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

fn validate_credentials(req: RegisterRequest) -> Result<(String, String), AppError> {
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    if username.is_empty() {
        return Err(AppError::BadRequest("A user must have a username.".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("A user must have a password.".to_string()));
    }
    if username.chars().count() < MIN_CREDENTIAL_LEN {
        return Err(AppError::BadRequest(
            "Username must be at least 2 characters long.".to_string(),
        ));
    }
    if password.chars().count() < MIN_CREDENTIAL_LEN {
        return Err(AppError::BadRequest(
            "The password must be at least 2 characters long.".to_string(),
        ));
    }

    Ok((username, password))
}

/// POST /register
pub async fn register(
    DbConn(mut conn): DbConn,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(req) = payload?;
    let (username, password) = validate_credentials(req)?;

    if UserRepository::exists(&mut conn, &username).await? {
        return Err(AppError::Conflict("Username already exists.".to_string()));
    }

    // Argon2 is CPU-bound; keep it off the async workers
    let salt = generate_salt();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, &salt))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

    // A racing registration of the same name surfaces as a unique violation (409)
    let user = UserRepository::create(&mut conn, &username, &password_hash, &salt).await?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: Option<&str>, password: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_credentials() {
        let (u, p) = validate_credentials(request(Some("tester1"), Some("1234"))).unwrap();
        assert_eq!((u.as_str(), p.as_str()), ("tester1", "1234"));

        for bad in [
            request(None, Some("1234")),
            request(Some("tester1"), None),
            request(Some(""), Some("1234")),
            request(Some("t"), Some("1234")),
            request(Some("tester1"), Some("1")),
        ] {
            assert!(matches!(validate_credentials(bad), Err(AppError::BadRequest(_))));
        }
    }
}
