//! Concurrency tests
//!
//! Fire overlapping requests at a file-backed pool with many connections,
//! so writers really do contend for the SQLite lock.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use inbox_relay::api::{create_router, AppState};
use inbox_relay::config::Config;
use inbox_relay::db;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tower::ServiceExt;

const CLIENTS: usize = 40;

/// Build a router over a fresh database file inside `dir`.
async fn create_file_backed_app(dir: &tempfile::TempDir) -> Router {
    let config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: format!("sqlite://{}", dir.path().join("relay.db").display()),
        db_max_connections: 20,
        db_min_connections: 5,
        request_timeout_secs: 30,
    };

    let pool = db::connect(&config).await.expect("Failed to open database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    create_router(AppState {
        db: pool,
        config: Arc::new(config),
    })
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn run_all(mut set: JoinSet<(StatusCode, Value)>) -> Vec<(StatusCode, Value)> {
    let mut results = Vec::new();
    while let Some(result) = set.join_next().await {
        results.push(result.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registers_and_sends_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_file_backed_app(&dir).await;

    let mut registers = JoinSet::new();
    for i in 0..CLIENTS {
        let app = app.clone();
        registers.spawn(async move {
            post_json(
                app,
                "/register",
                json!({ "username": format!("user{}", i), "password": "1234" }),
            )
            .await
        });
    }
    let results = run_all(registers).await;
    let failed: Vec<_> = results.iter().filter(|(s, _)| *s != StatusCode::CREATED).collect();
    assert!(failed.is_empty(), "registers failed: {:?}", failed);

    let (status, _) = post_json(
        app.clone(),
        "/register",
        json!({ "username": "inbox", "password": "1234" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut sends = JoinSet::new();
    for i in 0..CLIENTS {
        let app = app.clone();
        sends.spawn(async move {
            post_json(
                app,
                "/emails",
                json!({
                    "message_subject": format!("hello {}", i),
                    "body": "Body",
                    "sender_username": format!("user{}", i),
                    "recipient_username": "inbox",
                }),
            )
            .await
        });
    }
    let results = run_all(sends).await;
    let failed: Vec<_> = results.iter().filter(|(s, _)| *s != StatusCode::CREATED).collect();
    assert!(failed.is_empty(), "sends failed: {:?}", failed);

    let request = Request::builder()
        .uri("/emails?recipient_username=inbox")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let emails: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(emails.len(), CLIENTS);
    for pair in emails.windows(2) {
        assert!(pair[0]["created_at"].as_i64() <= pair[1]["created_at"].as_i64());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_registration_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_file_backed_app(&dir).await;

    let mut registers = JoinSet::new();
    for _ in 0..2 {
        let app = app.clone();
        registers.spawn(async move {
            post_json(app, "/register", json!({ "username": "racer", "password": "1234" })).await
        });
    }

    let mut statuses: Vec<_> = run_all(registers).await.into_iter().map(|(s, _)| s).collect();
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
}
