//! In-process stand-in for the Mini CMS backend.
//!
//! Binds an Axum router to `127.0.0.1:0` and returns its base URL. The login
//! handler understands a few magic usernames so tests can drive each branch:
//! - `admin` / `admin123`: success with `tok123`
//! - `empty`: 200 with `{}`
//! - `delay:<ms>:<token>`: waits, then succeeds with `<token>`
//! - anything else: 400 with a `detail` message

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use crate::config::ClientConfig;

pub const TEST_TOKEN: &str = "tok123";

pub async fn spawn_api() -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/echo-auth", get(echo_auth))
        .route("/plain-error", get(plain_error))
        .route("/slow", get(slow))
        .route("/news/", get(list_news).post(create_news))
        .route("/news/{id}/files", post(upload_file));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url).unwrap()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" }))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if let Some(rest) = username.strip_prefix("delay:") {
        let (ms, token) = rest.split_once(':').unwrap_or((rest, "delayed"));
        tokio::time::sleep(Duration::from_millis(ms.parse().unwrap_or(0))).await;
        return Json(json!({ "access_token": token, "token_type": "bearer" })).into_response();
    }

    match (username, password) {
        ("admin", "admin123") => {
            Json(json!({ "access_token": TEST_TOKEN, "token_type": "bearer", "expires_in": 1800 })).into_response()
        }
        ("empty", _) => Json(json!({})).into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Incorrect username or password" }))).into_response(),
    }
}

async fn echo_auth(headers: HeaderMap) -> Json<Value> {
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    Json(json!({ "authorization": bearer(&headers), "content_type": content_type }))
}

async fn plain_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "ok": true }))
}

async fn list_news() -> Json<Value> {
    Json(json!([
        {
            "id": 2,
            "title": "Second",
            "content": "newer",
            "created_at": "2024-05-02T10:00:00",
            "updated_at": null,
            "files": [
                {
                    "id": 7,
                    "filename": "a.png",
                    "filepath": "uploads/a.png",
                    "uploaded_at": "2024-05-02T10:05:00",
                    "is_image": true
                }
            ]
        },
        { "id": 1, "title": "First", "content": "older", "created_at": "2024-05-01T09:00:00" }
    ]))
}

async fn create_news(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if bearer(&headers).as_deref() != Some("Bearer tok123") {
        return unauthorized();
    }
    Json(json!({
        "id": 3,
        "title": body["title"],
        "content": body["content"],
        "created_at": "2024-05-03T08:00:00",
        "files": []
    }))
    .into_response()
}

async fn upload_file(headers: HeaderMap, Path(id): Path<i64>, mut multipart: Multipart) -> Response {
    if bearer(&headers).as_deref() != Some("Bearer tok123") {
        return unauthorized();
    }
    let mut filename = String::new();
    let mut size = 0_usize;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_owned();
            size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
        }
    }
    Json(json!({
        "id": 40 + id,
        "filename": filename,
        "filepath": format!("uploads/{filename}"),
        "uploaded_at": "2024-05-03T08:30:00",
        "is_image": false,
        "size": size
    }))
    .into_response()
}
