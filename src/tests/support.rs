//! Shared fixtures: throwaway databases, a mail recorder and a router harness.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::mail::{MailKind, MailMessage, Mailer};
use crate::state::AppState;

pub const PASSWORD: &str = "password123";

/// A migrated and seeded SQLite database in a temporary directory.
/// Keep the `TempDir` alive for as long as the pool is used.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    crate::db::seed_catalog(&pool).await.unwrap();
    (dir, pool)
}

/// Inserts a verified user whose password is [`PASSWORD`].
pub async fn insert_user(pool: &SqlitePool, email: &str) -> i64 {
    let hash = crate::auth::hash_password(PASSWORD).unwrap();
    sqlx::query("INSERT INTO users (name, lastname, email, password_hash) VALUES ('Ana', 'Pérez', ?1, ?2)")
        .bind(email)
        .bind(hash)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Keeps every message so tests can read verification codes.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m.kind {
            MailKind::VerificationCode { code } if m.to == email => Some(code),
            _ => None,
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    _dir: TempDir,
}

/// Upstreams that are never called point at the discard port.
pub async fn test_app() -> TestApp {
    test_app_with("http://127.0.0.1:9", "http://127.0.0.1:9", 1000).await
}

/// Builds the full router against a fresh database, with the given upstreams
/// and per-endpoint limit for the account endpoints.
pub async fn test_app_with(broker_url: &str, nutrition_url: &str, auth_max_requests: usize) -> TestApp {
    let (dir, pool) = test_pool().await;
    let overrides = format!(
        r#"
[rate_limit]
auth_max_requests = {}

[broker]
base_url = "{}"
api_key = "broker-key"
secret_key = "broker-secret"

[nutrition]
base_url = "{}"
food_app_id = "food-id"
food_app_key = "food-key"
analysis_app_id = "analysis-id"
analysis_app_key = "analysis-key"
"#,
        auth_max_requests, broker_url, nutrition_url
    );
    let config = crate::config::from_toml_str(&overrides).unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(pool, config).unwrap().with_mailer(mailer.clone());
    TestApp { router: crate::routes::router(state.clone()), state, mailer, _dir: dir }
}

impl TestApp {
    /// Sends one request; the body is parsed as JSON when possible.
    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers through the API, verifies with the mailed code and logs in.
    /// Returns the user id and a bearer token.
    pub async fn register_and_login(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/api/users",
                None,
                json!({ "name": "Ana", "lastname": "Pérez", "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        let user_id = body["data"]["user_id"].as_i64().unwrap();

        let code = self.mailer.last_code_for(email).unwrap();
        let (status, body) = self
            .post(
                "/api/users/auth-login",
                None,
                json!({ "user_email": email, "password": PASSWORD, "verification_code": code }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "verification failed: {}", body);

        let (status, body) = self.post("/api/users/login", None, json!({ "email": email, "password": PASSWORD })).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (user_id, body["data"]["token"].as_str().unwrap().to_string())
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table)).fetch_one(&self.state.db).await.unwrap()
    }
}
