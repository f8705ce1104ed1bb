use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::upstream::UpstreamError;

/// The primary error type for the application.
///
/// Every variant maps to one status code and a sanitized envelope. Details that
/// could expose internals (SQL errors, upstream bodies, panics in helpers) are
/// logged together with an error id and never sent to the caller.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For errors related to database operations.
    Database(String),
    /// For client errors due to invalid requests or violated domain rules.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For missing or invalid credentials, and for acting on another user's account.
    Unauthorized(String),
    /// For when a client has sent too many requests in a given amount of time.
    RateLimited {
        /// The number of seconds to wait before retrying the request.
        retry_after_seconds: u64,
    },
    /// For request bodies with missing or mistyped fields.
    Validation(FieldErrors),
    /// For failures talking to the broker gateway or the nutrition API.
    Upstream {
        service: &'static str,
        status: Option<u16>,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after_seconds)
            }
            AppError::Validation(errors) => {
                write!(f, "Validation failed for: {}", errors.fields().collect::<Vec<_>>().join(", "))
            }
            AppError::Upstream { service, status: Some(status) } => {
                write!(f, "Upstream {} answered with status {}", service, status)
            }
            AppError::Upstream { service, status: None } => write!(f, "Upstream {} unreachable", service),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message, errors) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error",
                    "A database error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Resource not found", msg, Some(json!([]))),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg, None),
            AppError::RateLimited { retry_after_seconds } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                format!("Too many requests. Please retry after {} seconds", retry_after_seconds),
                Some(json!({ "retry_after_seconds": retry_after_seconds })),
            ),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error",
                "The request body could not be processed".to_string(),
                Some(errors.to_json()),
            ),
            AppError::Upstream { service, status } => {
                tracing::warn!(service, ?status, "Upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream error",
                    format!("The {} service could not complete the request", service),
                    Some(json!({ "service": service, "upstream_status": status })),
                )
            }
        };

        let mut body = json!({
            "type": "error",
            "title": title,
            "message": message,
        });
        if let Some(errors) = errors {
            body["errors"] = errors;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                if msg.contains("FOREIGN KEY constraint failed") {
                    AppError::BadRequest("The operation conflicts with related resources".to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    AppError::BadRequest("A resource with the same unique value already exists".to_string())
                } else {
                    AppError::Database(msg)
                }
            }
            sqlx::Error::PoolTimedOut => AppError::Database("connection pool timed out".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        tracing::warn!(service = err.service(), "Upstream call failed: {}", err);
        AppError::Upstream { service: err.service(), status: err.status() }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                let mut errors = FieldErrors::default();
                errors.add("body", e.body_text());
                AppError::Validation(errors)
            }
            JsonRejection::JsonSyntaxError(_) => AppError::BadRequest("Malformed JSON body".to_string()),
            JsonRejection::MissingJsonContentType(_) => {
                AppError::BadRequest("Expected a request with `Content-Type: application/json`".to_string())
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn to_json(&self) -> Value {
        json!(self.0)
    }

    /// `Ok(())` when nothing was recorded, a 422 otherwise.
    pub fn finish(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

/// Helpers for request validation.
pub mod validation {
    use super::*;

    /// Records an error when a required string is absent or blank.
    pub fn require_text<'a>(errors: &mut FieldErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            Some(_) => {
                errors.add(field, format!("{} must not be empty", field));
                None
            }
            None => {
                errors.add(field, format!("{} is required", field));
                None
            }
        }
    }

    /// Records an error when a required value is absent.
    pub fn require<T: Copy>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            errors.add(field, format!("{} is required", field));
        }
        value
    }

    /// Records an error when a present string is blank. Absent values pass.
    pub fn optional_text(errors: &mut FieldErrors, field: &str, value: &Option<String>) {
        if let Some(v) = value {
            if v.trim().is_empty() {
                errors.add(field, format!("{} must not be empty", field));
            }
        }
    }

    /// Minimal shape check: one `@` with text on both sides and a dot in the domain.
    pub fn validate_email(errors: &mut FieldErrors, field: &str, email: &str) {
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid || email.contains(char::is_whitespace) {
            errors.add(field, format!("{} must be a valid email address", field));
        }
    }

    pub fn validate_password(errors: &mut FieldErrors, field: &str, password: &str, min_len: usize) {
        if password.chars().count() < min_len {
            errors.add(field, format!("{} must be at least {} characters long", field, min_len));
        }
    }

    pub fn validate_flag(errors: &mut FieldErrors, field: &str, value: Option<i64>) {
        if let Some(v) = value {
            if v != 0 && v != 1 {
                errors.add(field, format!("{} must be 0 or 1, got {}", field, v));
            }
        }
    }
}
