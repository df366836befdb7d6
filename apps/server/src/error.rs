//! # API Error Type
//!
//! Unified error type for route handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Libris                                 │
//! │                                                                         │
//! │  Handler: Result<T, ApiError>                                          │
//! │       │                                                                 │
//! │       ├── CoreError::Validation ──────► 400 { "<field>": ["..."] }      │
//! │       ├── CoreError::Unauthorized ────► 401 { "error": "..." }          │
//! │       ├── CoreError::Forbidden ───────► 403 { "error": "..." }          │
//! │       ├── CoreError::NotFound ────────► 404 { "error": "..." }          │
//! │       ├── CoreError::Conflict ────────► 409 { "error": "..." }          │
//! │       ├── CoreError::ProcessingFailed ► 500 "could not process the loan"│
//! │       └── DbError (storage) ──────────► 500 generic, cause logged       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal causes are logged here and never serialized.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use libris_core::CoreError;
use libris_db::DbError;

/// Machine-readable error codes, sent next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Missing or invalid credentials (401)
    Unauthorized,

    /// Role too low (403)
    Forbidden,

    /// Resource not found or not visible (404)
    NotFound,

    /// Business rule violated (409)
    Conflict,

    /// Loan transaction failed and was rolled back (500)
    ProcessingFailed,

    /// Anything else (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ProcessingFailed | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error returned from route handlers.
///
/// ## Serialization
/// Field errors are sent as a map keyed by field:
/// ```json
/// { "isbn": ["isbn '9780000000001' already exists"] }
/// ```
/// Every other error carries a message and a code:
/// ```json
/// { "error": "no copies available for this book", "code": "CONFLICT" }
/// ```
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            fields: None,
        }
    }

    /// Field errors not tied to a single field (malformed body).
    pub fn non_field(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert("non_field_errors".to_string(), vec![message.clone()]);
        ApiError {
            code: ErrorCode::ValidationError,
            message,
            fields: Some(fields),
        }
    }

    /// Creates an internal error. The message is what the client sees.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.fields {
            Some(fields) => json!(fields),
            None => json!({ "error": self.message, "code": self.code }),
        };
        (status, Json(body)).into_response()
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => ApiError {
                code: ErrorCode::ValidationError,
                message: errors.to_string(),
                fields: Some(errors.by_field()),
            },
            CoreError::Unauthorized(message) => ApiError::new(ErrorCode::Unauthorized, message),
            CoreError::Forbidden(message) => ApiError::new(ErrorCode::Forbidden, message),
            err @ CoreError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            CoreError::Conflict(reason) => ApiError::new(ErrorCode::Conflict, reason.to_string()),
            err @ CoreError::ProcessingFailed => {
                ApiError::new(ErrorCode::ProcessingFailed, err.to_string())
            }
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rejected(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => {
                ApiError::from(CoreError::NotFound { entity, id })
            }
            DbError::UniqueViolation { columns } => {
                tracing::warn!(%columns, "Unique violation reached the gateway");
                ApiError::new(ErrorCode::Conflict, "a record with these values already exists")
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::internal("internal server error")
            }
        }
    }
}

/// Malformed JSON bodies (syntax, wrong types, unknown status values).
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::non_field(rejection.body_text())
    }
}
