//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Kopsis                                 │
//! │                                                                         │
//! │  Handler ── Result<Json<T>, ApiError>                                   │
//! │       │                                                                 │
//! │       ├── LedgerError::Validation ───────────► 400 VALIDATION_ERROR     │
//! │       ├── LedgerError::NotFound ─────────────► 404 NOT_FOUND            │
//! │       ├── Overpayment / AlreadyPaid / ...                               │
//! │       │   Conflict / NothingToGenerate ──────► 409 CONFLICT             │
//! │       ├── installment policy ────────────────► 422 PAYMENT_ERROR        │
//! │       └── LedgerError::Db ── logged ─────────► 500 DATABASE_ERROR       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Body
//! ```json
//! {
//!   "code": "CONFLICT",
//!   "message": "Template Seragam is used by 42 liabilities; deactivate it instead",
//!   "count": 42
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use kopsis_core::{CoreError, ValidationError};
use kopsis_db::{DbError, LedgerError};

/// API error returned from handlers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Number of conflicting records, when that helps the operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Clashes with existing records (409)
    Conflict,

    /// Installment policy refused the payment (422)
    PaymentError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PaymentError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            count: None,
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn conflict(message: impl Into<String>, count: Option<i64>) -> Self {
        ApiError {
            count,
            ..ApiError::new(ErrorCode::Conflict, message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::conflict(format!("{} '{}' already exists", field, value), None)
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::PoolExhausted => ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted"),
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts billing rule violations to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::AlreadyPaid { .. }
            | CoreError::Overpayment { .. }
            | CoreError::LiabilityHasPayments { .. } => ApiError::conflict(message, None),
            CoreError::InstallmentNotAllowed { .. }
            | CoreError::BelowMinimumInstallment { .. }
            | CoreError::InstallmentLimitReached { .. }
            | CoreError::FinalInstallmentMustSettle { .. } => {
                ApiError::new(ErrorCode::PaymentError, message)
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(e) => e.into(),
            LedgerError::Core(e) => e.into(),
            LedgerError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            LedgerError::Conflict { message, count } => ApiError::conflict(message, count),
            LedgerError::NothingToGenerate { skipped } => ApiError::conflict(
                LedgerError::NothingToGenerate { skipped }.to_string(),
                Some(skipped),
            ),
            e @ LedgerError::ConcurrentModification { .. } => ApiError::conflict(e.to_string(), None),
            LedgerError::Db(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
