//! Error handling for the stock settlement server
//!
//! Every failure leaves the database untouched: validation runs before a
//! transaction is opened, and an open `sqlx::Transaction` rolls back when it
//! is dropped on the error path.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{ErrorKind, SettlementError};
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    /// Rejected document (shape, prices or sums)
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unknown delivery type: {0}")]
    UnknownDeliveryType(String),

    #[error("Unknown payment type: {0}")]
    UnknownPaymentType(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: Uuid,
        available: i64,
        requested: i64,
    },

    /// A ledger update matched no product row for a line the document
    /// references. The transaction is rolled back; the next stock count is
    /// the correction point if the condition persists.
    #[error("Ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field.clone()),
            ),
            AppError::Settlement(err) => {
                let status = match err.kind() {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::Consistency => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                };
                let mut detail = ErrorDetail::new(err.code(), err.to_string());
                detail.field = err.field();
                (status, detail)
            }
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::UnknownDeliveryType(title) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "UNKNOWN_DELIVERY_TYPE",
                    format!("Delivery type '{}' does not exist", title),
                )
                .with_field("delivery_type"),
            ),
            AppError::UnknownPaymentType(title) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "UNKNOWN_PAYMENT_TYPE",
                    format!("Payment type '{}' does not exist", title),
                )
                .with_field("payment_type"),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::InsufficientStock { .. } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string()),
            ),
            AppError::LedgerInconsistency(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("LEDGER_INCONSISTENCY", msg.clone()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        match &self {
            AppError::LedgerInconsistency(_) => {
                tracing::error!(code = "LEDGER_INCONSISTENCY", "Ledger left inconsistent: {}", self)
            }
            _ if status.is_server_error() => tracing::error!("Error: {:?}", self),
            _ => tracing::debug!("Request rejected: {}", self),
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Helper to create Decimal from string
    fn dec(s: &str) -> rust_decimal::Decimal {
        rust_decimal::Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_consistency_errors_are_unprocessable() {
        let err = AppError::from(SettlementError::SumMismatch {
            computed: dec("500"),
            submitted: dec("450"),
        });
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "SUM_MISMATCH");
        assert_eq!(detail.field.as_deref(), Some("sum_price"));
    }

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = AppError::from(SettlementError::InvalidTax {
            line: 1,
            tax: dec("120"),
        });
        assert_eq!(err.status_and_detail().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::validation("cursor", "malformed").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_stock_and_state_conflicts() {
        let err = AppError::InsufficientStock {
            product_id: Uuid::nil(),
            available: 3,
            requested: 5,
        };
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        assert_eq!(
            AppError::InvalidStateTransition("COMPLETED -> IN_PROGRESS".into())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_ledger_inconsistency_has_distinct_code() {
        let (status, detail) =
            AppError::LedgerInconsistency("product missing".into()).status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.code, "LEDGER_INCONSISTENCY");
    }

    #[test]
    fn test_body_shape() {
        let body = ErrorResponse {
            error: ErrorDetail::new("NOT_FOUND", "Order not found"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": {"code": "NOT_FOUND", "message": "Order not found"}})
        );

        let with_field = ErrorDetail::new("VALIDATION_ERROR", "bad").with_field("lines[0].quantity");
        assert_eq!(
            serde_json::to_value(&with_field).unwrap()["field"],
            "lines[0].quantity"
        );
    }
}
