//! # API Error Type
//!
//! Unified error type for back office commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Kassa POS                              │
//! │                                                                         │
//! │  Command Function -> Result<T, ApiError>                                │
//! │         │                                                               │
//! │         ├── CoreError (validation, conflict, not found)                 │
//! │         │       └── message shown as-is, code from the variant          │
//! │         │                                                               │
//! │         ├── LedgerError                                                 │
//! │         │       ├── Rejected(CoreError) ── as above                     │
//! │         │       └── *Failed(DbError) ──── logged, generic message       │
//! │         │                                                               │
//! │         ├── DbError ─── constraint errors explained, the rest logged    │
//! │         ├── CartError / ConfigError                                     │
//! │         ▼                                                               │
//! │  ApiError { code, message } ──► front end                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal details (SQL messages, file paths) go to the log, never into
//! `message`.

use serde::Serialize;
use tracing::error;

use kassa_core::{CoreError, ErrorKind, ValidationError};
use kassa_db::{DbError, LedgerError};

use crate::state::{CartError, ConfigError};

/// API error returned from commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Rice 5kg: available 3, requested 10"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Request clashes with current state (409)
    Conflict,

    /// Not enough units on hand
    InsufficientStock,

    /// Tender or debt payment problem
    PaymentError,

    /// Cart operation failed
    CartError,

    /// Settings could not be loaded or saved
    ConfigError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    fn storage(context: &str, err: &DbError) -> Self {
        error!(error = %err, "{context}");
        ApiError::new(ErrorCode::DatabaseError, context)
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InsufficientPayment { .. }
            | CoreError::InvalidAmount { .. }
            | CoreError::PaymentExceedsBalance { .. }
            | CoreError::DebtAlreadySettled(_) => ErrorCode::PaymentError,
            CoreError::CartTooLarge { .. } => ErrorCode::CartError,
            _ => match err.kind() {
                ErrorKind::Validation => ErrorCode::ValidationError,
                ErrorKind::Conflict => ErrorCode::Conflict,
                ErrorKind::NotFound => ErrorCode::NotFound,
                ErrorKind::Persistence => ErrorCode::DatabaseError,
            },
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        CoreError::from(err).into()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { ref message } => {
                error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation { ref message } => {
                error!("Constraint violation: {}", message);
                ApiError::validation("Value not allowed")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::QueryFailed(_) | DbError::Internal(_) => {
                ApiError::storage("Database operation failed", &err)
            }
        }
    }
}

/// Rejections keep their business message; storage failures during a
/// workflow get one message per workflow.
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(core) => core.into(),
            LedgerError::CheckoutFailed(ref source) => {
                ApiError::storage("Checkout failed; nothing was recorded", source)
            }
            LedgerError::CancellationFailed { ref source, .. } => {
                ApiError::storage("Cancelling the sale failed; nothing was changed", source)
            }
            LedgerError::PaymentFailed { ref source, .. } => {
                ApiError::storage("Recording the payment failed; nothing was recorded", source)
            }
            LedgerError::Persistence(db) => db.into(),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::NotInCart(_) => ApiError::new(ErrorCode::CartError, err.to_string()),
            CartError::Rejected(core) => core.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(reason) => ApiError::validation(reason),
            other => {
                error!(error = %other, "Settings could not be saved");
                ApiError::new(ErrorCode::ConfigError, "Settings could not be saved")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_message_is_actionable() {
        let err: ApiError = LedgerError::Rejected(CoreError::InsufficientStock {
            product: "Rice 5kg".into(),
            available: 3,
            requested: 10,
        })
        .into();

        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("Rice 5kg"));
        assert!(err.message.contains('3'));
    }

    #[test]
    fn test_workflow_failures_hide_details() {
        let err: ApiError =
            LedgerError::CheckoutFailed(DbError::QueryFailed("disk I/O error".into())).into();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("disk"));
    }

    #[test]
    fn test_codes_follow_error_kind() {
        let code = |e: CoreError| ApiError::from(e).code;

        assert_eq!(code(CoreError::EmptyCart), ErrorCode::ValidationError);
        assert_eq!(code(CoreError::MissingCustomerForDebt), ErrorCode::ValidationError);
        assert_eq!(code(CoreError::SaleNotFound("s".into())), ErrorCode::NotFound);
        assert_eq!(
            code(CoreError::CustomerHasSales {
                customer_id: "c".into(),
                sales: 2
            }),
            ErrorCode::Conflict
        );
        assert_eq!(code(CoreError::DebtAlreadySettled("d".into())), ErrorCode::PaymentError);
    }

    #[test]
    fn test_serializes_for_front_end() {
        let json = serde_json::to_value(ApiError::not_found("Sale", "abc")).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Sale not found: abc");
    }
}
