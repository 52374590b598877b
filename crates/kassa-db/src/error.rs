//! # Database Error Types
//!
//! Error types for database operations and for the transactional
//! workflows built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError ← Rejected(CoreError) or CheckoutFailed / ...Failed       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (in back office) ← Serialized for the front end              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kassa_core::{CoreError, ErrorKind};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database (or not in this tenant).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second customer with the same phone in a tenant
    /// - Duplicate category name
    /// - Invoice number collision
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, zero payment, ...).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: customers.tenant_id, customers.phone"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// LedgerError
// =============================================================================

/// Failure of a write that enforces business rules.
///
/// Either the request was refused before anything was committed
/// (`Rejected`), or storage failed part way and the transaction was
/// rolled back (`*Failed`).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Checkout failed: {0}")]
    CheckoutFailed(#[source] DbError),

    #[error("Cancelling sale {sale_id} failed: {source}")]
    CancellationFailed {
        sale_id: String,
        #[source]
        source: DbError,
    },

    #[error("Payment on debt {debt_id} failed: {source}")]
    PaymentFailed {
        debt_id: String,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Persistence(#[from] DbError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Rejected(err) => err.kind(),
            _ => ErrorKind::Persistence,
        }
    }

    pub(crate) fn during_checkout(self) -> Self {
        match self {
            LedgerError::Persistence(source) => LedgerError::CheckoutFailed(source),
            other => other,
        }
    }

    pub(crate) fn during_cancellation(self, sale_id: &str) -> Self {
        match self {
            LedgerError::Persistence(source) => LedgerError::CancellationFailed {
                sale_id: sale_id.to_string(),
                source,
            },
            other => other,
        }
    }

    pub(crate) fn during_payment(self, debt_id: &str) -> Self {
        match self {
            LedgerError::Persistence(source) => LedgerError::PaymentFailed {
                debt_id: debt_id.to_string(),
                source,
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Persistence(err.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
