//! # Error Types
//!
//! Domain-specific error types for kassa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kassa-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Validation / Conflict / NotFound / Persistence │
//! │                                                                         │
//! │  kassa-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - Rejected or failed multi-step workflows        │
//! │                                                                         │
//! │  Back office errors (in app)                                           │
//! │  └── ApiError         - What the front end sees (serialized)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (product name, ids, amounts) to
//! produce an actionable message on its own.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a failure, used to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, detected before any write.
    Validation,
    /// The request is well-formed but clashes with current state.
    Conflict,
    /// A referenced entity does not exist in the caller's tenant.
    NotFound,
    /// Storage failed or was unreachable.
    Persistence,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A credit sale needs someone to owe the money.
    #[error("A customer must be selected for a debt sale")]
    MissingCustomerForDebt,

    /// An amount was zero, negative or otherwise unusable.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Cash or card tender does not cover the sale.
    #[error("Insufficient payment: total {total_cents}, tendered {tendered_cents}")]
    InsufficientPayment {
        total_cents: i64,
        tendered_cents: i64,
    },

    /// Not enough units on hand to complete the sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: Rice 5kg x10
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Rice 5kg", available: 3, requested: 10 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Rice 5kg in stock"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payments are no longer accepted once a debt is settled.
    #[error("Debt {0} is already settled")]
    DebtAlreadySettled(String),

    /// The payment would push the debt past its amount.
    #[error("Payment of {requested_cents} exceeds the remaining balance {remaining_cents} of debt {debt_id}")]
    PaymentExceedsBalance {
        debt_id: String,
        remaining_cents: i64,
        requested_cents: i64,
    },

    /// Customers with sales history cannot be removed.
    #[error("Customer {customer_id} has {sales} linked sale(s) and cannot be deleted")]
    CustomerHasSales { customer_id: String, sales: i64 },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Debt not found: {0}")]
    DebtNotFound(String),

    /// Cart has exceeded maximum allowed items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error for callers that map it to a status code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyCart
            | CoreError::MissingCustomerForDebt
            | CoreError::InvalidAmount { .. }
            | CoreError::InsufficientPayment { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,

            CoreError::InsufficientStock { .. }
            | CoreError::DebtAlreadySettled(_)
            | CoreError::PaymentExceedsBalance { .. }
            | CoreError::CustomerHasSales { .. } => ErrorKind::Conflict,

            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::CategoryNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::DebtNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Shorthand for [`CoreError::InvalidAmount`].
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by [`crate::validation`] before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Rice 5kg".to_string(),
            available: 3,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Rice 5kg: available 3, requested 10"
        );

        assert_eq!(
            CoreError::MissingCustomerForDebt.to_string(),
            "A customer must be selected for a debt sale"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(
            CoreError::DebtAlreadySettled("d1".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::SaleNotFound("s1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::InsufficientStock {
                product: "x".into(),
                available: 0,
                requested: 1
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
