//! # Validation Module
//!
//! Input validation for Kassa POS.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Back office command                                          │
//! │  └── THIS MODULE: names, phones, quantities, amounts                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Checkout / payment planning (checkout.rs, debt.rs)           │
//! │  └── Rules that need current state: stock, balances, customers         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (amount_cents > 0)                      │
//! │  ├── UNIQUE (tenant_id, phone), UNIQUE (tenant_id, invoice_number)     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kassa_core::validation::{validate_phone, validate_quantity};
//!
//! assert!(validate_phone("+254 712 345 678").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CATEGORY_NAME_LEN: usize = 100;
const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

fn required_name(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a product name and returns it trimmed.
///
/// ```rust
/// use kassa_core::validation::validate_product_name;
///
/// assert_eq!(validate_product_name("  Rice 5kg ").unwrap(), "Rice 5kg");
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    required_name("name", name, MAX_NAME_LEN)
}

pub fn validate_category_name(name: &str) -> ValidationResult<String> {
    required_name("category name", name, MAX_CATEGORY_NAME_LEN)
}

pub fn validate_customer_name(name: &str) -> ValidationResult<String> {
    required_name("customer name", name, MAX_NAME_LEN)
}

/// Validates and normalizes a phone number.
///
/// ## Rules
/// - Digits, spaces, dashes and parentheses, optionally a leading `+`
/// - Between 7 and 15 digits (E.164 upper bound)
/// - Separators are stripped so "0712-345 678" and "0712345678" collide
///   on the per-tenant uniqueness constraint
///
/// ```rust
/// use kassa_core::validation::validate_phone;
///
/// assert_eq!(validate_phone("0712-345 678").unwrap(), "0712345678");
/// assert_eq!(validate_phone("+254712345678").unwrap(), "+254712345678");
/// assert!(validate_phone("call me").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    let (prefix, rest) = match phone.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", phone),
    };

    if !rest
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, dashes and parentheses".to_string(),
        });
    }

    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    if !(7..=15).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must have between 7 and 15 digits".to_string(),
        });
    }

    Ok(format!("{prefix}{digits}"))
}

/// Validates a search query.
///
/// Empty is allowed (lists everything); returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ```text
/// validate_quantity(q)
///      │
///      ├── q <= 0?   → MustBePositive
///      ├── q > 999?  → OutOfRange
///      └── OK
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Prices may be zero (free items) but never negative.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Stock levels are never negative.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// A debt installment must be strictly positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Debt term in days, as configured in the store settings.
pub fn validate_debt_term_days(days: i64) -> ValidationResult<()> {
    if !(1..=3650).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "debt term days".to_string(),
            min: 1,
            max: 3650,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct product fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_names() {
        assert_eq!(validate_product_name(" Sugar 1kg ").unwrap(), "Sugar 1kg");
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
        assert!(validate_category_name("Drinks").is_ok());
        assert!(validate_customer_name("").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("(0712) 345-678").unwrap(), "0712345678");
        assert_eq!(validate_phone("+33 6 12 34 56 78").unwrap(), "+33612345678");

        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("0712abc678").is_err());
        assert!(validate_phone("++254712345678").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-5).is_err());
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
    }

    #[test]
    fn test_validate_debt_term_days() {
        assert!(validate_debt_term_days(30).is_ok());
        assert!(validate_debt_term_days(0).is_err());
        assert!(validate_debt_term_days(5000).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
