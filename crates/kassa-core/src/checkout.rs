//! # Checkout Planning
//!
//! Turns cart lines plus payment details into the exact rows a sale will
//! write. Planning is pure: the database layer loads the products, calls
//! [`plan_checkout`], then applies the plan inside one transaction.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Pipeline                               │
//! │                                                                         │
//! │  lines + payment                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Shape checks      EmptyCart, CartTooLarge, quantity range,          │
//! │                       tendered >= 0, MissingCustomerForDebt             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Resolve products  ProductNotFound (unknown or inactive)             │
//! │       │               duplicate lines merged per product                │
//! │       ▼                                                                 │
//! │  3. Stock             InsufficientStock (all lines, or nothing)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. Totals            total = Σ price × qty (snapshotted)               │
//! │       │               InsufficientPayment for cash/card                 │
//! │       ▼                                                                 │
//! │  CheckoutPlan ──► kassa-db applies it atomically                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Debt, PaymentMethod, Product, Sale, SaleItem, SaleStatus};
use crate::validation::validate_quantity;
use crate::{DEFAULT_DEBT_TERM_DAYS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Inputs
// =============================================================================

/// One cart line: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
}

impl CheckoutLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CheckoutLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Amount entered by the cashier. Stored as-is on the sale.
    pub tendered_cents: i64,
    /// Required for debt sales.
    pub customer_id: Option<String>,
    /// Debt due date. Defaults to `now + DEFAULT_DEBT_TERM_DAYS`.
    #[ts(as = "Option<String>")]
    pub due_at: Option<DateTime<Utc>>,
}

impl PaymentDetails {
    pub fn cash(tendered_cents: i64) -> Self {
        PaymentDetails {
            method: PaymentMethod::Cash,
            tendered_cents,
            customer_id: None,
            due_at: None,
        }
    }

    pub fn card(amount_cents: i64) -> Self {
        PaymentDetails {
            method: PaymentMethod::Card,
            tendered_cents: amount_cents,
            customer_id: None,
            due_at: None,
        }
    }

    pub fn debt(customer_id: impl Into<String>) -> Self {
        PaymentDetails {
            method: PaymentMethod::Debt,
            tendered_cents: 0,
            customer_id: Some(customer_id.into()),
            due_at: None,
        }
    }

    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Customer id with blank strings treated as absent.
    pub fn customer(&self) -> Option<&str> {
        self.customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A resolved sale line with its price frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub subtotal_cents: i64,
}

/// Everything checkout is about to write, minus the invoice number.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub sale_id: String,
    pub method: PaymentMethod,
    pub customer_id: Option<String>,
    pub lines: Vec<PlannedLine>,
    pub total: Money,
    pub tendered: Money,
    pub paid: Money,
    pub remaining: Money,
    pub change: Money,
    /// Set for debt sales only.
    pub due_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// The rows produced from a plan once an invoice number is assigned.
#[derive(Debug, Clone)]
pub struct SaleRecords {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub debt: Option<Debt>,
}

impl CheckoutPlan {
    pub fn status(&self) -> SaleStatus {
        if self.method.is_immediate() {
            SaleStatus::Completed
        } else {
            SaleStatus::Pending
        }
    }

    /// Builds the sale, its items and the debt (for credit sales).
    pub fn into_records(self, tenant_id: &str, invoice_number: String) -> SaleRecords {
        let status = self.status();
        let now = self.now;

        let items = self
            .lines
            .iter()
            .enumerate()
            .map(|(position, line)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: self.sale_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name_snapshot.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                subtotal_cents: line.subtotal_cents,
                position: position as i64,
            })
            .collect();

        let debt = match (self.due_at, &self.customer_id) {
            (Some(due_at), Some(customer_id)) if self.method == PaymentMethod::Debt => Some(Debt {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                sale_id: self.sale_id.clone(),
                customer_id: customer_id.clone(),
                amount_cents: self.remaining.cents(),
                due_at,
                settled: false,
                settlement: None,
                created_at: now,
                updated_at: now,
                settled_at: None,
            }),
            _ => None,
        };

        let sale = Sale {
            id: self.sale_id,
            tenant_id: tenant_id.to_string(),
            customer_id: self.customer_id,
            invoice_number,
            payment_method: self.method,
            status,
            total_cents: self.total.cents(),
            tendered_cents: self.tendered.cents(),
            paid_cents: self.paid.cents(),
            remaining_cents: self.remaining.cents(),
            change_cents: self.change.cents(),
            created_at: now,
            updated_at: now,
            completed_at: (status == SaleStatus::Completed).then_some(now),
            cancelled_at: None,
        };

        SaleRecords { sale, items, debt }
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Validates a checkout and computes what it will write.
///
/// `products` must contain the current rows for the products referenced by
/// `lines` (extra rows are ignored). Nothing is mutated; on error no part
/// of the sale may be applied.
pub fn plan_checkout(
    lines: &[CheckoutLine],
    products: &[Product],
    payment: &PaymentDetails,
    now: DateTime<Utc>,
) -> CoreResult<CheckoutPlan> {
    // 1. Shape
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
    }
    for line in lines {
        if line.quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: line.quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_quantity(line.quantity)?;
    }
    if payment.tendered_cents < 0 {
        return Err(CoreError::invalid_amount("tendered amount cannot be negative"));
    }

    let customer_id = payment.customer().map(str::to_string);
    if payment.method == PaymentMethod::Debt && customer_id.is_none() {
        return Err(CoreError::MissingCustomerForDebt);
    }

    let due_at = match payment.method {
        PaymentMethod::Debt => {
            let due_at = payment
                .due_at
                .unwrap_or_else(|| now + Duration::days(DEFAULT_DEBT_TERM_DAYS));
            if due_at < now {
                return Err(ValidationError::InvalidFormat {
                    field: "due date".to_string(),
                    reason: "must not be in the past".to_string(),
                }
                .into());
            }
            Some(due_at)
        }
        _ => None,
    };

    // 2. Resolve and merge, keeping first-seen order
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut merged: Vec<(&Product, i64)> = Vec::with_capacity(lines.len());
    for line in lines {
        let product = by_id
            .get(line.product_id.as_str())
            .copied()
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        match merged.iter_mut().find(|(p, _)| p.id == product.id) {
            Some((_, qty)) => *qty += line.quantity,
            None => merged.push((product, line.quantity)),
        }
    }

    // 3. Stock, all lines before any write
    for (product, qty) in &merged {
        if !product.can_sell(*qty) {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock,
                requested: *qty,
            });
        }
    }

    // 4. Totals, refusing anything that would not fit in i64
    let overflow = || CoreError::invalid_amount("sale total is too large");
    let mut planned: Vec<PlannedLine> = Vec::with_capacity(merged.len());
    let mut total = Money::zero();
    for (product, qty) in merged {
        let subtotal = product
            .price()
            .checked_mul_quantity(qty)
            .ok_or_else(overflow)?;
        total = total.checked_add(subtotal).ok_or_else(overflow)?;
        planned.push(PlannedLine {
            product_id: product.id.clone(),
            name_snapshot: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity: qty,
            subtotal_cents: subtotal.cents(),
        });
    }
    let tendered = Money::from_cents(payment.tendered_cents);

    let (paid, remaining, change) = if payment.method.is_immediate() {
        if tendered < total {
            return Err(CoreError::InsufficientPayment {
                total_cents: total.cents(),
                tendered_cents: tendered.cents(),
            });
        }
        (total, Money::zero(), tendered - total)
    } else {
        // A debt of nothing could never be settled by a payment
        if !total.is_positive() {
            return Err(CoreError::invalid_amount("a credit sale needs a total above zero"));
        }
        (Money::zero(), total, Money::zero())
    };

    Ok(CheckoutPlan {
        sale_id: Uuid::new_v4().to_string(),
        method: payment.method,
        customer_id,
        lines: planned,
        total,
        tendered,
        paid,
        remaining,
        change,
        due_at,
        now,
    })
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// Formats `INV-YYYYMMDD-NNNN`, where `sequence` is the 1-based count of
/// the tenant's sales on that day.
///
/// ```rust
/// use chrono::NaiveDate;
/// use kassa_core::checkout::format_invoice_number;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(format_invoice_number(day, 7), "INV-20240309-0007");
/// ```
pub fn format_invoice_number(day: NaiveDate, sequence: i64) -> String {
    format!("INV-{}-{:04}", day.format("%Y%m%d"), sequence)
}

/// Prefix shared by every invoice of `day`, used to count them.
pub fn invoice_prefix(day: NaiveDate) -> String {
    format!("INV-{}-", day.format("%Y%m%d"))
}

// =============================================================================
// Unit Tests
// =============================================================================
