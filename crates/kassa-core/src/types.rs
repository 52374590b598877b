//! # Domain Types
//!
//! Core domain types used throughout Kassa POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │      Debt       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  category_id    │   │  invoice_number │   │  sale_id (1:1)  │       │
//! │  │  price_cents    │   │  status         │   │  amount_cents   │       │
//! │  │  stock          │   │  remaining      │   │  due_at         │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ owns                │ has many       │
//! │                        ┌────────▼────────┐   ┌────────▼────────┐       │
//! │                        │    SaleItem     │   │   DebtPayment   │       │
//! │                        │  name snapshot  │   │  amount_cents   │       │
//! │                        │  unit price     │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  SaleStatus: Pending │ Completed │ Cancelled                           │
//! │  PaymentMethod: Cash │ Card │ Debt                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tenancy
//! Every persisted row carries a `tenant_id`. The database layer only
//! hands out repositories bound to one [`TenantId`], so these types never
//! cross tenants in practice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::DEFAULT_TENANT_ID;

// =============================================================================
// Tenant
// =============================================================================

/// Identifier of the enterprise (shop) that owns a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        TenantId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        TenantId(DEFAULT_TENANT_ID.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        TenantId(id.to_string())
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product grouping, unique by name within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Optional category; cleared when the category is deleted.
    pub category_id: Option<String>,

    /// Display name shown to the cashier and on the invoice.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Reference to a product picture, if one was uploaded.
    pub image_path: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can be sold right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && quantity <= self.stock
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who can buy on credit. Phone is unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// ```text
///   cash / card ──────────────► Completed ──┐
///                                           ├──► Cancelled
///   debt ──► Pending ──(paid off)──► Completed
///               │                           │
///               └───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Credit sale with an outstanding balance.
    Pending,
    /// Fully paid.
    Completed,
    /// Reverted; stock restored and any debt written off.
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Sold on credit; creates a debt for the customer.
    Debt,
}

impl PaymentMethod {
    /// Whether the sale is paid in full at the counter.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        !matches!(self, PaymentMethod::Debt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Debt => "debt",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed, pending (credit) or cancelled sale.
///
/// ## Invariants
/// - `total_cents` equals the sum of its items' subtotals
/// - `remaining_cents == total_cents - paid_cents`
/// - `tendered_cents` is whatever the cashier entered, unmodified
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: Option<String>,
    /// `INV-YYYYMMDD-NNNN`, unique per tenant.
    pub invoice_number: String,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub tendered_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub change_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// `unit_price_cents × quantity`.
    pub subtotal_cents: i64,
    /// Order in which the line appeared in the cart.
    pub position: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A sale together with its lines and, when present, its customer and debt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub customer: Option<Customer>,
    pub debt: Option<Debt>,
}

impl SaleDetail {
    /// Sum of the item subtotals. Equal to `sale.total()` for any sale
    /// produced by checkout.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(SaleItem::subtotal).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Debt
// =============================================================================

/// How a debt left the open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DebtSettlement {
    /// Payments covered the full amount.
    Paid,
    /// The sale was cancelled while the debt was open.
    WrittenOff,
}

/// Money a customer owes for one credit sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub tenant_id: String,
    /// At most one debt per sale.
    pub sale_id: String,
    pub customer_id: String,
    /// Sale remainder at creation; never changes afterwards.
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_at: DateTime<Utc>,
    pub settled: bool,
    pub settlement: Option<DebtSettlement>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Debt {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Open and past its due date.
    #[inline]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        crate::debt::is_overdue(self.settled, self.due_at, now)
    }
}

/// One installment against a debt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtPayment {
    pub id: String,
    pub tenant_id: String,
    pub debt_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DebtPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A debt joined with who owes it and how much is left.
///
/// This is the row shape of debt listings and of the overdue watcher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtOverview {
    pub id: String,
    pub sale_id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub amount_cents: i64,
    pub paid_cents: i64,
    #[ts(as = "String")]
    pub due_at: DateTime<Utc>,
    pub settled: bool,
    pub settlement: Option<DebtSettlement>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DebtOverview {
    /// Outstanding balance, floored at zero.
    pub fn remaining(&self) -> Money {
        crate::debt::remaining(
            Money::from_cents(self.amount_cents),
            Money::from_cents(self.paid_cents),
        )
    }

    #[inline]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        crate::debt::is_overdue(self.settled, self.due_at, now)
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Half-open time window `[from, to)`. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Criteria for listing debts. All set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtFilter {
    pub settled: Option<bool>,
    /// Open and past due relative to the `now` passed to the query.
    pub overdue: Option<bool>,
    pub created: Option<DateRange>,
    pub customer_id: Option<String>,
}

impl DebtFilter {
    /// Every open debt whose due date has passed.
    pub fn overdue() -> Self {
        DebtFilter {
            overdue: Some(true),
            ..Default::default()
        }
    }
}

/// Criteria for listing sales.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<String>,
    pub created: Option<DateRange>,
    pub limit: Option<u32>,
}

// =============================================================================
// Unit Tests
// =============================================================================
