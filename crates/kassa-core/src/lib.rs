//! # kassa-core: Pure Business Logic for Kassa POS
//!
//! This crate holds the sale/debt rules of the back office as pure
//! functions. Nothing here touches a database, a clock or the network;
//! callers pass `now` in explicitly.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kassa POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web front end                                │   │
//! │  │    Cart screen ──► Debts screen ──► Reports screen              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kassa-backoffice (commands)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kassa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  money   │ │ checkout │ │   debt   │          │   │
//! │  │   │ Product  │ │  Money   │ │   plan   │ │ balance  │          │   │
//! │  │   │ Sale     │ │          │ │  lines   │ │ overdue  │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kassa-db (Database Layer)                    │   │
//! │  │          SQLite transactions, tenant-scoped repositories        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Debt, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and their taxonomy
//! - [`validation`] - Input validation
//! - [`checkout`] - Turning a cart into a sale plan
//! - [`debt`] - Payment application, settlement and overdue tracking
//! - [`report`] - Dashboard figures
//!
//! ## Example Usage
//!
//! ```rust
//! use kassa_core::money::Money;
//!
//! let price = Money::from_cents(2500);
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 5000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod debt;
pub mod error;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant used by development builds and the seed binary.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Days until a credit sale is due when the cashier does not pick a date.
pub const DEFAULT_DEBT_TERM_DAYS: i64 = 30;

/// Seconds between two overdue-debt checks.
pub const OVERDUE_POLL_INTERVAL_SECS: u64 = 60;

/// Maximum distinct products in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Highest unit price a product may carry (one billion in major units).
///
/// Keeps every line and sale total far inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Maximum quantity of a single product in one sale.
///
/// ## Business Reason
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
