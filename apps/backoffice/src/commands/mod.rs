//! # Commands Module
//!
//! Every operation a front end can invoke on the back office.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports)
//! ├── product.rs   ◄─── Product search, CRUD, restock
//! ├── category.rs  ◄─── Category CRUD
//! ├── customer.rs  ◄─── Customer CRUD
//! ├── cart.rs      ◄─── Cart manipulation
//! ├── sale.rs      ◄─── Checkout, cancellation, invoices, sales history
//! ├── debt.rs      ◄─── Debt listing and payments
//! ├── report.rs    ◄─── Dashboard figures
//! └── config.rs    ◄─── Shop settings
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Command Flow                                         │
//! │                                                                         │
//! │  Front end                                                              │
//! │  ─────────                                                              │
//! │  invoke('add_to_cart', { productId: 'xxx', quantity: 2 })               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  pub async fn add_to_cart(                                              │
//! │      db: &DbState,            ◄── from AppContext                       │
//! │      cart: &CartState,        ◄── from AppContext                       │
//! │      product_id: &str,        ◄── from invoke params                    │
//! │      quantity: Option<i64>,   ◄── optional param                        │
//! │  ) -> Result<CartResponse, ApiError>                                    │
//! │         │                                                               │
//! │         ▼ (JSON serialization, camelCase)                               │
//! │  Front end receives: CartResponse or { code, message }                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Injection
//! Each command declares only the state it needs:
//! ```rust,ignore
//! // Only needs database
//! search_products(&ctx.db, "cola", None).await?;
//!
//! // Only needs cart
//! get_cart(&ctx.cart);
//!
//! // Needs database, cart, settings and the notifier
//! checkout(&ctx.db, &ctx.cart, &ctx.config, &ctx.notifier, request).await?;
//! ```

use serde::{Deserialize, Deserializer};

pub mod cart;
pub mod category;
pub mod config;
pub mod customer;
pub mod debt;
pub mod product;
pub mod report;
pub mod sale;

/// Default and maximum page sizes for listing commands.
pub(crate) const DEFAULT_LIMIT: u32 = 20;
pub(crate) const MAX_LIMIT: u32 = 100;

pub(crate) fn page_size(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Deserializes a field that may be absent, `null`, or set.
///
/// Paired with `#[serde(default)]`: absent gives `None`, `null` gives
/// `Some(None)`, a value gives `Some(Some(v))`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
