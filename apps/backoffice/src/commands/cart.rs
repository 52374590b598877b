//! # Cart Commands
//!
//! Commands for building up a sale before checkout.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Lifecycle                                       │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐       │
//! │  │  Empty   │────►│ In Cart  │────►│  Tender  │────►│   Sale   │       │
//! │  │  Cart    │     │          │     │  / Debt  │     │ recorded │       │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘       │
//! │                        │                 │                              │
//! │                   add_to_cart        checkout                          │
//! │                   update_cart_item   (sale.rs)                         │
//! │                   remove_from_cart                                      │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   clear_cart ──────────────────────►                   │
//! │                                                      (back to empty)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::{Cart, CartItem, CartState, CartTotals, DbState};

/// Cart response including items and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        CartResponse {
            items: cart.items.clone(),
            totals: CartTotals::from(cart),
        }
    }
}

pub fn get_cart(cart: &CartState) -> CartResponse {
    debug!("get_cart command");
    cart.with_cart(|c| CartResponse::from(c))
}

/// Adds a product to the cart.
///
/// ## Behavior
/// - If product already in cart: quantity increases
/// - If product not in cart: added as new item
/// - Refused when the product is inactive or the new quantity exceeds
///   the stock on hand
///
/// ## Arguments
/// * `product_id` - Product UUID to add
/// * `quantity` - Quantity to add (default: 1)
pub async fn add_to_cart(
    db: &DbState,
    cart: &CartState,
    product_id: &str,
    quantity: Option<i64>,
) -> Result<CartResponse, ApiError> {
    let quantity = quantity.unwrap_or(1);
    debug!(product_id = %product_id, quantity = %quantity, "add_to_cart command");

    let product = db
        .shop()
        .products()
        .get(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    cart.with_cart_mut(|c| {
        c.add_item(&product, quantity)?;
        Ok(CartResponse::from(&*c))
    })
}

/// Sets the quantity of a cart line; zero removes the line.
pub async fn update_cart_item(
    db: &DbState,
    cart: &CartState,
    product_id: &str,
    quantity: i64,
) -> Result<CartResponse, ApiError> {
    debug!(product_id = %product_id, quantity = %quantity, "update_cart_item command");

    let product = db
        .shop()
        .products()
        .get(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    cart.with_cart_mut(|c| {
        c.update_quantity(&product, quantity)?;
        Ok(CartResponse::from(&*c))
    })
}

pub fn remove_from_cart(cart: &CartState, product_id: &str) -> Result<CartResponse, ApiError> {
    debug!(product_id = %product_id, "remove_from_cart command");

    cart.with_cart_mut(|c| {
        c.remove_item(product_id)?;
        Ok(CartResponse::from(&*c))
    })
}

pub fn clear_cart(cart: &CartState) -> CartResponse {
    debug!("clear_cart command");

    cart.with_cart_mut(|c| {
        c.clear();
        CartResponse::from(&*c)
    })
}
