//! # Cart State
//!
//! The till's current cart. Nothing here is persisted; a cart becomes a
//! sale only through the `checkout` command.
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>` because several commands may
//! touch it at once and only one of them may change it at a time.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  Front End Action         Command                 Cart State Change     │
//! │  ────────────────         ───────                 ─────────────────     │
//! │                                                                         │
//! │  Click Product ──────────► add_to_cart() ───────► items.push(item)     │
//! │                                                                         │
//! │  Change Quantity ────────► update_cart_item() ──► items[i].qty = n     │
//! │                                                                         │
//! │  Click Remove ───────────► remove_from_cart() ──► items.remove(i)      │
//! │                                                                         │
//! │  Click Clear ────────────► clear_cart() ────────► items.clear()        │
//! │                                                                         │
//! │  Checkout succeeds ──────► checkout() ──────────► items.clear()        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is checked against the product as loaded when the line is added
//! or changed. The authoritative check happens again inside the checkout
//! transaction.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kassa_core::checkout::CheckoutLine;
use kassa_core::validation::{validate_cart_size, validate_quantity};
use kassa_core::{CoreError, Money, Product, MAX_ITEM_QUANTITY};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    #[error(transparent)]
    Rejected(#[from] CoreError),
}

/// An item in the cart.
///
/// Name and price are frozen when the product is added so the cart display
/// does not shift under the cashier. Checkout prices from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Stock on hand when the line was last checked
    pub available_stock: i64,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            available_stock: product.stock,
            added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Items are unique by `product_id` (adding the same product again
///   increases its quantity)
/// - 1 <= quantity <= min(stock, MAX_ITEM_QUANTITY)
/// - At most `MAX_CART_ITEMS` distinct products
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    /// When the cart was created or last cleared
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product, or increases its quantity if already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        if !product.is_active {
            return Err(CoreError::ProductNotFound(product.id.clone()).into());
        }

        let existing = self.items.iter().position(|i| i.product_id == product.id);
        let in_cart = existing.map_or(0, |idx| self.items[idx].quantity);
        let wanted = in_cart + quantity;

        if wanted > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: wanted,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }
        check_stock(product, wanted)?;

        match existing {
            Some(idx) => {
                let item = &mut self.items[idx];
                item.quantity = wanted;
                item.available_stock = product.stock;
            }
            None => {
                validate_cart_size(self.items.len()).map_err(CoreError::from)?;
                self.items.push(CartItem::from_product(product, quantity));
            }
        }
        Ok(())
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn update_quantity(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(&product.id);
        }
        validate_quantity(quantity).map_err(CoreError::from)?;

        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product.id)
            .ok_or_else(|| CartError::NotInCart(product.id.clone()))?;

        check_stock(product, quantity)?;
        item.quantity = quantity;
        item.available_stock = product.stock;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CartError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// Lines to hand to checkout, in cart order.
    pub fn lines(&self) -> Vec<CheckoutLine> {
        self.items
            .iter()
            .map(|i| CheckoutLine::new(&i.product_id, i.quantity))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Total at the prices shown in the cart.
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn check_stock(product: &Product, quantity: i64) -> Result<(), CartError> {
    if !product.can_sell(quantity) {
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested: quantity,
        }
        .into());
    }
    Ok(())
}

/// Cart totals summary for responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub total_cents: i64,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            total_cents: cart.total().cents(),
        }
    }
}

/// Shared cart handle.
///
/// A panic while the lock is held cannot leave the cart half-edited
/// (every edit validates before it mutates), so a poisoned lock is
/// recovered rather than propagated.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let totals = cart_state.with_cart(|c| CartTotals::from(c));
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cart)
    }
}
