//! # Product Commands
//!
//! Product search, catalogue maintenance and restocking.
//!
//! ## Search Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Product Search Flow                                  │
//! │                                                                         │
//! │  Cashier types "cola"                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_search_query (trim, length cap)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  products().search("cola", limit)                                      │
//! │       │   active products of this tenant, name LIKE %cola%             │
//! │       ▼                                                                 │
//! │  Vec<ProductDto> to the product grid                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a product only hides it; past sales keep their snapshot of its
//! name and price.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use kassa_core::validation::{
    validate_price_cents, validate_product_name, validate_search_query, validate_stock,
};
use kassa_core::{CoreError, Product};
use kassa_db::{NewProduct, ProductUpdate};

use super::page_size;
use crate::error::ApiError;
use crate::state::DbState;

/// Product as the front end sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
    pub image_path: Option<String>,
    pub is_active: bool,
    /// Used by the front end to grey out sold-out tiles.
    pub in_stock: bool,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            in_stock: p.can_sell(1),
            id: p.id,
            category_id: p.category_id,
            name: p.name,
            price_cents: p.price_cents,
            stock: p.stock,
            image_path: p.image_path,
            is_active: p.is_active,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
    pub category_id: Option<String>,
    pub image_path: Option<String>,
}

/// Partial product update.
///
/// For `categoryId` and `imagePath` an absent key leaves the field alone
/// and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "super::present")]
    pub category_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::present")]
    pub image_path: Option<Option<String>>,
}

/// Searches active products by name.
///
/// ## Arguments
/// * `query` - Part of the product name; empty lists the first page
/// * `limit` - Maximum results to return (default: 20, max: 100)
pub async fn search_products(
    db: &DbState,
    query: &str,
    limit: Option<u32>,
) -> Result<Vec<ProductDto>, ApiError> {
    let start = Instant::now();
    let query = validate_search_query(query)?;
    let limit = page_size(limit);

    debug!(query = %query, limit = %limit, "search_products command");

    let products = db.shop().products().search(&query, limit).await?;
    let dtos: Vec<ProductDto> = products.into_iter().map(ProductDto::from).collect();

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        count = dtos.len(),
        query = %query,
        "search_products complete"
    );

    Ok(dtos)
}

/// Lists active products, optionally only those of one category.
pub async fn list_products(
    db: &DbState,
    category_id: Option<&str>,
) -> Result<Vec<ProductDto>, ApiError> {
    debug!(category_id = ?category_id, "list_products command");
    let products = db.shop().products().list(category_id).await?;
    Ok(products.into_iter().map(ProductDto::from).collect())
}

pub async fn get_product(db: &DbState, id: &str) -> Result<ProductDto, ApiError> {
    debug!(id = %id, "get_product command");
    let product = db
        .shop()
        .products()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;
    Ok(ProductDto::from(product))
}

pub async fn create_product(
    db: &DbState,
    request: CreateProductRequest,
) -> Result<ProductDto, ApiError> {
    let name = validate_product_name(&request.name)?;
    validate_price_cents(request.price_cents)?;
    validate_stock(request.stock)?;

    let shop = db.shop();
    if let Some(category_id) = &request.category_id {
        ensure_category(db, category_id).await?;
    }

    let product = shop
        .products()
        .insert(NewProduct {
            name,
            price_cents: request.price_cents,
            stock: request.stock,
            category_id: request.category_id,
            image_path: request.image_path,
        })
        .await?;

    info!(id = %product.id, name = %product.name, "Product created");
    Ok(ProductDto::from(product))
}

/// Changes name, price, category or picture. Stock is changed only through
/// [`restock_product`] and sales.
pub async fn update_product(
    db: &DbState,
    id: &str,
    request: UpdateProductRequest,
) -> Result<ProductDto, ApiError> {
    let name = request
        .name
        .as_deref()
        .map(validate_product_name)
        .transpose()?;
    if let Some(price_cents) = request.price_cents {
        validate_price_cents(price_cents)?;
    }
    if let Some(Some(category_id)) = &request.category_id {
        ensure_category(db, category_id).await?;
    }

    let product = db
        .shop()
        .products()
        .update(
            id,
            ProductUpdate {
                name,
                price_cents: request.price_cents,
                category_id: request.category_id,
                image_path: request.image_path,
            },
        )
        .await?;

    info!(id = %product.id, price_cents = product.price_cents, "Product updated");
    Ok(ProductDto::from(product))
}

/// Adds (or, with a negative `delta`, removes) units on hand.
pub async fn restock_product(db: &DbState, id: &str, delta: i64) -> Result<ProductDto, ApiError> {
    if delta == 0 {
        return Err(CoreError::invalid_amount("stock change cannot be zero").into());
    }

    let product = db.shop().products().adjust_stock(id, delta).await?;
    info!(id = %product.id, delta, stock = product.stock, "Stock adjusted");
    Ok(ProductDto::from(product))
}

pub async fn delete_product(db: &DbState, id: &str) -> Result<(), ApiError> {
    db.shop().products().soft_delete(id).await?;
    info!(id = %id, "Product deactivated");
    Ok(())
}

async fn ensure_category(db: &DbState, category_id: &str) -> Result<(), ApiError> {
    db.shop()
        .categories()
        .get(category_id)
        .await?
        .ok_or_else(|| CoreError::CategoryNotFound(category_id.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::AppContext;

    fn cola() -> CreateProductRequest {
        CreateProductRequest {
            name: "  Coca-Cola 330ml ".into(),
            price_cents: 120,
            stock: 24,
            category_id: None,
            image_path: None,
        }
    }

    #[tokio::test]
    async fn test_create_search_and_restock() {
        let ctx = AppContext::in_memory().await.unwrap();

        let created = create_product(&ctx.db, cola()).await.unwrap();
        assert_eq!(created.name, "Coca-Cola 330ml");
        assert!(created.in_stock);

        let found = search_products(&ctx.db, "cola", None).await.unwrap();
        assert_eq!(found.len(), 1);

        let restocked = restock_product(&ctx.db, &created.id, 6).await.unwrap();
        assert_eq!(restocked.stock, 30);

        let err = restock_product(&ctx.db, &created.id, -31).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(get_product(&ctx.db, &created.id).await.unwrap().stock, 30);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let ctx = AppContext::in_memory().await.unwrap();

        let mut request = cola();
        request.price_cents = -1;
        let err = create_product(&ctx.db, request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut request = cola();
        request.category_id = Some("no-such-category".into());
        let err = create_product(&ctx.db, request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        assert!(list_products(&ctx.db, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_distinguishes_absent_from_null() {
        let ctx = AppContext::in_memory().await.unwrap();
        let mut request = cola();
        request.image_path = Some("cola.png".into());
        let created = create_product(&ctx.db, request).await.unwrap();

        let untouched: UpdateProductRequest =
            serde_json::from_str(r#"{ "priceCents": 150 }"#).unwrap();
        let updated = update_product(&ctx.db, &created.id, untouched).await.unwrap();
        assert_eq!(updated.price_cents, 150);
        assert_eq!(updated.image_path.as_deref(), Some("cola.png"));

        let cleared: UpdateProductRequest =
            serde_json::from_str(r#"{ "imagePath": null }"#).unwrap();
        let updated = update_product(&ctx.db, &created.id, cleared).await.unwrap();
        assert_eq!(updated.image_path, None);
    }

    #[tokio::test]
    async fn test_deleted_products_leave_search() {
        let ctx = AppContext::in_memory().await.unwrap();
        let created = create_product(&ctx.db, cola()).await.unwrap();

        delete_product(&ctx.db, &created.id).await.unwrap();

        assert!(search_products(&ctx.db, "cola", None).await.unwrap().is_empty());
        let err = delete_product(&ctx.db, "missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
