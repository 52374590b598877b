//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD with soft delete (`is_active = 0`)
//! - Case-insensitive name search
//! - Stock adjustments that can never drive stock below zero
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, compute, write back                               │
//! │     SELECT stock ...        (two tills both read 5)                │
//! │     UPDATE ... SET stock = 2                                       │
//! │                                                                     │
//! │  ✅ CORRECT: one conditional delta update                          │
//! │     UPDATE products SET stock = stock - 3                          │
//! │     WHERE id = ? AND tenant_id = ? AND stock >= 3                  │
//! │                                                                     │
//! │  0 rows affected ⇒ not enough stock, nothing changed               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use kassa_core::{CoreError, Product, TenantId};

use crate::error::{DbError, DbResult, LedgerError, LedgerResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, tenant_id, category_id, name, price_cents, stock, \
     image_path, is_active, created_at, updated_at";

/// Fields of a product to create.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category_id: Option<String>,
    pub image_path: Option<String>,
}

/// Partial update. `None` leaves a field unchanged; for the nullable
/// fields `Some(None)` clears them.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<Option<String>>,
    pub image_path: Option<Option<String>>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl ProductRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        ProductRepository { pool, tenant_id }
    }

    /// Gets a product by id, active or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        fetch(&self.pool, &self.tenant_id, id).await
    }

    /// Lists active products by name, optionally limited to one category.
    pub async fn list(&self, category_id: Option<&str>) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ? AND is_active = 1 AND (? IS NULL OR category_id = ?) \
             ORDER BY name COLLATE NOCASE"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(self.tenant_id.as_str())
            .bind(category_id)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Searches active products whose name contains `query`
    /// (case-insensitive). An empty query lists the first `limit` products.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", escape_like(query));
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ? AND is_active = 1 AND name LIKE ? ESCAPE '\\' \
             ORDER BY name COLLATE NOCASE \
             LIMIT ?"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(self.tenant_id.as_str())
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Inserts a new product and returns it.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.to_string(),
            category_id: new.category_id,
            name: new.name,
            price_cents: new.price_cents,
            stock: new.stock,
            image_path: new.image_path,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            "INSERT INTO products (id, tenant_id, category_id, name, price_cents, stock, \
             image_path, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.image_path)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Applies a partial update and returns the new row.
    pub async fn update(&self, id: &str, changes: ProductUpdate) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        let mut product = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(price_cents) = changes.price_cents {
            product.price_cents = price_cents;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = category_id;
        }
        if let Some(image_path) = changes.image_path {
            product.image_path = image_path;
        }
        product.updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET name = ?, price_cents = ?, category_id = ?, image_path = ?, \
             updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.category_id)
        .bind(&product.image_path)
        .bind(product.updated_at)
        .bind(id)
        .bind(self.tenant_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(product)
    }

    /// Adds `delta` units (negative to remove) without ever going below
    /// zero. Used for restocking and stock corrections.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> LedgerResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let result = sqlx::query(
            "UPDATE products SET stock = stock + ?, updated_at = ? \
             WHERE id = ? AND tenant_id = ? AND stock + ? >= 0",
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .bind(self.tenant_id.as_str())
        .bind(delta)
        .execute(&self.pool)
        .await?;

        let product = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Rejected(CoreError::InsufficientStock {
                product: product.name,
                available: product.stock,
                requested: -delta,
            }));
        }

        Ok(product)
    }

    /// Hides a product from listings and checkout. Sales history keeps
    /// pointing at it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(self.tenant_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Number of active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ? AND is_active = 1",
        )
        .bind(self.tenant_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-generic helpers (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND tenant_id = ?");

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .bind(tenant_id.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(product)
}

/// Removes `quantity` units if at least that many are on hand.
/// Returns `false` (and changes nothing) otherwise.
pub(crate) async fn take_stock<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - ?, updated_at = ? \
         WHERE id = ? AND tenant_id = ? AND stock >= ?",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .bind(tenant_id.as_str())
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn return_stock<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
    quantity: i64,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE products SET stock = stock + ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .bind(tenant_id.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_insert_get_and_search() {
        let (_db, shop) = fixtures::shop().await;
        let rice = fixtures::product(&shop, "Rice 5kg", 1500, 10).await;
        fixtures::product(&shop, "Brown Rice 2kg", 900, 3).await;
        fixtures::product(&shop, "Sugar 1kg", 300, 8).await;

        let fetched = shop.products().get(&rice.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Rice 5kg");
        assert_eq!(fetched.stock, 10);
        assert!(fetched.is_active);

        let hits = shop.products().search("RICE", 20).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(shop.products().search("", 2).await.unwrap().len(), 2);
        assert!(shop.products().search("100%", 20).await.unwrap().is_empty());
        assert_eq!(shop.products().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_soft_delete() {
        let (_db, shop) = fixtures::shop().await;
        let oil = fixtures::product(&shop, "Oil 1L", 800, 5).await;

        let updated = shop
            .products()
            .update(
                &oil.id,
                ProductUpdate {
                    price_cents: Some(850),
                    image_path: Some(Some("oil.png".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 850);
        assert_eq!(updated.name, "Oil 1L");
        assert_eq!(updated.image_path.as_deref(), Some("oil.png"));

        shop.products().soft_delete(&oil.id).await.unwrap();
        assert!(shop.products().list(None).await.unwrap().is_empty());
        assert!(!shop.products().get(&oil.id).await.unwrap().unwrap().is_active);

        let missing = shop.products().soft_delete("nope").await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_adjust_stock_never_negative() {
        let (_db, shop) = fixtures::shop().await;
        let salt = fixtures::product(&shop, "Salt", 100, 2).await;

        let restocked = shop.products().adjust_stock(&salt.id, 5).await.unwrap();
        assert_eq!(restocked.stock, 7);

        let err = shop.products().adjust_stock(&salt.id, -8).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(CoreError::InsufficientStock { available: 7, requested: 8, .. })
        ));
        assert_eq!(shop.products().get(&salt.id).await.unwrap().unwrap().stock, 7);
    }

    #[tokio::test]
    async fn test_other_tenant_sees_nothing() {
        let (db, shop) = fixtures::shop().await;
        let rice = fixtures::product(&shop, "Rice", 1500, 10).await;

        let other = db.tenant(TenantId::new("another-shop"));
        assert!(other.products().get(&rice.id).await.unwrap().is_none());
        assert!(other.products().search("Rice", 10).await.unwrap().is_empty());
        assert!(other.products().soft_delete(&rice.id).await.is_err());
        assert!(shop.products().get(&rice.id).await.unwrap().unwrap().is_active);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
