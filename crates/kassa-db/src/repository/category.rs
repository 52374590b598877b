//! # Category Repository
//!
//! Categories are plain labels. Deleting one leaves its products in place
//! with no category (`ON DELETE SET NULL`).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use kassa_core::{Category, TenantId};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl CategoryRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        CategoryRepository { pool, tenant_id }
    }

    /// Creates a category. Names are unique per tenant
    /// (`DbError::UniqueViolation` otherwise).
    pub async fn insert(&self, name: &str) -> DbResult<Category> {
        let category = Category {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, tenant_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&category.id)
            .bind(&category.tenant_id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                    field,
                    value: name.to_string(),
                },
                other => other,
            })?;

        Ok(category)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name, created_at FROM categories WHERE id = ? AND tenant_id = ?",
        )
        .bind(id)
        .bind(self.tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name, created_at FROM categories \
             WHERE tenant_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(self.tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn rename(&self, id: &str, name: &str) -> DbResult<Category> {
        debug!(id = %id, name = %name, "Renaming category");

        let result = sqlx::query("UPDATE categories SET name = ? WHERE id = ? AND tenant_id = ?")
            .bind(name)
            .bind(id)
            .bind(self.tenant_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting category");

        let result = sqlx::query("DELETE FROM categories WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(self.tenant_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::{fixtures, ProductUpdate};

    #[tokio::test]
    async fn test_category_lifecycle() {
        let (_db, shop) = fixtures::shop().await;
        let drinks = shop.categories().insert("Drinks").await.unwrap();
        shop.categories().insert("Bakery").await.unwrap();

        let names: Vec<_> = shop
            .categories()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Bakery", "Drinks"]);

        let dup = shop.categories().insert("Drinks").await.unwrap_err();
        assert!(matches!(dup, DbError::UniqueViolation { ref value, .. } if value == "Drinks"));

        let renamed = shop.categories().rename(&drinks.id, "Beverages").await.unwrap();
        assert_eq!(renamed.name, "Beverages");
    }

    #[tokio::test]
    async fn test_delete_unlinks_products() {
        let (_db, shop) = fixtures::shop().await;
        let drinks = shop.categories().insert("Drinks").await.unwrap();
        let soda = fixtures::product(&shop, "Soda", 150, 24).await;
        shop.products()
            .update(
                &soda.id,
                ProductUpdate {
                    category_id: Some(Some(drinks.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(shop.products().list(Some(&drinks.id)).await.unwrap().len(), 1);

        shop.categories().delete(&drinks.id).await.unwrap();

        let soda = shop.products().get(&soda.id).await.unwrap().unwrap();
        assert!(soda.category_id.is_none());
        assert!(shop.categories().delete(&drinks.id).await.is_err());
    }
}
