//! # Customer Repository
//!
//! Customers exist so credit sales have someone to owe the money. The
//! phone number is the business key and is unique per tenant.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use kassa_core::{CoreError, Customer, TenantId};

use crate::error::{DbError, DbResult, LedgerResult};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, phone, created_at";

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    /// Already normalized (see `kassa_core::validation::validate_phone`).
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl CustomerRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        CustomerRepository { pool, tenant_id }
    }

    /// Inserts a customer. A phone already used in this tenant yields
    /// `DbError::UniqueViolation { field: "phone", .. }`.
    pub async fn insert(&self, new: NewCustomer) -> DbResult<Customer> {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.to_string(),
            name: new.name,
            phone: new.phone,
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            "INSERT INTO customers (id, tenant_id, name, phone, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| phone_conflict(e, &customer.phone))?;

        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        fetch(&self.pool, &self.tenant_id, id).await
    }

    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let sql =
            format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone = ? AND tenant_id = ?");

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(phone)
            .bind(self.tenant_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Lists customers by name. `search` matches name or phone.
    pub async fn list(&self, search: Option<&str>) -> DbResult<Vec<Customer>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE tenant_id = ? AND (? IS NULL OR name LIKE ? OR phone LIKE ?) \
             ORDER BY name COLLATE NOCASE"
        );

        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(self.tenant_id.as_str())
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    pub async fn update(&self, id: &str, name: &str, phone: &str) -> DbResult<Customer> {
        debug!(id = %id, "Updating customer");

        let result =
            sqlx::query("UPDATE customers SET name = ?, phone = ? WHERE id = ? AND tenant_id = ?")
                .bind(name)
                .bind(phone)
                .bind(id)
                .bind(self.tenant_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| phone_conflict(e, phone))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Deletes a customer with no sales history.
    ///
    /// Refused with `CustomerHasSales` while any sale (in any status)
    /// references the customer.
    pub async fn delete(&self, id: &str) -> LedgerResult<()> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let sales: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE customer_id = ? AND tenant_id = ?")
                .bind(id)
                .bind(self.tenant_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        if sales > 0 {
            warn!(customer_id = %id, sales, "Refusing to delete customer with sales");
            return Err(CoreError::CustomerHasSales {
                customer_id: id.to_string(),
                sales,
            }
            .into());
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(self.tenant_id.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::CustomerNotFound(id.to_string()).into());
        }

        tx.commit().await?;
        debug!(customer_id = %id, "Customer deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE tenant_id = ?")
            .bind(self.tenant_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

pub(crate) async fn fetch<'e, E: sqlx::SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
) -> DbResult<Option<Customer>> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ? AND tenant_id = ?");

    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(id)
        .bind(tenant_id.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(customer)
}

fn phone_conflict(err: sqlx::Error, phone: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("phone", phone),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_phone_is_unique_per_tenant() {
        let (db, shop) = fixtures::shop().await;
        fixtures::customer(&shop, "Amina", "0712345678").await;

        let dup = shop
            .customers()
            .insert(NewCustomer {
                name: "Someone Else".into(),
                phone: "0712345678".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(dup, DbError::UniqueViolation { ref field, .. } if field == "phone"));

        // A different shop may register the same number
        let other = db.tenant(TenantId::new("another-shop"));
        fixtures::customer(&other, "Amina", "0712345678").await;
        assert_eq!(shop.customers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_and_update() {
        let (_db, shop) = fixtures::shop().await;
        let amina = fixtures::customer(&shop, "Amina", "0712345678").await;
        fixtures::customer(&shop, "Brian", "0799000111").await;

        let found = shop.customers().get_by_phone("0712345678").await.unwrap().unwrap();
        assert_eq!(found.id, amina.id);
        assert_eq!(shop.customers().list(Some("bri")).await.unwrap().len(), 1);
        assert_eq!(shop.customers().list(None).await.unwrap().len(), 2);

        let updated = shop
            .customers()
            .update(&amina.id, "Amina W.", "0712000000")
            .await
            .unwrap();
        assert_eq!(updated.name, "Amina W.");
        assert_eq!(updated.phone, "0712000000");
    }

    #[tokio::test]
    async fn test_delete_without_sales() {
        let (_db, shop) = fixtures::shop().await;
        let amina = fixtures::customer(&shop, "Amina", "0712345678").await;

        shop.customers().delete(&amina.id).await.unwrap();
        assert!(shop.customers().get(&amina.id).await.unwrap().is_none());

        let again = shop.customers().delete(&amina.id).await.unwrap_err();
        assert!(matches!(again, LedgerError::Rejected(CoreError::CustomerNotFound(_))));
    }
}
