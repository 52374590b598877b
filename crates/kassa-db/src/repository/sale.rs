//! # Sale Repository
//!
//! Read side of sales. Sales are written only by the [`crate::Ledger`],
//! which owns the checkout and cancellation transactions.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sale Lifecycle                                   │
//! │                                                                         │
//! │   Ledger::checkout                                                     │
//! │      │                                                                  │
//! │      ├── cash / card ──► COMPLETED ───────────────┐                    │
//! │      │                                            │ Ledger::cancel_sale│
//! │      └── debt ────────► PENDING ──(paid off)──►   ├──► CANCELLED       │
//! │                            │        COMPLETED ────┘                    │
//! │                            └──────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use kassa_core::{Sale, SaleDetail, SaleFilter, SaleItem, TenantId};

use crate::error::DbResult;
use crate::repository::{customer, debt};

pub(crate) const SALE_COLUMNS: &str = "id, tenant_id, customer_id, invoice_number, payment_method, \
     status, total_cents, tendered_cents, paid_cents, remaining_cents, change_cents, \
     created_at, updated_at, completed_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, name_snapshot, unit_price_cents, quantity, \
     subtotal_cents, position";

/// Upper bound on rows returned by [`SaleRepository::list`].
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl SaleRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        SaleRepository { pool, tenant_id }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        fetch(&self.pool, &self.tenant_id, id).await
    }

    /// Lines of a sale in cart order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        fetch_items(&self.pool, &self.tenant_id, sale_id).await
    }

    /// The sale with its items, customer and debt.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;

        let Some(sale) = fetch(&mut *conn, &self.tenant_id, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut *conn, &self.tenant_id, id).await?;
        let customer = match &sale.customer_id {
            Some(customer_id) => customer::fetch(&mut *conn, &self.tenant_id, customer_id).await?,
            None => None,
        };
        let debt = debt::fetch_by_sale(&mut *conn, &self.tenant_id, id).await?;

        Ok(Some(SaleDetail {
            sale,
            items,
            customer,
            debt,
        }))
    }

    /// Lists sales newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SALE_COLUMNS} FROM sales WHERE tenant_id = "));
        qb.push_bind(self.tenant_id.as_str());

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(method) = filter.payment_method {
            qb.push(" AND payment_method = ").push_bind(method);
        }
        if let Some(customer_id) = &filter.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(range) = &filter.created {
            if let Some(from) = range.from {
                qb.push(" AND julianday(created_at) >= julianday(")
                    .push_bind(from)
                    .push(")");
            }
            if let Some(to) = range.to {
                qb.push(" AND julianday(created_at) < julianday(")
                    .push_bind(to)
                    .push(")");
            }
        }

        let limit = filter.limit.unwrap_or(100).min(MAX_LIST_LIMIT);
        qb.push(" ORDER BY created_at DESC, invoice_number DESC LIMIT ")
            .push_bind(limit);

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        Ok(sales)
    }
}

// =============================================================================
// Executor-generic helpers (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ? AND tenant_id = ?");

    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .bind(tenant_id.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(sale)
}

pub(crate) async fn fetch_items<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    sale_id: &str,
) -> DbResult<Vec<SaleItem>> {
    // Items carry no tenant column; scope through the owning sale
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items \
         WHERE sale_id = (SELECT id FROM sales WHERE id = ? AND tenant_id = ?) \
         ORDER BY position"
    );

    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .bind(tenant_id.as_str())
        .fetch_all(executor)
        .await?;

    Ok(items)
}

pub(crate) async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sales (id, tenant_id, customer_id, invoice_number, payment_method, status, \
         total_cents, tendered_cents, paid_cents, remaining_cents, change_cents, \
         created_at, updated_at, completed_at, cancelled_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&sale.id)
    .bind(&sale.tenant_id)
    .bind(&sale.customer_id)
    .bind(&sale.invoice_number)
    .bind(sale.payment_method)
    .bind(sale.status)
    .bind(sale.total_cents)
    .bind(sale.tendered_cents)
    .bind(sale.paid_cents)
    .bind(sale.remaining_cents)
    .bind(sale.change_cents)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.completed_at)
    .bind(sale.cancelled_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item<'e, E: SqliteExecutor<'e>>(
    executor: E,
    item: &SaleItem,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sale_items (id, sale_id, product_id, name_snapshot, unit_price_cents, \
         quantity, subtotal_cents, position) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.subtotal_cents)
    .bind(item.position)
    .execute(executor)
    .await?;

    Ok(())
}

/// Number of invoices already issued with `prefix` (one day) in the tenant.
pub(crate) async fn count_invoices<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    prefix: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales WHERE tenant_id = ? AND substr(invoice_number, 1, ?) = ?",
    )
    .bind(tenant_id.as_str())
    .bind(prefix.len() as i64)
    .bind(prefix)
    .fetch_one(executor)
    .await?;

    Ok(count)
}
