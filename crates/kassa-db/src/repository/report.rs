//! # Report Repository
//!
//! Dashboard figures. Everything returned by one call comes from the same
//! read transaction, so a checkout landing mid-report cannot make revenue,
//! items sold and the best sellers disagree.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use kassa_core::report::{Dashboard, SalesSummary, TopProduct};
use kassa_core::TenantId;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl ReportRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        ReportRepository { pool, tenant_id }
    }

    /// Totals for non-cancelled sales created at or after `since`, plus
    /// the tenant's open debt position at `now`.
    pub async fn summary(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> DbResult<SalesSummary> {
        let mut tx = self.pool.begin().await?;
        let summary = summary(&mut tx, &self.tenant_id, since, now).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Best sellers by quantity among non-cancelled sales since `since`.
    pub async fn top_products(&self, since: DateTime<Utc>, limit: u32) -> DbResult<Vec<TopProduct>> {
        let mut conn = self.pool.acquire().await?;
        top_products(&mut conn, &self.tenant_id, since, limit).await
    }

    /// Summary and best sellers from a single snapshot.
    pub async fn dashboard(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        top_limit: u32,
    ) -> DbResult<Dashboard> {
        let mut tx = self.pool.begin().await?;
        let summary = summary(&mut tx, &self.tenant_id, since, now).await?;
        let top_products = top_products(&mut tx, &self.tenant_id, since, top_limit).await?;
        tx.commit().await?;

        Ok(Dashboard {
            summary,
            top_products,
        })
    }
}

async fn summary(
    conn: &mut SqliteConnection,
    tenant_id: &TenantId,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DbResult<SalesSummary> {
    let tenant = tenant_id.as_str();

    let (revenue_cents, sale_count): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM sales \
         WHERE tenant_id = ? AND status != 'cancelled' \
         AND julianday(created_at) >= julianday(?)",
    )
    .bind(tenant)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    let items_sold: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(i.quantity), 0) FROM sale_items i \
         JOIN sales s ON s.id = i.sale_id \
         WHERE s.tenant_id = ? AND s.status != 'cancelled' \
         AND julianday(s.created_at) >= julianday(?)",
    )
    .bind(tenant)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    let (outstanding_debt_cents, open_debt_count, overdue_count): (i64, i64, i64) =
        sqlx::query_as(
            "SELECT \
               COALESCE(SUM(MAX(d.amount_cents - COALESCE( \
                 (SELECT SUM(p.amount_cents) FROM debt_payments p WHERE p.debt_id = d.id), 0), 0)), 0), \
               COUNT(*), \
               COALESCE(SUM(CASE WHEN julianday(d.due_at) < julianday(?) THEN 1 ELSE 0 END), 0) \
             FROM debts d WHERE d.tenant_id = ? AND d.settled = 0",
        )
        .bind(now)
        .bind(tenant)
        .fetch_one(&mut *conn)
        .await?;

    debug!(revenue_cents, sale_count, overdue_count, "Computed sales summary");

    Ok(SalesSummary {
        since,
        revenue_cents,
        sale_count,
        items_sold,
        outstanding_debt_cents,
        open_debt_count,
        overdue_count,
    })
}

async fn top_products(
    conn: &mut SqliteConnection,
    tenant_id: &TenantId,
    since: DateTime<Utc>,
    limit: u32,
) -> DbResult<Vec<TopProduct>> {
    let products = sqlx::query_as::<_, TopProduct>(
        "SELECT i.product_id, MAX(i.name_snapshot) AS name, \
         SUM(i.quantity) AS quantity, SUM(i.subtotal_cents) AS revenue_cents \
         FROM sale_items i JOIN sales s ON s.id = i.sale_id \
         WHERE s.tenant_id = ? AND s.status != 'cancelled' \
         AND julianday(s.created_at) >= julianday(?) \
         GROUP BY i.product_id \
         ORDER BY quantity DESC, revenue_cents DESC \
         LIMIT ?",
    )
    .bind(tenant_id.as_str())
    .bind(since)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(products)
}
