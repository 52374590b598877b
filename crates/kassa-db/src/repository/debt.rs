//! # Debt Repository
//!
//! Read side of debts and their payments, plus the statement helpers the
//! [`crate::Ledger`] runs inside its transactions.
//!
//! ## Overdue Is Derived
//! ```text
//! overdue  ⇔  settled = 0  AND  julianday(due_at) < julianday(:now)
//! ```
//! Nothing stores an "overdue" flag; every query evaluates it against the
//! `now` supplied by the caller.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use kassa_core::{Debt, DebtFilter, DebtOverview, DebtPayment, DebtSettlement, Money, TenantId};

use crate::error::DbResult;

const DEBT_COLUMNS: &str = "id, tenant_id, sale_id, customer_id, amount_cents, due_at, settled, \
     settlement, created_at, updated_at, settled_at";

const OVERVIEW_SELECT: &str = "SELECT d.id, d.sale_id, s.invoice_number, d.customer_id, \
     c.name AS customer_name, c.phone AS customer_phone, d.amount_cents, \
     COALESCE((SELECT SUM(p.amount_cents) FROM debt_payments p WHERE p.debt_id = d.id), 0) \
         AS paid_cents, \
     d.due_at, d.settled, d.settlement, d.created_at \
     FROM debts d \
     JOIN sales s ON s.id = d.sale_id \
     JOIN customers c ON c.id = d.customer_id \
     WHERE d.tenant_id = ";

#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl DebtRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        DebtRepository { pool, tenant_id }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Debt>> {
        fetch(&self.pool, &self.tenant_id, id).await
    }

    pub async fn get_by_sale(&self, sale_id: &str) -> DbResult<Option<Debt>> {
        fetch_by_sale(&self.pool, &self.tenant_id, sale_id).await
    }

    /// Lists debts matching `filter`, earliest due date first.
    ///
    /// `now` is the reference point for the overdue criterion.
    pub async fn list(&self, filter: &DebtFilter, now: DateTime<Utc>) -> DbResult<Vec<DebtOverview>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(OVERVIEW_SELECT);
        qb.push_bind(self.tenant_id.as_str());

        if let Some(settled) = filter.settled {
            qb.push(" AND d.settled = ").push_bind(settled);
        }
        match filter.overdue {
            Some(true) => {
                qb.push(" AND d.settled = 0 AND julianday(d.due_at) < julianday(")
                    .push_bind(now)
                    .push(")");
            }
            Some(false) => {
                qb.push(" AND NOT (d.settled = 0 AND julianday(d.due_at) < julianday(")
                    .push_bind(now)
                    .push("))");
            }
            None => {}
        }
        if let Some(range) = &filter.created {
            if let Some(from) = range.from {
                qb.push(" AND julianday(d.created_at) >= julianday(")
                    .push_bind(from)
                    .push(")");
            }
            if let Some(to) = range.to {
                qb.push(" AND julianday(d.created_at) < julianday(")
                    .push_bind(to)
                    .push(")");
            }
        }
        if let Some(customer_id) = &filter.customer_id {
            qb.push(" AND d.customer_id = ").push_bind(customer_id.clone());
        }

        qb.push(" ORDER BY julianday(d.due_at) ASC, s.invoice_number ASC");

        let debts = qb
            .build_query_as::<DebtOverview>()
            .fetch_all(&self.pool)
            .await?;
        Ok(debts)
    }

    /// Every open debt past its due date at `now`.
    pub async fn overdue(&self, now: DateTime<Utc>) -> DbResult<Vec<DebtOverview>> {
        self.list(&DebtFilter::overdue(), now).await
    }

    /// Installments in the order they were made.
    pub async fn payments(&self, debt_id: &str) -> DbResult<Vec<DebtPayment>> {
        let payments = sqlx::query_as::<_, DebtPayment>(
            "SELECT id, tenant_id, debt_id, amount_cents, created_at FROM debt_payments \
             WHERE debt_id = ? AND tenant_id = ? ORDER BY created_at, rowid",
        )
        .bind(debt_id)
        .bind(self.tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    pub async fn total_paid(&self, debt_id: &str) -> DbResult<Money> {
        total_paid(&self.pool, &self.tenant_id, debt_id).await
    }
}

// =============================================================================
// Executor-generic helpers (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
) -> DbResult<Option<Debt>> {
    let sql = format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = ? AND tenant_id = ?");

    let debt = sqlx::query_as::<_, Debt>(&sql)
        .bind(id)
        .bind(tenant_id.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(debt)
}

pub(crate) async fn fetch_by_sale<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    sale_id: &str,
) -> DbResult<Option<Debt>> {
    let sql = format!("SELECT {DEBT_COLUMNS} FROM debts WHERE sale_id = ? AND tenant_id = ?");

    let debt = sqlx::query_as::<_, Debt>(&sql)
        .bind(sale_id)
        .bind(tenant_id.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(debt)
}

pub(crate) async fn total_paid<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    debt_id: &str,
) -> DbResult<Money> {
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM debt_payments WHERE debt_id = ? AND tenant_id = ?",
    )
    .bind(debt_id)
    .bind(tenant_id.as_str())
    .fetch_one(executor)
    .await?;

    Ok(Money::from_cents(cents))
}

pub(crate) async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, debt: &Debt) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO debts (id, tenant_id, sale_id, customer_id, amount_cents, due_at, settled, \
         settlement, created_at, updated_at, settled_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&debt.id)
    .bind(&debt.tenant_id)
    .bind(&debt.sale_id)
    .bind(&debt.customer_id)
    .bind(debt.amount_cents)
    .bind(debt.due_at)
    .bind(debt.settled)
    .bind(debt.settlement)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .bind(debt.settled_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Takes the write lock on an open debt by touching it.
///
/// Returns `false` when the debt does not exist in the tenant or is
/// already settled; in both cases nothing was written.
pub(crate) async fn claim_open<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE debts SET updated_at = ? WHERE id = ? AND tenant_id = ? AND settled = 0",
    )
    .bind(now)
    .bind(id)
    .bind(tenant_id.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_payment<'e, E: SqliteExecutor<'e>>(
    executor: E,
    payment: &DebtPayment,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO debt_payments (id, tenant_id, debt_id, amount_cents, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&payment.id)
    .bind(&payment.tenant_id)
    .bind(&payment.debt_id)
    .bind(payment.amount_cents)
    .bind(payment.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Closes an open debt. Returns `false` if it was not open.
pub(crate) async fn settle<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    id: &str,
    settlement: DebtSettlement,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE debts SET settled = 1, settlement = ?, settled_at = ?, updated_at = ? \
         WHERE id = ? AND tenant_id = ? AND settled = 0",
    )
    .bind(settlement)
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(tenant_id.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes off the open debt of a sale, if there is one.
pub(crate) async fn write_off_for_sale<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: &TenantId,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE debts SET settled = 1, settlement = ?, settled_at = ?, updated_at = ? \
         WHERE sale_id = ? AND tenant_id = ? AND settled = 0",
    )
    .bind(DebtSettlement::WrittenOff)
    .bind(now)
    .bind(now)
    .bind(sale_id)
    .bind(tenant_id.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}
