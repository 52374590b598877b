//! # Ledger
//!
//! The multi-step writes of the back office. Each public operation runs in
//! exactly one SQLite transaction: either every row it touches changes, or
//! none does.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ledger::checkout (one transaction)                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    load products ──► kassa_core::checkout::plan_checkout                │
//! │                         │  (EmptyCart, MissingCustomerForDebt,          │
//! │                         │   InsufficientStock, InsufficientPayment...)  │
//! │                         ▼                                               │
//! │    customer exists?  ── no ──► CustomerNotFound                         │
//! │    for each line:                                                       │
//! │      UPDATE products SET stock = stock - q                              │
//! │      WHERE id = ? AND tenant_id = ? AND stock >= q                      │
//! │      0 rows ──► InsufficientStock (another till got there first)        │
//! │    invoice number = INV-YYYYMMDD-(count of today + 1)                   │
//! │    INSERT sale, sale_items, debt (credit sales)                         │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any `?` before COMMIT drops the transaction, which rolls back.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Every workflow opens its transaction with `BEGIN IMMEDIATE`, so SQLite's
//! write lock is held before the first read. A second checkout waits (up to
//! the busy timeout) for the first to commit and then sees the stock it
//! left; it never fails half way through with a stale snapshot. Likewise a
//! second payment on the same debt sees the first installment in the
//! running total.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn};
use uuid::Uuid;

use kassa_core::checkout::{format_invoice_number, invoice_prefix, plan_checkout, CheckoutLine, PaymentDetails};
use kassa_core::debt::{self as rules, PaymentOutcome};
use kassa_core::{
    CoreError, Debt, DebtPayment, DebtSettlement, Money, Product, Sale, SaleDetail, SaleStatus,
    TenantId,
};

use crate::error::{LedgerError, LedgerResult};
use crate::repository::{customer, debt, product, sale};

// =============================================================================
// Results
// =============================================================================

/// Outcome of [`Ledger::cancel_sale`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub sale: Sale,
    /// The sale was already cancelled; nothing was changed.
    pub already_cancelled: bool,
    /// An open debt on the sale was written off.
    pub debt_written_off: bool,
}

/// Outcome of [`Ledger::apply_payment`] and [`Ledger::mark_debt_paid`].
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// The installment recorded, if any.
    pub payment: Option<DebtPayment>,
    pub debt: Debt,
    pub sale: Sale,
    pub total_paid: Money,
    pub remaining: Money,
}

impl PaymentReceipt {
    pub fn settled(&self) -> bool {
        self.debt.settled
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Transactional writes for one tenant.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl Ledger {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        Ledger { pool, tenant_id }
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Turns cart lines into a sale.
    ///
    /// Stock is decremented, the sale and its items are inserted and, for
    /// debt sales, a debt is opened for the customer. Rejections leave the
    /// database untouched; storage failures surface as
    /// [`LedgerError::CheckoutFailed`].
    pub async fn checkout(
        &self,
        lines: &[CheckoutLine],
        payment: &PaymentDetails,
    ) -> LedgerResult<SaleDetail> {
        let result = self
            .run_checkout(lines, payment, Utc::now())
            .await
            .map_err(LedgerError::during_checkout);

        match &result {
            Ok(detail) => info!(
                tenant_id = %self.tenant_id,
                sale_id = %detail.sale.id,
                invoice = %detail.sale.invoice_number,
                method = %detail.sale.payment_method,
                total_cents = detail.sale.total_cents,
                "Checkout completed"
            ),
            Err(LedgerError::Rejected(reason)) => {
                warn!(tenant_id = %self.tenant_id, %reason, "Checkout rejected")
            }
            Err(err) => error!(tenant_id = %self.tenant_id, error = %err, "Checkout failed"),
        }

        result
    }

    async fn run_checkout(
        &self,
        lines: &[CheckoutLine],
        payment: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> LedgerResult<SaleDetail> {
        let tenant = &self.tenant_id;
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let mut products: Vec<Product> = Vec::new();
        for line in lines {
            if products.iter().any(|p| p.id == line.product_id) {
                continue;
            }
            if let Some(found) = product::fetch(&mut *tx, tenant, &line.product_id).await? {
                products.push(found);
            }
        }

        let plan = plan_checkout(lines, &products, payment, now)?;

        let customer = match &plan.customer_id {
            Some(id) => Some(
                customer::fetch(&mut *tx, tenant, id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(id.clone()))?,
            ),
            None => None,
        };

        for line in &plan.lines {
            if !product::take_stock(&mut *tx, tenant, &line.product_id, line.quantity).await? {
                let available = product::fetch(&mut *tx, tenant, &line.product_id)
                    .await?
                    .map_or(0, |p| p.stock);
                return Err(CoreError::InsufficientStock {
                    product: line.name_snapshot.clone(),
                    available,
                    requested: line.quantity,
                }
                .into());
            }
        }

        let day = now.date_naive();
        let issued = sale::count_invoices(&mut *tx, tenant, &invoice_prefix(day)).await?;
        let records = plan.into_records(tenant.as_str(), format_invoice_number(day, issued + 1));

        sale::insert(&mut *tx, &records.sale).await?;
        for item in &records.items {
            sale::insert_item(&mut *tx, item).await?;
        }
        if let Some(debt) = &records.debt {
            debt::insert(&mut *tx, debt).await?;
        }

        tx.commit().await?;

        Ok(SaleDetail {
            sale: records.sale,
            items: records.items,
            customer,
            debt: records.debt,
        })
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    /// Cancels a sale: stock comes back and an open debt is written off.
    ///
    /// Cancelling twice is harmless; the second call reports
    /// `already_cancelled` and restores nothing.
    pub async fn cancel_sale(&self, sale_id: &str) -> LedgerResult<Cancellation> {
        let result = self
            .run_cancel(sale_id, Utc::now())
            .await
            .map_err(|e| e.during_cancellation(sale_id));

        match &result {
            Ok(c) if c.already_cancelled => {
                info!(tenant_id = %self.tenant_id, sale_id = %sale_id, "Sale was already cancelled")
            }
            Ok(c) => info!(
                tenant_id = %self.tenant_id,
                sale_id = %sale_id,
                debt_written_off = c.debt_written_off,
                "Sale cancelled"
            ),
            Err(LedgerError::Rejected(reason)) => {
                warn!(tenant_id = %self.tenant_id, sale_id = %sale_id, %reason, "Cancellation rejected")
            }
            Err(err) => error!(tenant_id = %self.tenant_id, error = %err, "Cancellation failed"),
        }

        result
    }

    async fn run_cancel(&self, sale_id: &str, now: DateTime<Utc>) -> LedgerResult<Cancellation> {
        let tenant = &self.tenant_id;
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let claimed = sqlx::query(
            "UPDATE sales SET status = ?, cancelled_at = ?, updated_at = ? \
             WHERE id = ? AND tenant_id = ? AND status != ?",
        )
        .bind(SaleStatus::Cancelled)
        .bind(now)
        .bind(now)
        .bind(sale_id)
        .bind(tenant.as_str())
        .bind(SaleStatus::Cancelled)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            let sale = sale::fetch(&mut *tx, tenant, sale_id)
                .await?
                .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
            return Ok(Cancellation {
                sale,
                already_cancelled: true,
                debt_written_off: false,
            });
        }

        for item in sale::fetch_items(&mut *tx, tenant, sale_id).await? {
            product::return_stock(&mut *tx, tenant, &item.product_id, item.quantity).await?;
        }

        let debt_written_off = debt::write_off_for_sale(&mut *tx, tenant, sale_id, now).await?;

        let sale = sale::fetch(&mut *tx, tenant, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        tx.commit().await?;

        Ok(Cancellation {
            sale,
            already_cancelled: false,
            debt_written_off,
        })
    }

    // -------------------------------------------------------------------------
    // Debt payments
    // -------------------------------------------------------------------------

    /// Records an installment against an open debt.
    ///
    /// When the installment covers the remainder the debt is settled
    /// (`paid`) and its sale moves to `completed`.
    pub async fn apply_payment(&self, debt_id: &str, amount_cents: i64) -> LedgerResult<PaymentReceipt> {
        let result = self
            .run_payment(debt_id, PaymentKind::Installment(Money::from_cents(amount_cents)), Utc::now())
            .await
            .map_err(|e| e.during_payment(debt_id));
        self.log_payment(debt_id, &result);
        result
    }

    /// Closes a debt by recording a payment for whatever is still owed.
    pub async fn mark_debt_paid(&self, debt_id: &str) -> LedgerResult<PaymentReceipt> {
        let result = self
            .run_payment(debt_id, PaymentKind::Remainder, Utc::now())
            .await
            .map_err(|e| e.during_payment(debt_id));
        self.log_payment(debt_id, &result);
        result
    }

    async fn run_payment(
        &self,
        debt_id: &str,
        kind: PaymentKind,
        now: DateTime<Utc>,
    ) -> LedgerResult<PaymentReceipt> {
        if let PaymentKind::Installment(amount) = kind {
            if !amount.is_positive() {
                return Err(CoreError::invalid_amount("payment must be greater than zero").into());
            }
        }

        let tenant = &self.tenant_id;
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        if !debt::claim_open(&mut *tx, tenant, debt_id, now).await? {
            return Err(match debt::fetch(&mut *tx, tenant, debt_id).await? {
                Some(_) => CoreError::DebtAlreadySettled(debt_id.to_string()),
                None => CoreError::DebtNotFound(debt_id.to_string()),
            }
            .into());
        }

        let open = debt::fetch(&mut *tx, tenant, debt_id)
            .await?
            .ok_or_else(|| CoreError::DebtNotFound(debt_id.to_string()))?;
        let already_paid = debt::total_paid(&mut *tx, tenant, debt_id).await?;

        let outcome = match kind {
            PaymentKind::Installment(amount) => rules::apply_payment(&open, already_paid, amount)?,
            PaymentKind::Remainder => {
                let amount = rules::closing_payment(&open, already_paid)?.unwrap_or_default();
                PaymentOutcome {
                    amount,
                    total_paid: already_paid + amount,
                    remaining: Money::zero(),
                    settles: true,
                }
            }
        };

        let payment = self.record(&mut tx, &open, &outcome, now).await?;

        let debt = debt::fetch(&mut *tx, tenant, debt_id)
            .await?
            .ok_or_else(|| CoreError::DebtNotFound(debt_id.to_string()))?;
        let sale = sale::fetch(&mut *tx, tenant, &open.sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(open.sale_id.clone()))?;

        tx.commit().await?;

        Ok(PaymentReceipt {
            payment,
            debt,
            sale,
            total_paid: outcome.total_paid,
            remaining: outcome.remaining,
        })
    }

    /// Writes an accepted outcome: the payment row, the sale balance and,
    /// when settled, the debt and sale status.
    async fn record(
        &self,
        conn: &mut SqliteConnection,
        open: &Debt,
        outcome: &PaymentOutcome,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<DebtPayment>> {
        let tenant = &self.tenant_id;

        let payment = if outcome.amount.is_positive() {
            let payment = DebtPayment {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant.to_string(),
                debt_id: open.id.clone(),
                amount_cents: outcome.amount.cents(),
                created_at: now,
            };
            debt::insert_payment(&mut *conn, &payment).await?;
            Some(payment)
        } else {
            None
        };

        sqlx::query(
            "UPDATE sales SET paid_cents = ?, remaining_cents = ?, updated_at = ? \
             WHERE id = ? AND tenant_id = ?",
        )
        .bind(outcome.total_paid.cents())
        .bind(outcome.remaining.cents())
        .bind(now)
        .bind(&open.sale_id)
        .bind(tenant.as_str())
        .execute(&mut *conn)
        .await?;

        if outcome.settles {
            debt::settle(&mut *conn, tenant, &open.id, DebtSettlement::Paid, now).await?;

            sqlx::query(
                "UPDATE sales SET status = ?, completed_at = ?, updated_at = ? \
                 WHERE id = ? AND tenant_id = ? AND status = ?",
            )
            .bind(SaleStatus::Completed)
            .bind(now)
            .bind(now)
            .bind(&open.sale_id)
            .bind(tenant.as_str())
            .bind(SaleStatus::Pending)
            .execute(&mut *conn)
            .await?;
        }

        Ok(payment)
    }

    fn log_payment(&self, debt_id: &str, result: &LedgerResult<PaymentReceipt>) {
        match result {
            Ok(receipt) => info!(
                tenant_id = %self.tenant_id,
                debt_id = %debt_id,
                paid_cents = receipt.payment.as_ref().map_or(0, |p| p.amount_cents),
                remaining_cents = receipt.remaining.cents(),
                settled = receipt.settled(),
                "Debt payment recorded"
            ),
            Err(LedgerError::Rejected(reason)) => {
                warn!(tenant_id = %self.tenant_id, debt_id = %debt_id, %reason, "Debt payment rejected")
            }
            Err(err) => error!(tenant_id = %self.tenant_id, error = %err, "Debt payment failed"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PaymentKind {
    Installment(Money),
    Remainder,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_invoice_numbers_count_per_day() {
        let (_db, shop) = fixtures::shop().await;
        let bread = fixtures::product(&shop, "Bread", 250, 10).await;
        let lines = [CheckoutLine::new(&bread.id, 1)];

        let first = shop.ledger().checkout(&lines, &PaymentDetails::cash(250)).await.unwrap();
        let second = shop.ledger().checkout(&lines, &PaymentDetails::card(250)).await.unwrap();

        let today = invoice_prefix(Utc::now().date_naive());
        assert_eq!(first.sale.invoice_number, format!("{today}0001"));
        assert_eq!(second.sale.invoice_number, format!("{today}0002"));
    }

    #[tokio::test]
    async fn test_unknown_customer_rolls_back() {
        let (_db, shop) = fixtures::shop().await;
        let bread = fixtures::product(&shop, "Bread", 250, 10).await;

        let err = shop
            .ledger()
            .checkout(&[CheckoutLine::new(&bread.id, 2)], &PaymentDetails::debt("ghost"))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Rejected(CoreError::CustomerNotFound(_))));
        assert_eq!(shop.products().get(&bread.id).await.unwrap().unwrap().stock, 10);
        assert!(shop.sales().list(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tenants_cannot_touch_each_other() {
        let (db, shop) = fixtures::shop().await;
        let bread = fixtures::product(&shop, "Bread", 250, 10).await;
        let amina = fixtures::customer(&shop, "Amina", "0712345678").await;
        let sale = shop
            .ledger()
            .checkout(&[CheckoutLine::new(&bread.id, 1)], &PaymentDetails::debt(&amina.id))
            .await
            .unwrap();
        let debt_id = sale.debt.unwrap().id;

        let other = db.tenant(TenantId::new("another-shop"));
        let err = other
            .ledger()
            .checkout(&[CheckoutLine::new(&bread.id, 1)], &PaymentDetails::cash(250))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::ProductNotFound(_))));

        let err = other.ledger().cancel_sale(&sale.sale.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::SaleNotFound(_))));

        let err = other.ledger().apply_payment(&debt_id, 100).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::DebtNotFound(_))));

        assert!(other.sales().get(&sale.sale.id).await.unwrap().is_none());
        assert!(other.debts().get(&debt_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_paid_records_closing_payment() {
        let (_db, shop) = fixtures::shop().await;
        let tv = fixtures::product(&shop, "Radio", 5000, 2).await;
        let amina = fixtures::customer(&shop, "Amina", "0712345678").await;
        let sale = shop
            .ledger()
            .checkout(&[CheckoutLine::new(&tv.id, 1)], &PaymentDetails::debt(&amina.id))
            .await
            .unwrap();
        let debt_id = sale.debt.unwrap().id;

        shop.ledger().apply_payment(&debt_id, 1200).await.unwrap();
        let receipt = shop.ledger().mark_debt_paid(&debt_id).await.unwrap();

        assert!(receipt.settled());
        assert_eq!(receipt.debt.settlement, Some(DebtSettlement::Paid));
        assert_eq!(receipt.payment.as_ref().map(|p| p.amount_cents), Some(3800));
        assert_eq!(receipt.sale.status, SaleStatus::Completed);
        assert_eq!(receipt.sale.paid_cents, 5000);
        assert_eq!(receipt.sale.remaining_cents, 0);
        assert_eq!(shop.debts().payments(&debt_id).await.unwrap().len(), 2);

        let again = shop.ledger().mark_debt_paid(&debt_id).await.unwrap_err();
        assert!(matches!(again, LedgerError::Rejected(CoreError::DebtAlreadySettled(_))));
    }
}
