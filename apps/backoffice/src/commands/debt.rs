//! # Debt Commands
//!
//! Listing what customers owe and taking their payments.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_debt_payment(debt, 2000)         Debt 5000, paid 0             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger().apply_payment   ──►  payment row, sale paid 2000 / rem 3000  │
//! │                                                                         │
//! │  record_debt_payment(debt, 3000)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger().apply_payment   ──►  debt settled (paid), sale completed     │
//! │                                                                         │
//! │  mark_debt_paid(debt)     ──►  records the remainder, then settles     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overpayments are refused; the cashier enters at most the remaining
//! balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use kassa_core::{DateRange, Debt, DebtFilter, DebtOverview, DebtPayment, DebtSettlement};
use kassa_db::{LedgerResult, PaymentReceipt};

use super::sale::SaleDto;
use crate::error::ApiError;
use crate::notification::{Notification, Notifier};
use crate::state::DbState;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtDto {
    pub id: String,
    pub sale_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub due_at: DateTime<Utc>,
    pub settled: bool,
    pub settlement: Option<DebtSettlement>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<Debt> for DebtDto {
    fn from(d: Debt) -> Self {
        DebtDto {
            id: d.id,
            sale_id: d.sale_id,
            customer_id: d.customer_id,
            amount_cents: d.amount_cents,
            due_at: d.due_at,
            settled: d.settled,
            settlement: d.settlement,
            created_at: d.created_at,
            settled_at: d.settled_at,
        }
    }
}

/// A row of the debts screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtOverviewDto {
    pub id: String,
    pub sale_id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub amount_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub due_at: DateTime<Utc>,
    pub settled: bool,
    pub settlement: Option<DebtSettlement>,
    pub overdue: bool,
    pub created_at: DateTime<Utc>,
}

impl DebtOverviewDto {
    fn new(d: DebtOverview, now: DateTime<Utc>) -> Self {
        DebtOverviewDto {
            remaining_cents: d.remaining().cents(),
            overdue: d.is_overdue(now),
            id: d.id,
            sale_id: d.sale_id,
            invoice_number: d.invoice_number,
            customer_id: d.customer_id,
            customer_name: d.customer_name,
            customer_phone: d.customer_phone,
            amount_cents: d.amount_cents,
            paid_cents: d.paid_cents,
            due_at: d.due_at,
            settled: d.settled,
            settlement: d.settlement,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPaymentDto {
    pub id: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DebtPayment> for DebtPaymentDto {
    fn from(p: DebtPayment) -> Self {
        DebtPaymentDto {
            id: p.id,
            amount_cents: p.amount_cents,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// The installment recorded; absent when nothing was left to pay
    pub payment: Option<DebtPaymentDto>,
    pub total_paid_cents: i64,
    pub remaining_cents: i64,
    pub settled: bool,
    pub debt: DebtDto,
    pub sale: SaleDto,
}

impl From<PaymentReceipt> for PaymentResponse {
    fn from(r: PaymentReceipt) -> Self {
        PaymentResponse {
            settled: r.settled(),
            payment: r.payment.map(DebtPaymentDto::from),
            total_paid_cents: r.total_paid.cents(),
            remaining_cents: r.remaining.cents(),
            debt: DebtDto::from(r.debt),
            sale: SaleDto::from(r.sale),
        }
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    #[default]
    Open,
    Settled,
    Overdue,
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtQuery {
    #[serde(default)]
    pub status: DebtStatus,
    pub customer_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<DebtQuery> for DebtFilter {
    fn from(q: DebtQuery) -> Self {
        let (settled, overdue) = match q.status {
            DebtStatus::Open => (Some(false), None),
            DebtStatus::Settled => (Some(true), None),
            DebtStatus::Overdue => (None, Some(true)),
            DebtStatus::All => (None, None),
        };
        DebtFilter {
            settled,
            overdue,
            created: (q.from.is_some() || q.to.is_some()).then_some(DateRange {
                from: q.from,
                to: q.to,
            }),
            customer_id: q.customer_id,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Lists debts, earliest due date first.
pub async fn list_debts(db: &DbState, query: DebtQuery) -> Result<Vec<DebtOverviewDto>, ApiError> {
    debug!(?query, "list_debts command");

    let now = Utc::now();
    let debts = db
        .shop()
        .debts()
        .list(&DebtFilter::from(query), now)
        .await?;

    Ok(debts
        .into_iter()
        .map(|d| DebtOverviewDto::new(d, now))
        .collect())
}

pub async fn get_debt(db: &DbState, debt_id: &str) -> Result<DebtDto, ApiError> {
    let debt = db
        .shop()
        .debts()
        .get(debt_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Debt", debt_id))?;
    Ok(DebtDto::from(debt))
}

/// Installments of a debt, oldest first.
pub async fn get_debt_payments(
    db: &DbState,
    debt_id: &str,
) -> Result<Vec<DebtPaymentDto>, ApiError> {
    let debts = db.shop().debts();
    if debts.get(debt_id).await?.is_none() {
        return Err(ApiError::not_found("Debt", debt_id));
    }

    let payments = debts.payments(debt_id).await?;
    Ok(payments.into_iter().map(DebtPaymentDto::from).collect())
}

/// Records an installment of `amount_cents` against a debt.
pub async fn record_debt_payment(
    db: &DbState,
    notifier: &Notifier,
    debt_id: &str,
    amount_cents: i64,
) -> Result<PaymentResponse, ApiError> {
    debug!(debt_id = %debt_id, amount_cents, "record_debt_payment command");
    let receipt = db.shop().ledger().apply_payment(debt_id, amount_cents).await;
    respond(notifier, receipt)
}

/// Pays off whatever is left on a debt and settles it.
pub async fn mark_debt_paid(
    db: &DbState,
    notifier: &Notifier,
    debt_id: &str,
) -> Result<PaymentResponse, ApiError> {
    debug!(debt_id = %debt_id, "mark_debt_paid command");
    let receipt = db.shop().ledger().mark_debt_paid(debt_id).await;
    respond(notifier, receipt)
}

fn respond(
    notifier: &Notifier,
    receipt: LedgerResult<PaymentReceipt>,
) -> Result<PaymentResponse, ApiError> {
    match receipt {
        Ok(receipt) => {
            if receipt.settled() {
                notifier.dispatch(&Notification::Success {
                    message: format!("Debt on {} is fully paid", receipt.sale.invoice_number),
                });
            }
            Ok(PaymentResponse::from(receipt))
        }
        Err(err) => {
            let err = ApiError::from(err);
            notifier.dispatch(&Notification::from(&err));
            Err(err)
        }
    }
}
