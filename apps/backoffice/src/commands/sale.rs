//! # Sale Commands
//!
//! Checkout, cancellation, sales history and invoices.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkout Command                                     │
//! │                                                                         │
//! │  CheckoutRequest { method, tenderedCents, customerId, dueAt, ... }     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cart.lines()  +  PaymentDetails (due date from request or settings)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger().checkout()      one transaction: stock, sale, items, debt    │
//! │       │                                                                 │
//! │       ├── Err ──► cart untouched, error notification, ApiError         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cart cleared ──► InvoiceResponse (store header, lines, totals)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kassa_core::checkout::PaymentDetails;
use kassa_core::validation::validate_debt_term_days;
use kassa_core::{
    DateRange, PaymentMethod, Sale, SaleDetail, SaleFilter, SaleItem, SaleStatus,
};

use super::customer::CustomerDto;
use super::debt::DebtDto;
use crate::error::ApiError;
use crate::notification::{Notification, Notifier};
use crate::state::{CartState, ConfigState, DbState};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub tendered_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub change_cents: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Sale> for SaleDto {
    fn from(s: Sale) -> Self {
        SaleDto {
            id: s.id,
            invoice_number: s.invoice_number,
            customer_id: s.customer_id,
            payment_method: s.payment_method,
            status: s.status,
            total_cents: s.total_cents,
            tendered_cents: s.tendered_cents,
            paid_cents: s.paid_cents,
            remaining_cents: s.remaining_cents,
            change_cents: s.change_cents,
            created_at: s.created_at,
            completed_at: s.completed_at,
            cancelled_at: s.cancelled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemDto {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<SaleItem> for SaleItemDto {
    fn from(i: SaleItem) -> Self {
        SaleItemDto {
            product_id: i.product_id,
            name: i.name_snapshot,
            quantity: i.quantity,
            unit_price_cents: i.unit_price_cents,
            subtotal_cents: i.subtotal_cents,
        }
    }
}

/// A sale with everything attached to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetailDto {
    pub sale: SaleDto,
    pub items: Vec<SaleItemDto>,
    pub customer: Option<CustomerDto>,
    pub debt: Option<DebtDto>,
}

impl From<SaleDetail> for SaleDetailDto {
    fn from(d: SaleDetail) -> Self {
        SaleDetailDto {
            sale: SaleDto::from(d.sale),
            items: d.items.into_iter().map(SaleItemDto::from).collect(),
            customer: d.customer.map(CustomerDto::from),
            debt: d.debt.map(DebtDto::from),
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// Everything needed to print or render an invoice.
///
/// Amounts come both raw (cents) and formatted with the shop currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub store: InvoiceStore,
    pub sale_id: String,
    pub invoice_number: String,
    pub issued_at: DateTime<Utc>,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub customer: Option<InvoiceCustomer>,
    pub lines: Vec<InvoiceLine>,
    pub total_cents: i64,
    pub tendered_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub change_cents: i64,
    /// Set for debt sales
    pub due_at: Option<DateTime<Utc>>,
    pub formatted: InvoiceAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStore {
    pub name: String,
    pub address: Vec<String>,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCustomer {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub unit_price: String,
    pub subtotal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAmounts {
    pub total: String,
    pub tendered: String,
    pub paid: String,
    pub remaining: String,
    pub change: String,
}

impl InvoiceResponse {
    pub fn build(detail: &SaleDetail, config: &ConfigState) -> Self {
        let settings = config.snapshot();
        let money = |cents: i64| config.format_currency(cents);
        let sale = &detail.sale;

        InvoiceResponse {
            store: InvoiceStore {
                name: settings.store.name,
                address: settings.store.address,
                logo_path: settings.store.logo_path,
            },
            sale_id: sale.id.clone(),
            invoice_number: sale.invoice_number.clone(),
            issued_at: sale.created_at,
            status: sale.status,
            payment_method: sale.payment_method,
            customer: detail.customer.as_ref().map(|c| InvoiceCustomer {
                name: c.name.clone(),
                phone: c.phone.clone(),
            }),
            lines: detail
                .items
                .iter()
                .map(|i| InvoiceLine {
                    name: i.name_snapshot.clone(),
                    quantity: i.quantity,
                    unit_price_cents: i.unit_price_cents,
                    subtotal_cents: i.subtotal_cents,
                    unit_price: money(i.unit_price_cents),
                    subtotal: money(i.subtotal_cents),
                })
                .collect(),
            total_cents: sale.total_cents,
            tendered_cents: sale.tendered_cents,
            paid_cents: sale.paid_cents,
            remaining_cents: sale.remaining_cents,
            change_cents: sale.change_cents,
            due_at: detail.debt.as_ref().map(|d| d.due_at),
            formatted: InvoiceAmounts {
                total: money(sale.total_cents),
                tendered: money(sale.tendered_cents),
                paid: money(sale.paid_cents),
                remaining: money(sale.remaining_cents),
                change: money(sale.change_cents),
            },
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    /// Cash handed over, or the card amount. A debt sale stores it as
    /// entered; it does not reduce the debt.
    #[serde(default)]
    pub tendered_cents: i64,
    /// Required for debt sales
    pub customer_id: Option<String>,
    /// Explicit due date for a debt sale
    pub due_at: Option<DateTime<Utc>>,
    /// Term in days, used when `due_at` is absent. Falls back to the shop's
    /// default term.
    pub due_in_days: Option<i64>,
}

impl CheckoutRequest {
    pub fn cash(tendered_cents: i64) -> Self {
        CheckoutRequest {
            method: PaymentMethod::Cash,
            tendered_cents,
            customer_id: None,
            due_at: None,
            due_in_days: None,
        }
    }

    pub fn debt(customer_id: impl Into<String>) -> Self {
        CheckoutRequest {
            method: PaymentMethod::Debt,
            tendered_cents: 0,
            customer_id: Some(customer_id.into()),
            due_at: None,
            due_in_days: None,
        }
    }

    fn payment(&self, config: &ConfigState, now: DateTime<Utc>) -> Result<PaymentDetails, ApiError> {
        let mut payment = PaymentDetails {
            method: self.method,
            tendered_cents: self.tendered_cents,
            customer_id: self.customer_id.clone(),
            due_at: None,
        };

        if self.method == PaymentMethod::Debt {
            let due_at = match (self.due_at, self.due_in_days) {
                (Some(at), _) => at,
                (None, Some(days)) => {
                    validate_debt_term_days(days)?;
                    now + Duration::days(days)
                }
                (None, None) => now + Duration::days(config.default_term_days()),
            };
            payment = payment.due_at(due_at);
        }

        Ok(payment)
    }
}

/// Filters for the sales history screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    pub status: Option<SaleStatus>,
    pub method: Option<PaymentMethod>,
    pub customer_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl From<SaleQuery> for SaleFilter {
    fn from(q: SaleQuery) -> Self {
        let created = (q.from.is_some() || q.to.is_some()).then_some(DateRange {
            from: q.from,
            to: q.to,
        });
        SaleFilter {
            status: q.status,
            payment_method: q.method,
            customer_id: q.customer_id,
            created,
            limit: q.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSaleResponse {
    pub sale: SaleDto,
    pub already_cancelled: bool,
    pub debt_written_off: bool,
}

// =============================================================================
// Commands
// =============================================================================

/// Turns the current cart into a sale and returns its invoice.
///
/// The cart is cleared only when the sale was recorded.
pub async fn checkout(
    db: &DbState,
    cart: &CartState,
    config: &ConfigState,
    notifier: &Notifier,
    request: CheckoutRequest,
) -> Result<InvoiceResponse, ApiError> {
    debug!(method = %request.method, "checkout command");

    let lines = cart.with_cart(|c| c.lines());

    let result = async {
        let payment = request.payment(config, Utc::now())?;
        let detail = db.shop().ledger().checkout(&lines, &payment).await?;
        Ok::<_, ApiError>(detail)
    }
    .await;

    let detail = match result {
        Ok(detail) => detail,
        Err(err) => {
            notifier.dispatch(&Notification::from(&err));
            return Err(err);
        }
    };

    // Lines added while the sale was being written stay in the cart
    cart.with_cart_mut(|c| {
        if c.lines() == lines {
            c.clear();
        }
    });

    let invoice = InvoiceResponse::build(&detail, config);
    notifier.dispatch(&Notification::Success {
        message: format!(
            "Sale {} recorded: {}",
            invoice.invoice_number, invoice.formatted.total
        ),
    });

    info!(
        invoice = %invoice.invoice_number,
        total_cents = invoice.total_cents,
        "Checkout complete"
    );
    Ok(invoice)
}

/// Cancels a sale, restoring its stock and writing off its debt.
/// Cancelling twice is harmless.
pub async fn cancel_sale(
    db: &DbState,
    notifier: &Notifier,
    sale_id: &str,
) -> Result<CancelSaleResponse, ApiError> {
    debug!(sale_id = %sale_id, "cancel_sale command");

    let cancellation = db.shop().ledger().cancel_sale(sale_id).await?;

    if !cancellation.already_cancelled {
        notifier.dispatch(&Notification::Info {
            message: format!("Sale {} cancelled", cancellation.sale.invoice_number),
        });
    }

    Ok(CancelSaleResponse {
        sale: SaleDto::from(cancellation.sale),
        already_cancelled: cancellation.already_cancelled,
        debt_written_off: cancellation.debt_written_off,
    })
}

/// Lists sales newest first.
pub async fn list_sales(db: &DbState, query: SaleQuery) -> Result<Vec<SaleDto>, ApiError> {
    debug!(?query, "list_sales command");
    let sales = db.shop().sales().list(&SaleFilter::from(query)).await?;
    Ok(sales.into_iter().map(SaleDto::from).collect())
}

pub async fn get_sale(db: &DbState, sale_id: &str) -> Result<SaleDetailDto, ApiError> {
    let detail = db
        .shop()
        .sales()
        .get_detail(sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", sale_id))?;
    Ok(SaleDetailDto::from(detail))
}

/// Rebuilds the invoice of a past sale.
pub async fn get_invoice(
    db: &DbState,
    config: &ConfigState,
    sale_id: &str,
) -> Result<InvoiceResponse, ApiError> {
    let detail = db
        .shop()
        .sales()
        .get_detail(sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", sale_id))?;
    Ok(InvoiceResponse::build(&detail, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cart::{add_to_cart, get_cart};
    use crate::commands::customer::{create_customer, delete_customer, CustomerRequest};
    use crate::commands::product::{create_product, get_product, CreateProductRequest};
    use crate::error::ErrorCode;
    use crate::notification::{RecordingSink, Severity};
    use crate::AppContext;
    use std::sync::Arc;

    struct Till {
        ctx: AppContext,
        notifier: Notifier,
        sink: Arc<RecordingSink>,
    }

    async fn till() -> Till {
        let ctx = AppContext::in_memory().await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let notifier = ctx.notifier.clone().with_sink(sink.clone());
        Till { ctx, notifier, sink }
    }

    impl Till {
        async fn product(&self, name: &str, price_cents: i64, stock: i64) -> String {
            create_product(
                &self.ctx.db,
                CreateProductRequest {
                    name: name.into(),
                    price_cents,
                    stock,
                    category_id: None,
                    image_path: None,
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn customer(&self) -> String {
            create_customer(
                &self.ctx.db,
                CustomerRequest {
                    name: "Juma Otieno".into(),
                    phone: "0722000111".into(),
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn add(&self, product_id: &str, quantity: i64) {
            add_to_cart(&self.ctx.db, &self.ctx.cart, product_id, Some(quantity))
                .await
                .unwrap();
        }

        async fn checkout(&self, request: CheckoutRequest) -> Result<InvoiceResponse, ApiError> {
            checkout(&self.ctx.db, &self.ctx.cart, &self.ctx.config, &self.notifier, request).await
        }
    }

    #[tokio::test]
    async fn test_cash_checkout_issues_invoice_and_clears_cart() {
        let till = till().await;
        let rice = till.product("Rice 2kg", 350, 10).await;
        let oil = till.product("Cooking Oil 1L", 160, 4).await;
        till.add(&rice, 2).await;
        till.add(&oil, 1).await;

        let invoice = till.checkout(CheckoutRequest::cash(1000)).await.unwrap();

        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(invoice.store.name, "Kassa Dev Store");
        assert_eq!(invoice.lines.len(), 2);
        assert_eq!(invoice.lines[0].subtotal, "$7.00");
        assert_eq!(invoice.total_cents, 860);
        assert_eq!(invoice.formatted.change, "$1.40");
        assert_eq!(invoice.status, SaleStatus::Completed);
        assert_eq!(invoice.due_at, None);

        assert!(get_cart(&till.ctx.cart).items.is_empty());
        assert_eq!(get_product(&till.ctx.db, &rice).await.unwrap().stock, 8);
        assert_eq!(till.sink.count(), 1);

        let again = get_invoice(&till.ctx.db, &till.ctx.config, &invoice.sale_id)
            .await
            .unwrap();
        assert_eq!(again.invoice_number, invoice.invoice_number);
    }

    #[tokio::test]
    async fn test_rejected_checkout_keeps_cart_and_notifies() {
        let till = till().await;
        let bread = till.product("Bread", 250, 5).await;
        till.add(&bread, 2).await;

        let err = till.checkout(CheckoutRequest::cash(100)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentError);

        let mut request = CheckoutRequest::debt("");
        request.customer_id = None;
        let err = till.checkout(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert_eq!(get_cart(&till.ctx.cart).totals.total_quantity, 2);
        assert_eq!(get_product(&till.ctx.db, &bread).await.unwrap().stock, 5);

        let delivered = till.sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|(_, r)| r.severity == Severity::Error));
    }

    #[tokio::test]
    async fn test_debt_checkout_uses_configured_term() {
        let till = till().await;
        till.ctx
            .config
            .update(|s| s.debts.default_term_days = 14)
            .unwrap();
        let radio = till.product("Radio", 5000, 2).await;
        let customer = till.customer().await;
        till.add(&radio, 1).await;

        let before = Utc::now();
        let invoice = till.checkout(CheckoutRequest::debt(&customer)).await.unwrap();

        assert_eq!(invoice.status, SaleStatus::Pending);
        assert_eq!(invoice.remaining_cents, 5000);
        assert_eq!(invoice.customer.as_ref().unwrap().name, "Juma Otieno");
        let due = invoice.due_at.unwrap();
        assert!(due >= before + Duration::days(14));
        assert!(due <= Utc::now() + Duration::days(14));

        let err = delete_customer(&till.ctx.db, &customer).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_debt_checkout_keeps_entered_amount() {
        let till = till().await;
        let kettle = till.product("Electric Kettle", 2400, 3).await;
        let customer = till.customer().await;
        till.add(&kettle, 1).await;

        let mut request = CheckoutRequest::debt(&customer);
        request.tendered_cents = 700;
        let invoice = till.checkout(request).await.unwrap();

        assert_eq!(invoice.tendered_cents, 700);
        assert_eq!(invoice.paid_cents, 0);
        assert_eq!(invoice.remaining_cents, 2400);
        assert_eq!(invoice.change_cents, 0);

        let detail = get_sale(&till.ctx.db, &invoice.sale_id).await.unwrap();
        assert_eq!(detail.sale.tendered_cents, 700);
        assert_eq!(detail.debt.unwrap().amount_cents, 2400);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_once() {
        let till = till().await;
        let soap = till.product("Soap", 90, 6).await;
        till.add(&soap, 2).await;
        let invoice = till.checkout(CheckoutRequest::cash(180)).await.unwrap();

        let first = cancel_sale(&till.ctx.db, &till.notifier, &invoice.sale_id)
            .await
            .unwrap();
        assert!(!first.already_cancelled);
        assert_eq!(first.sale.status, SaleStatus::Cancelled);

        let second = cancel_sale(&till.ctx.db, &till.notifier, &invoice.sale_id)
            .await
            .unwrap();
        assert!(second.already_cancelled);
        assert_eq!(get_product(&till.ctx.db, &soap).await.unwrap().stock, 6);

        let err = cancel_sale(&till.ctx.db, &till.notifier, "missing")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_list_and_detail() {
        let till = till().await;
        let tea = till.product("Tea Leaves", 200, 20).await;
        let customer = till.customer().await;

        till.add(&tea, 1).await;
        till.checkout(CheckoutRequest::cash(200)).await.unwrap();
        till.add(&tea, 3).await;
        let debt = till.checkout(CheckoutRequest::debt(&customer)).await.unwrap();

        let all = list_sales(&till.ctx.db, SaleQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let debts = list_sales(
            &till.ctx.db,
            SaleQuery {
                method: Some(PaymentMethod::Debt),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].id, debt.sale_id);

        let detail = get_sale(&till.ctx.db, &debt.sale_id).await.unwrap();
        assert_eq!(detail.items[0].quantity, 3);
        assert_eq!(detail.debt.unwrap().amount_cents, 600);
        assert_eq!(detail.customer.unwrap().id, customer);
    }
}
