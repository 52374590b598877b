//! End-to-end sale and debt lifecycle against an in-memory database.

use chrono::{Duration, Utc};

use kassa_core::checkout::{CheckoutLine, PaymentDetails};
use kassa_core::{
    CoreError, DebtFilter, DebtSettlement, PaymentMethod, Product, SaleDetail, SaleFilter,
    SaleStatus, TenantId,
};
use kassa_db::{Database, DbConfig, LedgerError, NewCustomer, NewProduct, TenantScope};

async fn shop() -> (Database, TenantScope) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let scope = db.tenant(TenantId::default());
    (db, scope)
}

async fn product(shop: &TenantScope, name: &str, price_cents: i64, stock: i64) -> Product {
    shop.products()
        .insert(NewProduct {
            name: name.to_string(),
            price_cents,
            stock,
            category_id: None,
            image_path: None,
        })
        .await
        .unwrap()
}

async fn customer_id(shop: &TenantScope) -> String {
    shop.customers()
        .insert(NewCustomer {
            name: "Amina Wanjiru".to_string(),
            phone: "+254712345678".to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn stock_of(shop: &TenantScope, id: &str) -> i64 {
    shop.products().get(id).await.unwrap().unwrap().stock
}

async fn assert_nothing_written(shop: &TenantScope) {
    assert!(shop.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    assert!(shop
        .debts()
        .list(&DebtFilter::default(), Utc::now())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn checkout_totals_items_and_decrements_stock() {
    let (_db, shop) = shop().await;
    let milk = product(&shop, "Milk", 120, 10).await;
    let bread = product(&shop, "Bread", 250, 5).await;

    let lines = [CheckoutLine::new(&milk.id, 3), CheckoutLine::new(&bread.id, 2)];
    let detail = shop
        .ledger()
        .checkout(&lines, &PaymentDetails::cash(1000))
        .await
        .unwrap();

    assert_eq!(detail.sale.total_cents, 860);
    assert_eq!(detail.items_total().cents(), detail.sale.total_cents);
    assert_eq!(detail.sale.status, SaleStatus::Completed);
    assert_eq!(detail.sale.change_cents, 140);
    assert_eq!(detail.sale.remaining_cents, 0);
    assert!(detail.debt.is_none());

    assert_eq!(stock_of(&shop, &milk.id).await, 7);
    assert_eq!(stock_of(&shop, &bread.id).await, 3);

    // What was returned is what was stored
    let stored = shop.sales().get_detail(&detail.sale.id).await.unwrap().unwrap();
    assert_eq!(stored.items.len(), 2);
    assert_eq!(stored.items[0].name_snapshot, "Milk");
    assert_eq!(stored.items[1].subtotal_cents, 500);
}

#[tokio::test]
async fn price_changes_do_not_rewrite_history() {
    let (_db, shop) = shop().await;
    let milk = product(&shop, "Milk", 120, 10).await;

    let sale = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&milk.id, 1)], &PaymentDetails::card(120))
        .await
        .unwrap();

    shop.products()
        .update(
            &milk.id,
            kassa_db::ProductUpdate {
                price_cents: Some(999),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let items = shop.sales().get_items(&sale.sale.id).await.unwrap();
    assert_eq!(items[0].unit_price_cents, 120);
}

#[tokio::test]
async fn insufficient_stock_has_no_side_effects() {
    let (_db, shop) = shop().await;
    let plenty = product(&shop, "Rice", 300, 50).await;
    let scarce = product(&shop, "Sugar", 200, 3).await;

    let lines = [CheckoutLine::new(&plenty.id, 1), CheckoutLine::new(&scarce.id, 10)];
    let err = shop
        .ledger()
        .checkout(&lines, &PaymentDetails::cash(10_000))
        .await
        .unwrap_err();

    match err {
        LedgerError::Rejected(CoreError::InsufficientStock {
            product,
            available,
            requested,
        }) => {
            assert_eq!(product, "Sugar");
            assert_eq!(available, 3);
            assert_eq!(requested, 10);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(stock_of(&shop, &plenty.id).await, 50);
    assert_eq!(stock_of(&shop, &scarce.id).await, 3);
    assert_nothing_written(&shop).await;
}

#[tokio::test]
async fn rejected_checkouts_write_nothing() {
    let (_db, shop) = shop().await;
    let milk = product(&shop, "Milk", 120, 10).await;
    let lines = [CheckoutLine::new(&milk.id, 2)];

    let err = shop
        .ledger()
        .checkout(&lines, &PaymentDetails::debt(""))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::MissingCustomerForDebt)));

    let err = shop
        .ledger()
        .checkout(&lines, &PaymentDetails::cash(100))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::InsufficientPayment { .. })));

    let err = shop
        .ledger()
        .checkout(&[], &PaymentDetails::cash(100))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::EmptyCart)));

    assert_eq!(stock_of(&shop, &milk.id).await, 10);
    assert_nothing_written(&shop).await;
}

#[tokio::test]
async fn debt_sale_opens_debt_for_full_total() {
    let (_db, shop) = shop().await;
    let radio = product(&shop, "Radio", 2500, 4).await;
    let customer = customer_id(&shop).await;

    let before = Utc::now();
    let detail = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&radio.id, 2)], &PaymentDetails::debt(&customer))
        .await
        .unwrap();

    assert_eq!(detail.sale.payment_method, PaymentMethod::Debt);
    assert_eq!(detail.sale.status, SaleStatus::Pending);
    assert_eq!(detail.sale.total_cents, 5000);
    assert_eq!(detail.sale.remaining_cents, 5000);
    assert_eq!(detail.customer.as_ref().map(|c| c.id.as_str()), Some(customer.as_str()));

    let debt = shop.debts().get_by_sale(&detail.sale.id).await.unwrap().unwrap();
    assert_eq!(debt.amount_cents, 5000);
    assert!(!debt.settled);
    assert_eq!(debt.customer_id, customer);

    let expected = before + Duration::days(30);
    let drift = (debt.due_at - expected).num_seconds().abs();
    assert!(drift < 60, "due date off by {drift}s");
}

#[tokio::test]
async fn installments_settle_debt_and_complete_sale() {
    let (_db, shop) = shop().await;
    let radio = product(&shop, "Radio", 5000, 1).await;
    let customer = customer_id(&shop).await;
    let sale = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&radio.id, 1)], &PaymentDetails::debt(&customer))
        .await
        .unwrap();
    let debt_id = sale.debt.unwrap().id;

    let first = shop.ledger().apply_payment(&debt_id, 2000).await.unwrap();
    assert!(!first.settled());
    assert_eq!(first.remaining.cents(), 3000);
    assert_eq!(first.sale.status, SaleStatus::Pending);
    assert_eq!(first.sale.paid_cents, 2000);
    assert_eq!(first.sale.remaining_cents, 3000);

    let second = shop.ledger().apply_payment(&debt_id, 3000).await.unwrap();
    assert!(second.settled());
    assert_eq!(second.remaining.cents(), 0);
    assert_eq!(second.debt.settlement, Some(DebtSettlement::Paid));
    assert!(second.debt.settled_at.is_some());

    let stored = shop.sales().get(&sale.sale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SaleStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(shop.debts().total_paid(&debt_id).await.unwrap().cents(), 5000);

    let err = shop.ledger().apply_payment(&debt_id, 100).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::DebtAlreadySettled(_))));
}

#[tokio::test]
async fn invalid_payments_are_refused() {
    let (_db, shop) = shop().await;
    let radio = product(&shop, "Radio", 5000, 1).await;
    let customer = customer_id(&shop).await;
    let sale = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&radio.id, 1)], &PaymentDetails::debt(&customer))
        .await
        .unwrap();
    let debt_id = sale.debt.unwrap().id;

    for amount in [0, -500] {
        let err = shop.ledger().apply_payment(&debt_id, amount).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::InvalidAmount { .. })));
    }

    let err = shop.ledger().apply_payment(&debt_id, 5001).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::PaymentExceedsBalance { .. })));

    let err = shop.ledger().apply_payment("missing", 100).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::DebtNotFound(_))));

    assert!(shop.debts().payments(&debt_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_cash_sale_restores_stock_once() {
    let (_db, shop) = shop().await;
    let p = product(&shop, "Soap", 150, 8).await;

    let sale = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&p.id, 2)], &PaymentDetails::cash(300))
        .await
        .unwrap();
    assert_eq!(stock_of(&shop, &p.id).await, 6);

    let cancelled = shop.ledger().cancel_sale(&sale.sale.id).await.unwrap();
    assert!(!cancelled.already_cancelled);
    assert!(!cancelled.debt_written_off);
    assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
    assert!(cancelled.sale.cancelled_at.is_some());
    assert_eq!(stock_of(&shop, &p.id).await, 8);

    let again = shop.ledger().cancel_sale(&sale.sale.id).await.unwrap();
    assert!(again.already_cancelled);
    assert_eq!(stock_of(&shop, &p.id).await, 8);

    let err = shop.ledger().cancel_sale("missing").await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::SaleNotFound(_))));
}

#[tokio::test]
async fn cancelling_debt_sale_writes_off_debt() {
    let (_db, shop) = shop().await;
    let p = product(&shop, "Radio", 2500, 3).await;
    let customer = customer_id(&shop).await;
    let sale = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&p.id, 1)], &PaymentDetails::debt(&customer))
        .await
        .unwrap();
    let debt_id = sale.debt.unwrap().id;
    shop.ledger().apply_payment(&debt_id, 500).await.unwrap();

    let cancelled = shop.ledger().cancel_sale(&sale.sale.id).await.unwrap();
    assert!(cancelled.debt_written_off);
    assert_eq!(stock_of(&shop, &p.id).await, 3);

    let debt = shop.debts().get(&debt_id).await.unwrap().unwrap();
    assert!(debt.settled);
    assert_eq!(debt.settlement, Some(DebtSettlement::WrittenOff));
    assert!(debt.settled_at.is_some());

    // The customer still has history, so deletion is refused
    let err = shop.customers().delete(&customer).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(CoreError::CustomerHasSales { sales: 1, .. })));
}

#[tokio::test]
async fn overdue_is_derived_from_due_date_and_settlement() {
    let (_db, shop) = shop().await;
    let p = product(&shop, "Radio", 1000, 5).await;
    let customer = customer_id(&shop).await;

    let mut debt_ids = Vec::new();
    for _ in 0..2 {
        let sale = shop
            .ledger()
            .checkout(&[CheckoutLine::new(&p.id, 1)], &PaymentDetails::debt(&customer))
            .await
            .unwrap();
        debt_ids.push(sale.debt.unwrap().id);
    }

    let now = Utc::now();
    assert!(shop.debts().overdue(now).await.unwrap().is_empty());

    let later = now + Duration::days(31);
    let overdue = shop.debts().overdue(later).await.unwrap();
    assert_eq!(overdue.len(), 2);
    assert!(overdue.iter().all(|d| d.is_overdue(later)));
    assert_eq!(overdue[0].customer_name, "Amina Wanjiru");

    shop.ledger().mark_debt_paid(&debt_ids[0]).await.unwrap();

    let overdue = shop.debts().overdue(later).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, debt_ids[1]);

    let settled = shop
        .debts()
        .list(
            &DebtFilter {
                settled: Some(true),
                ..Default::default()
            },
            later,
        )
        .await
        .unwrap();
    assert_eq!(settled.len(), 1);
    assert!(!settled[0].is_overdue(later));
    assert_eq!(settled[0].remaining().cents(), 0);
}

#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() {
    let (_db, shop) = shop().await;
    let last = product(&shop, "Last Loaf", 250, 1).await;
    let lines = [CheckoutLine::new(&last.id, 1)];
    let payment = PaymentDetails::cash(250);

    let ledger_a = shop.ledger();
    let ledger_b = shop.ledger();
    let (a, b) = tokio::join!(
        ledger_a.checkout(&lines, &payment),
        ledger_b.checkout(&lines, &payment),
    );

    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(failure, LedgerError::Rejected(CoreError::InsufficientStock { .. })));
    assert_eq!(stock_of(&shop, &last.id).await, 0);
}

#[tokio::test]
async fn sale_detail_survives_json_round_trip() {
    let (_db, shop) = shop().await;
    let a = product(&shop, "Tea", 333, 10).await;
    let b = product(&shop, "Honey", 1099, 10).await;
    let c = product(&shop, "Bread", 1, 10).await;

    let lines = [
        CheckoutLine::new(&a.id, 3),
        CheckoutLine::new(&b.id, 1),
        CheckoutLine::new(&c.id, 7),
    ];
    let detail = shop
        .ledger()
        .checkout(&lines, &PaymentDetails::card(2105))
        .await
        .unwrap();

    let json = serde_json::to_string(&detail).unwrap();
    let back: SaleDetail = serde_json::from_str(&json).unwrap();

    assert_eq!(back.sale.total_cents, 2105);
    assert_eq!(back.sale.total_cents, detail.sale.total_cents);
    let quantities: Vec<i64> = back.items.iter().map(|i| i.quantity).collect();
    assert_eq!(quantities, vec![3, 1, 7]);
    let subtotals: Vec<i64> = back.items.iter().map(|i| i.subtotal_cents).collect();
    assert_eq!(subtotals, vec![999, 1099, 7]);
}

/// A throwaway database file with a real connection pool, so checkouts
/// race on separate connections the way a busy till does.
async fn shop_on_disk(max_connections: u32) -> (Database, TenantScope, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("kassa-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(max_connections))
        .await
        .unwrap();
    let scope = db.tenant(TenantId::default());
    (db, scope, path)
}

async fn remove_db(db: Database, path: std::path::PathBuf) {
    db.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkouts_on_separate_connections_sell_the_last_unit_once() {
    let (db, shop, path) = shop_on_disk(4).await;
    let last = product(&shop, "Last Loaf", 250, 1).await;
    let lines = [CheckoutLine::new(&last.id, 1)];
    let payment = PaymentDetails::cash(250);

    let (l1, l2, l3, l4) = (shop.ledger(), shop.ledger(), shop.ledger(), shop.ledger());
    let (a, b, c, d) = tokio::join!(
        l1.checkout(&lines, &payment),
        l2.checkout(&lines, &payment),
        l3.checkout(&lines, &payment),
        l4.checkout(&lines, &payment),
    );

    let mut sold = 0;
    for result in [a, b, c, d] {
        match result {
            Ok(detail) => {
                sold += 1;
                assert_eq!(detail.sale.total_cents, 250);
            }
            Err(err) => assert!(
                matches!(
                    err,
                    LedgerError::Rejected(CoreError::InsufficientStock { available: 0, .. })
                ),
                "unexpected failure: {err:?}"
            ),
        }
    }
    assert_eq!(sold, 1);
    assert_eq!(stock_of(&shop, &last.id).await, 0);
    assert_eq!(shop.sales().list(&SaleFilter::default()).await.unwrap().len(), 1);

    remove_db(db, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkouts_on_separate_connections_all_succeed_when_stock_allows() {
    let (db, shop, path) = shop_on_disk(4).await;
    let rice = product(&shop, "Rice 2kg", 1500, 3).await;
    let oil = product(&shop, "Cooking Oil", 800, 3).await;
    let rice_line = [CheckoutLine::new(&rice.id, 1)];
    let both = [CheckoutLine::new(&rice.id, 2), CheckoutLine::new(&oil.id, 1)];

    let (l1, l2) = (shop.ledger(), shop.ledger());
    let (cash, card) = (PaymentDetails::cash(1500), PaymentDetails::card(3800));
    let (a, b) = tokio::join!(
        l1.checkout(&rice_line, &cash),
        l2.checkout(&both, &card),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_ne!(a.sale.invoice_number, b.sale.invoice_number);
    assert_eq!(stock_of(&shop, &rice.id).await, 0);
    assert_eq!(stock_of(&shop, &oil.id).await, 2);

    remove_db(db, path).await;
}

#[tokio::test]
async fn free_items_on_credit_leave_no_debt_behind() {
    let (_db, shop) = shop().await;
    let sample = product(&shop, "Tasting Sample", 0, 5).await;
    let customer = customer_id(&shop).await;

    let err = shop
        .ledger()
        .checkout(&[CheckoutLine::new(&sample.id, 1)], &PaymentDetails::debt(customer))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Rejected(CoreError::InvalidAmount { .. })));
    assert_nothing_written(&shop).await;
    assert_eq!(stock_of(&shop, &sample.id).await, 5);
}
