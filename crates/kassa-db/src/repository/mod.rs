//! # Repository Module
//!
//! Tenant-scoped database repositories for Kassa POS.
//!
//! ## Tenant Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How Tenancy Is Enforced                              │
//! │                                                                         │
//! │  Database                                                              │
//! │     │  db.tenant(TenantId)                                             │
//! │     ▼                                                                   │
//! │  TenantScope { pool, tenant_id }                                       │
//! │     │                                                                   │
//! │     ├── products()   ──► ProductRepository  { pool, tenant_id }        │
//! │     ├── categories() ──► CategoryRepository { pool, tenant_id }        │
//! │     ├── customers()  ──► CustomerRepository { pool, tenant_id }        │
//! │     ├── sales()      ──► SaleRepository     { pool, tenant_id }        │
//! │     ├── debts()      ──► DebtRepository     { pool, tenant_id }        │
//! │     ├── reports()    ──► ReportRepository   { pool, tenant_id }        │
//! │     └── ledger()     ──► Ledger             { pool, tenant_id }        │
//! │                                                                         │
//! │  Every statement binds `tenant_id`. Repository constructors are        │
//! │  crate-private, so a caller cannot build one for "no tenant".          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;

use kassa_core::TenantId;

use crate::ledger::Ledger;

pub mod category;
pub mod customer;
pub mod debt;
pub mod product;
pub mod report;
pub mod sale;

pub use category::CategoryRepository;
pub use customer::{CustomerRepository, NewCustomer};
pub use debt::DebtRepository;
pub use product::{NewProduct, ProductRepository, ProductUpdate};
pub use report::ReportRepository;
pub use sale::SaleRepository;

/// Access to the repositories of a single tenant.
#[derive(Debug, Clone)]
pub struct TenantScope {
    pool: SqlitePool,
    tenant_id: TenantId,
}

impl TenantScope {
    pub(crate) fn new(pool: SqlitePool, tenant_id: TenantId) -> Self {
        TenantScope { pool, tenant_id }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn debts(&self) -> DebtRepository {
        DebtRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Transactional writes: checkout, cancellation, debt payments.
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.pool.clone(), self.tenant_id.clone())
    }
}

/// Test fixtures shared by the repository and ledger unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::{Database, DbConfig};
    use kassa_core::{Customer, Product};

    pub async fn shop() -> (Database, TenantScope) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = db.tenant(TenantId::default());
        (db, scope)
    }

    pub async fn product(scope: &TenantScope, name: &str, price_cents: i64, stock: i64) -> Product {
        scope
            .products()
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

    pub async fn customer(scope: &TenantScope, name: &str, phone: &str) -> Customer {
        scope
            .customers()
            .insert(NewCustomer {
                name: name.to_string(),
                phone: phone.to_string(),
            })
            .await
            .unwrap()
    }
}
