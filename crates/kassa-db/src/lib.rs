//! # kassa-db: Database Layer for Kassa POS
//!
//! SQLite storage for the back office, accessed asynchronously with sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kassa POS Data Flow                              │
//! │                                                                         │
//! │  Back office command (checkout, record_debt_payment, ...)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kassa-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  TenantScope  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│  repositories │    │  (embedded)  │  │   │
//! │  │   │               │    │  + Ledger     │    │              │  │   │
//! │  │   │ SqlitePool    │    │               │    │ 001_initial  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and ledger error types
//! - [`repository`] - Tenant-scoped reads and simple writes
//! - [`ledger`] - Checkout, cancellation and debt payment transactions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kassa_core::{checkout::{CheckoutLine, PaymentDetails}, TenantId};
//! use kassa_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kassa.db")).await?;
//! let shop = db.tenant(TenantId::default());
//!
//! let sale = shop
//!     .ledger()
//!     .checkout(&[CheckoutLine::new(product_id, 2)], &PaymentDetails::cash(1000))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::{Cancellation, Ledger, PaymentReceipt};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    CategoryRepository, CustomerRepository, DebtRepository, NewCustomer, NewProduct,
    ProductRepository, ProductUpdate, ReportRepository, SaleRepository, TenantScope,
};
