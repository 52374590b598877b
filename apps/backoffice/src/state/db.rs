//! # Database State
//!
//! Wraps the `Database` together with the tenant this installation serves.
//!
//! ## Thread Safety
//! `Database` holds a `SqlitePool`, which is already safe to share. Multiple
//! commands can execute queries concurrently without explicit locking.
//!
//! ## Usage in Commands
//! ```rust,ignore
//! pub async fn search_products(db: &DbState, query: &str) -> Result<Vec<ProductDto>, ApiError> {
//!     let products = db.shop().products().search(query, 20).await?;
//!     Ok(products.into_iter().map(ProductDto::from).collect())
//! }
//! ```

use kassa_core::TenantId;
use kassa_db::{Database, TenantScope};

/// Database handle bound to one tenant.
///
/// Commands never see an unscoped `Database`; they go through
/// [`DbState::shop`], so every query they issue carries the tenant id.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
    tenant_id: TenantId,
}

impl DbState {
    pub fn new(db: Database, tenant_id: TenantId) -> Self {
        DbState { db, tenant_id }
    }

    /// Repositories and ledger for this installation's tenant.
    pub fn shop(&self) -> TenantScope {
        self.db.tenant(self.tenant_id.clone())
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The underlying pool owner, for startup and shutdown.
    pub fn inner(&self) -> &Database {
        &self.db
    }
}
