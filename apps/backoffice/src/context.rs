//! # Application Context
//!
//! Everything a command can touch, built once at startup.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       AppContext::open                                  │
//! │                                                                         │
//! │  1. Resolve Database Path ────────────────────────────────────────────► │
//! │     • [database].path / KASSA_DB_PATH if set                            │
//! │     • Linux: ~/.local/share/kassa-pos/kassa.db                          │
//! │     • macOS: ~/Library/Application Support/com.kassa.pos/kassa.db       │
//! │                                                                         │
//! │  2. Connect ──────────────────────────────────────────────────────────► │
//! │     • SQLite with WAL mode, foreign keys on                             │
//! │     • Run pending migrations                                            │
//! │                                                                         │
//! │  3. Build State ──────────────────────────────────────────────────────► │
//! │     • DbState bound to the configured tenant                            │
//! │     • Empty CartState                                                   │
//! │     • Notifier logging through tracing                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;
use tracing::info;

use kassa_db::{Database, DbConfig, DbError};

use crate::notification::Notifier;
use crate::state::{AppSettings, CartState, ConfigState, DbState};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Could not determine the app data directory")]
    NoDataDir,

    #[error("Could not create data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// The state commands are handed, one of each.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub db: DbState,
    pub cart: CartState,
    pub config: ConfigState,
    pub notifier: Notifier,
}

impl AppContext {
    /// Opens the configured database and builds the state around it.
    pub async fn open(config: ConfigState) -> Result<Self, StartupError> {
        let db_path = database_path(&config.snapshot())?;
        info!(?db_path, "Database path determined");

        let db = Database::new(DbConfig::new(db_path)).await?;
        info!("Database connected and migrations applied");

        Ok(Self::assemble(db, config))
    }

    /// A context over a fresh in-memory database with default settings.
    pub async fn in_memory() -> Result<Self, StartupError> {
        let db = Database::new(DbConfig::in_memory()).await?;
        Ok(Self::assemble(db, ConfigState::in_memory(AppSettings::default())))
    }

    fn assemble(db: Database, config: ConfigState) -> Self {
        AppContext {
            db: DbState::new(db, config.tenant_id()),
            cart: CartState::new(),
            notifier: Notifier::new(config.clone()),
            config,
        }
    }
}

fn database_path(settings: &AppSettings) -> Result<PathBuf, StartupError> {
    if let Some(path) = &settings.database.path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path.clone());
    }

    let dirs = ProjectDirs::from("com", "kassa", "pos").ok_or(StartupError::NoDataDir)?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("kassa.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_context_is_scoped_to_configured_tenant() {
        let ctx = AppContext::in_memory().await.unwrap();

        assert_eq!(ctx.db.tenant_id(), &ctx.config.tenant_id());
        assert!(ctx.cart.with_cart(|c| c.is_empty()));
        assert!(ctx.db.inner().health_check().await);
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let mut settings = AppSettings::default();
        settings.database.path = Some(PathBuf::from("kassa-test.db"));

        assert_eq!(database_path(&settings).unwrap(), PathBuf::from("kassa-test.db"));
    }
}
