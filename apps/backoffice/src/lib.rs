//! # Kassa Back Office Library
//!
//! Everything a front end binds to: commands, the shared state they work
//! on, notifications and the overdue-debt watcher.
//!
//! ## Module Organization
//! ```text
//! kassa_backoffice/
//! ├── lib.rs           ◄─── You are here (startup & run)
//! ├── context.rs       ◄─── AppContext: one of each state, built at startup
//! ├── state/
//! │   ├── mod.rs       ◄─── State type exports
//! │   ├── db.rs        ◄─── Database + tenant wrapper
//! │   ├── cart.rs      ◄─── Cart state management
//! │   └── config.rs    ◄─── Settings file, env overrides, currency format
//! ├── commands/        ◄─── Product, cart, sale, debt, report, config ...
//! ├── notification.rs  ◄─── User-facing messages and where they go
//! ├── watcher.rs       ◄─── Periodic overdue-debt check
//! └── error.rs         ◄─── API error type for commands
//! ```
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Sale States                                          │
//! │                                                                         │
//! │   checkout (cash) ─────────────────────────────► Completed              │
//! │                                                      │                  │
//! │   checkout (debt) ──► Pending ── debt settled ──►────┘                  │
//! │                          │                                              │
//! │                          └──── cancel_sale ────► Cancelled              │
//! │                                 (stock restored, debt written off)      │
//! │                                                                         │
//! │   Completed ──── cancel_sale ────► Cancelled                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod context;
pub mod error;
pub mod notification;
pub mod state;
pub mod watcher;

pub use context::AppContext;

use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use state::ConfigState;
use watcher::OverdueWatcher;

/// Runs the back office until Ctrl+C or SIGTERM.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Back Office Startup                               │
/// │                                                                         │
/// │  1. Initialize Logging ───────────────────────────────────────────────► │
/// │     • tracing-subscriber with env filter (RUST_LOG)                     │
/// │                                                                         │
/// │  2. Load Settings ────────────────────────────────────────────────────► │
/// │     • TOML file (given path or platform config dir)                     │
/// │     • KASSA_* environment overrides                                     │
/// │                                                                         │
/// │  3. Open Database ────────────────────────────────────────────────────► │
/// │     • SQLite with WAL mode, pending migrations applied                  │
/// │                                                                         │
/// │  4. Start Overdue Watcher ────────────────────────────────────────────► │
/// │     • Polls open debts every overdue_poll_interval_secs                 │
/// │                                                                         │
/// │  5. Wait for Shutdown ────────────────────────────────────────────────► │
/// │     • Stop the watcher, close the pool                                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Kassa back office");

    let config = ConfigState::load(config_path)?;
    let ctx = AppContext::open(config).await?;
    info!(tenant_id = %ctx.db.tenant_id(), "Database connected and migrations applied");

    let watcher = OverdueWatcher::spawn(
        ctx.db.shop().debts(),
        ctx.notifier.clone(),
        ctx.config.poll_interval(),
    );

    shutdown_signal().await;

    watcher.shutdown().await;
    ctx.db.inner().close().await;

    info!("Back office shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=kassa=trace` - Show trace for kassa crates only
/// - Default: INFO, DEBUG for kassa crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kassa=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping...");
}
