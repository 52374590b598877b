//! # Kassa Back Office Entry Point
//!
//! ```text
//! kassa-backoffice [SETTINGS_FILE]
//! ```
//!
//! Without an argument the settings file is looked up in the platform
//! config directory. The setup lives in lib.rs so it can be tested.

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    kassa_backoffice::run(config_path).await
}
