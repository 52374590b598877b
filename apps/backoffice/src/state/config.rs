//! # Configuration State
//!
//! Shop settings loaded at startup and written back whenever they change.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASSA_TENANT_ID, KASSA_STORE_NAME, KASSA_DB_PATH, ...              │
//! │                                                                         │
//! │  2. TOML Settings File                                                 │
//! │     ~/.config/kassa-pos/settings.toml (Linux)                          │
//! │     ~/Library/Application Support/com.kassa.pos/settings.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//!   startup ──► ConfigState::load ──► validate ──► AppContext
//!                                                     │
//!   update_settings command ──► ConfigState::update ──┤
//!                                  │                  │
//!                                  ├── validate       │
//!                                  ├── write TOML     │
//!                                  └── swap in memory ┘
//! ```
//! A change that fails validation or cannot be written leaves both the file
//! and the in-memory settings untouched.
//!
//! ## Settings File Format
//! ```toml
//! tenant_id = "00000000-0000-0000-0000-000000000001"
//!
//! [store]
//! name = "Duka la Amina"
//! address = ["Moi Avenue 12", "Nairobi"]
//! logo_path = "/srv/kassa/logo.png"
//!
//! [currency]
//! code = "KES"
//! symbol = "KSh "
//! decimals = 2
//!
//! [debts]
//! default_term_days = 30
//! overdue_poll_interval_secs = 60
//!
//! [database]
//! path = "/var/lib/kassa/kassa.db"
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use kassa_core::validation::validate_debt_term_days;
use kassa_core::{TenantId, DEFAULT_DEBT_TERM_DAYS, DEFAULT_TENANT_ID, OVERDUE_POLL_INTERVAL_SECS};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

// =============================================================================
// Settings
// =============================================================================

/// Everything the shop can configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// The enterprise this installation serves. Fixed for the process
    /// lifetime; changes take effect on restart.
    pub tenant_id: String,
    pub store: StoreSettings,
    pub currency: CurrencySettings,
    pub debts: DebtSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Printed at the top of invoices
    pub name: String,
    pub address: Vec<String>,
    /// Logo reference for invoice rendering
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencySettings {
    /// ISO 4217
    pub code: String,
    pub symbol: String,
    /// Minor-unit digits; amounts are stored in minor units
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtSettings {
    /// Due date offset for credit sales without an explicit due date
    pub default_term_days: i64,
    pub overdue_poll_interval_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `None` uses the platform data directory
    pub path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            store: StoreSettings::default(),
            currency: CurrencySettings::default(),
            debts: DebtSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: "Kassa Dev Store".to_string(),
            address: Vec::new(),
            logo_path: None,
        }
    }
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: "USD".to_string(),
            symbol: "$".to_string(),
            decimals: 2,
        }
    }
}

impl Default for DebtSettings {
    fn default() -> Self {
        DebtSettings {
            default_term_days: DEFAULT_DEBT_TERM_DAYS,
            overdue_poll_interval_secs: OVERDUE_POLL_INTERVAL_SECS,
        }
    }
}

impl AppSettings {
    /// Checks every field that has a constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::Invalid("tenant_id must not be empty".into()));
        }
        if self.store.name.trim().is_empty() {
            return Err(ConfigError::Invalid("store name must not be empty".into()));
        }
        if self.currency.code.len() != 3 || !self.currency.code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "currency code '{}' is not an ISO 4217 code",
                self.currency.code
            )));
        }
        if self.currency.decimals > 4 {
            return Err(ConfigError::Invalid("currency decimals must be 0-4".into()));
        }
        validate_debt_term_days(self.debts.default_term_days)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.debts.overdue_poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "overdue poll interval must be at least one second".into(),
            ));
        }
        Ok(())
    }

    /// Applies `KASSA_*` overrides read through `var`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("KASSA_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant from environment");
            self.tenant_id = id;
        }
        if let Some(name) = var("KASSA_STORE_NAME") {
            self.store.name = name;
        }
        if let Some(code) = var("KASSA_CURRENCY_CODE") {
            self.currency.code = code.to_uppercase();
        }
        if let Some(symbol) = var("KASSA_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }
        if let Some(days) = var("KASSA_DEBT_TERM_DAYS") {
            match days.parse() {
                Ok(d) => self.debts.default_term_days = d,
                Err(_) => warn!(value = %days, "Ignoring non-numeric KASSA_DEBT_TERM_DAYS"),
            }
        }
        if let Some(secs) = var("KASSA_OVERDUE_POLL_SECS") {
            match secs.parse() {
                Ok(s) => self.debts.overdue_poll_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric KASSA_OVERDUE_POLL_SECS"),
            }
        }
        if let Some(path) = var("KASSA_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }
}

// =============================================================================
// ConfigState
// =============================================================================

/// Shared, persisted settings.
///
/// Cloning is cheap; every clone sees the same settings.
#[derive(Debug, Clone)]
pub struct ConfigState {
    settings: Arc<RwLock<AppSettings>>,
    /// Where changes are written. `None` keeps changes in memory only.
    path: Option<PathBuf>,
}

impl ConfigState {
    /// Loads settings from `path` (or the platform default), then the
    /// environment, and validates the result.
    ///
    /// A missing file is not an error: defaults are used and the file is
    /// created on the first change.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(path.or_else(Self::default_path), |key| std::env::var(key).ok())
    }

    fn load_with(
        path: Option<PathBuf>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut settings = match &path {
            Some(p) if p.exists() => {
                info!(path = ?p, "Loading settings");
                toml::from_str(&std::fs::read_to_string(p)?)?
            }
            Some(p) => {
                debug!(path = ?p, "Settings file not found, using defaults");
                AppSettings::default()
            }
            None => AppSettings::default(),
        };

        settings.apply_overrides(var);
        settings.validate()?;

        Ok(ConfigState {
            settings: Arc::new(RwLock::new(settings)),
            path,
        })
    }

    /// Settings that live only in memory (tests, one-off tools).
    pub fn in_memory(settings: AppSettings) -> Self {
        ConfigState {
            settings: Arc::new(RwLock::new(settings)),
            path: None,
        }
    }

    /// Platform settings location, e.g. `~/.config/kassa-pos/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "kassa", "pos").map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of the current settings.
    pub fn snapshot(&self) -> AppSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.read(|s| s.tenant_id.clone()))
    }

    pub fn default_term_days(&self) -> i64 {
        self.read(|s| s.debts.default_term_days)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.read(|s| s.debts.overdue_poll_interval_secs))
    }

    /// Applies `change`, validates, persists, then publishes.
    ///
    /// The tenant id cannot be changed at runtime.
    pub fn update(&self, change: impl FnOnce(&mut AppSettings)) -> Result<AppSettings, ConfigError> {
        let mut guard = self.settings.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = guard.clone();
        change(&mut next);

        if next.tenant_id != guard.tenant_id {
            return Err(ConfigError::Invalid(
                "tenant_id can only be changed in the settings file".into(),
            ));
        }
        next.validate()?;

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&next)?)?;
            info!(path = ?path, "Settings saved");
        }

        *guard = next.clone();
        Ok(next)
    }

    /// Formats a minor-unit amount with the configured currency.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = ConfigState::in_memory(AppSettings::default());
    /// assert_eq!(config.format_currency(1234), "$12.34");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        self.read(|s| format_amount(&s.currency, cents))
    }

    fn read<R>(&self, f: impl FnOnce(&AppSettings) -> R) -> R {
        f(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn format_amount(currency: &CurrencySettings, cents: i64) -> String {
    let divisor = 10_i64.pow(currency.decimals as u32);
    let whole = cents / divisor;
    let frac = (cents % divisor).abs();

    format!(
        "{}{}{}",
        if cents < 0 { "-" } else { "" },
        currency.symbol,
        if currency.decimals > 0 {
            format!(
                "{}.{:0width$}",
                whole.abs(),
                frac,
                width = currency.decimals as usize
            )
        } else {
            whole.abs().to_string()
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_settings_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kassa-config-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("settings.toml")
    }

    #[test]
    fn test_format_currency() {
        let config = ConfigState::in_memory(AppSettings::default());
        assert_eq!(config.format_currency(1234), "$12.34");
        assert_eq!(config.format_currency(100), "$1.00");
        assert_eq!(config.format_currency(1), "$0.01");
        assert_eq!(config.format_currency(-1234), "-$12.34");
    }

    #[test]
    fn test_format_currency_without_minor_units() {
        let mut settings = AppSettings::default();
        settings.currency = CurrencySettings {
            code: "UGX".into(),
            symbol: "USh ".into(),
            decimals: 0,
        };
        let config = ConfigState::in_memory(settings);
        assert_eq!(config.format_currency(15000), "USh 15000");
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_settings_path("env");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "[store]\nname = \"From File\"\n\n[debts]\ndefault_term_days = 14\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> =
            [("KASSA_STORE_NAME", "From Env"), ("KASSA_OVERDUE_POLL_SECS", "5")].into();
        let config =
            ConfigState::load_with(Some(path), |k| env.get(k).map(|v| v.to_string())).unwrap();

        let settings = config.snapshot();
        assert_eq!(settings.store.name, "From Env");
        assert_eq!(settings.debts.default_term_days, 14);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.currency.code, "USD");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_settings_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[debts]\ndefault_term_days = 0\n").unwrap();

        let err = ConfigState::load_with(Some(path), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let path = temp_settings_path("persist");
        let config = ConfigState::load_with(Some(path.clone()), |_| None).unwrap();

        config
            .update(|s| {
                s.store.name = "Duka la Amina".into();
                s.currency.code = "KES".into();
                s.currency.symbol = "KSh ".into();
            })
            .unwrap();
        assert_eq!(config.format_currency(5000), "KSh 50.00");

        let reloaded = ConfigState::load_with(Some(path), |_| None).unwrap();
        assert_eq!(reloaded.snapshot().store.name, "Duka la Amina");
        assert_eq!(reloaded.snapshot().currency.code, "KES");
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let config = ConfigState::in_memory(AppSettings::default());

        let err = config.update(|s| s.debts.default_term_days = -3).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = config.update(|s| s.tenant_id = "someone-else".into()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        assert_eq!(config.snapshot(), AppSettings::default());
    }
}
