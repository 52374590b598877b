//! # Config Commands
//!
//! Reading and changing the shop settings. Changes are validated and
//! written to the settings file before they take effect.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{AppSettings, ConfigState};

/// Settings as the front end sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub tenant_id: String,
    pub store_name: String,
    pub store_address: Vec<String>,
    pub logo_path: Option<String>,
    pub currency_code: String,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    pub default_term_days: i64,
    pub overdue_poll_interval_secs: u64,
    /// Where changes are saved; absent when they are kept in memory
    pub settings_path: Option<String>,
}

impl SettingsResponse {
    fn new(settings: AppSettings, config: &ConfigState) -> Self {
        SettingsResponse {
            tenant_id: settings.tenant_id,
            store_name: settings.store.name,
            store_address: settings.store.address,
            logo_path: settings.store.logo_path,
            currency_code: settings.currency.code,
            currency_symbol: settings.currency.symbol,
            currency_decimals: settings.currency.decimals,
            default_term_days: settings.debts.default_term_days,
            overdue_poll_interval_secs: settings.debts.overdue_poll_interval_secs,
            settings_path: config.path().map(|p| p.display().to_string()),
        }
    }
}

/// Fields to change. Absent fields keep their value; `logoPath: null`
/// removes the logo.
///
/// The poll interval is read when the watcher starts, so a new value takes
/// effect on the next start.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub store_name: Option<String>,
    pub store_address: Option<Vec<String>>,
    #[serde(default, deserialize_with = "super::present")]
    pub logo_path: Option<Option<String>>,
    pub currency_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub currency_decimals: Option<u8>,
    pub default_term_days: Option<i64>,
    pub overdue_poll_interval_secs: Option<u64>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut AppSettings) {
        if let Some(name) = self.store_name {
            settings.store.name = name.trim().to_string();
        }
        if let Some(address) = self.store_address {
            settings.store.address = address;
        }
        if let Some(logo_path) = self.logo_path {
            settings.store.logo_path = logo_path;
        }
        if let Some(code) = self.currency_code {
            settings.currency.code = code.trim().to_uppercase();
        }
        if let Some(symbol) = self.currency_symbol {
            settings.currency.symbol = symbol;
        }
        if let Some(decimals) = self.currency_decimals {
            settings.currency.decimals = decimals;
        }
        if let Some(days) = self.default_term_days {
            settings.debts.default_term_days = days;
        }
        if let Some(secs) = self.overdue_poll_interval_secs {
            settings.debts.overdue_poll_interval_secs = secs;
        }
    }
}

pub fn get_config(config: &ConfigState) -> SettingsResponse {
    debug!("get_config command");
    SettingsResponse::new(config.snapshot(), config)
}

pub fn update_settings(
    config: &ConfigState,
    update: SettingsUpdate,
) -> Result<SettingsResponse, ApiError> {
    debug!(?update, "update_settings command");

    let settings = config.update(|s| update.apply(s))?;
    info!(store = %settings.store.name, "Settings updated");

    Ok(SettingsResponse::new(settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_update_changes_only_given_fields() {
        let config = ConfigState::in_memory(AppSettings::default());

        let update: SettingsUpdate = serde_json::from_str(
            r#"{ "storeName": " Duka la Amina ", "currencyCode": "kes", "currencySymbol": "KSh " }"#,
        )
        .unwrap();
        let response = update_settings(&config, update).unwrap();

        assert_eq!(response.store_name, "Duka la Amina");
        assert_eq!(response.currency_code, "KES");
        assert_eq!(response.default_term_days, 30);
        assert_eq!(config.format_currency(1250), "KSh 12.50");
        assert_eq!(get_config(&config).store_name, "Duka la Amina");
    }

    #[test]
    fn test_invalid_update_is_refused() {
        let config = ConfigState::in_memory(AppSettings::default());

        let err = update_settings(
            &config,
            SettingsUpdate {
                default_term_days: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(get_config(&config).default_term_days, 30);
    }

    #[test]
    fn test_logo_can_be_removed() {
        let config = ConfigState::in_memory(AppSettings::default());
        update_settings(
            &config,
            SettingsUpdate {
                logo_path: Some(Some("logo.png".into())),
                ..Default::default()
            },
        )
        .unwrap();

        let update: SettingsUpdate = serde_json::from_str(r#"{ "logoPath": null }"#).unwrap();
        let response = update_settings(&config, update).unwrap();

        assert_eq!(response.logo_path, None);
        assert_eq!(response.settings_path, None);
    }
}
