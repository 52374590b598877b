//! # Notifications
//!
//! Messages the back office raises for the person at the till: outcomes of
//! commands and alerts from background checks.
//!
//! ## One Kind, One Treatment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Notification (tagged enum)          render()          Severity         │
//! │  ──────────────────────────          ────────          ────────         │
//! │  Success { message }          ──►  title + body  ──►  Success          │
//! │  Info { message }             ──►  title + body  ──►  Info             │
//! │  Warning { message }          ──►  title + body  ──►  Warning          │
//! │  Error { message }            ──►  title + body  ──►  Error            │
//! │  DebtOverdue { .. }           ──►  title + body  ──►  Warning          │
//! │                                                                         │
//! │  Notifier::dispatch ──► render once ──► every NotificationSink          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Serialized with a `type` tag, so a front end receives
//! `{"type":"debt_overdue","invoice_number":"INV-...", ...}`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use kassa_core::DebtOverview;

use crate::error::ApiError;
use crate::state::ConfigState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Success { message: String },
    Info { message: String },
    Warning { message: String },
    Error { message: String },
    /// An open debt passed its due date.
    DebtOverdue {
        debt_id: String,
        invoice_number: String,
        customer_name: String,
        customer_phone: String,
        remaining_cents: i64,
        due_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// What a sink shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNotification {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn overdue(debt: &DebtOverview) -> Self {
        Notification::DebtOverdue {
            debt_id: debt.id.clone(),
            invoice_number: debt.invoice_number.clone(),
            customer_name: debt.customer_name.clone(),
            customer_phone: debt.customer_phone.clone(),
            remaining_cents: debt.remaining().cents(),
            due_at: debt.due_at,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Notification::Success { .. } => Severity::Success,
            Notification::Info { .. } => Severity::Info,
            Notification::Warning { .. } | Notification::DebtOverdue { .. } => Severity::Warning,
            Notification::Error { .. } => Severity::Error,
        }
    }

    /// The single place a notification turns into text.
    pub fn render(&self, config: &ConfigState) -> RenderedNotification {
        let (title, body) = match self {
            Notification::Success { message } => ("Done".to_string(), message.clone()),
            Notification::Info { message } => ("Info".to_string(), message.clone()),
            Notification::Warning { message } => ("Warning".to_string(), message.clone()),
            Notification::Error { message } => ("Error".to_string(), message.clone()),
            Notification::DebtOverdue {
                invoice_number,
                customer_name,
                customer_phone,
                remaining_cents,
                due_at,
                ..
            } => (
                format!("Debt overdue: {}", customer_name),
                format!(
                    "{} owes {} on {} (due {}). Phone: {}",
                    customer_name,
                    config.format_currency(*remaining_cents),
                    invoice_number,
                    due_at.format("%Y-%m-%d"),
                    customer_phone
                ),
            ),
        };

        RenderedNotification {
            severity: self.severity(),
            title,
            body,
        }
    }
}

impl From<&ApiError> for Notification {
    fn from(err: &ApiError) -> Self {
        Notification::Error {
            message: err.message.clone(),
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Somewhere notifications are shown or recorded.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification, rendered: &RenderedNotification);
}

/// Writes notifications to the log at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, _notification: &Notification, rendered: &RenderedNotification) {
        match rendered.severity {
            Severity::Success | Severity::Info => {
                info!(title = %rendered.title, "{}", rendered.body)
            }
            Severity::Warning => warn!(title = %rendered.title, "{}", rendered.body),
            Severity::Error => error!(title = %rendered.title, "{}", rendered.body),
        }
    }
}

/// Fans notifications out to its sinks.
#[derive(Clone)]
pub struct Notifier {
    config: ConfigState,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    /// A notifier that only logs.
    pub fn new(config: ConfigState) -> Self {
        Notifier {
            config,
            sinks: vec![Arc::new(TracingSink)],
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn dispatch(&self, notification: &Notification) {
        let rendered = notification.render(&self.config);
        for sink in &self.sinks {
            sink.deliver(notification, &rendered);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Keeps everything it is given.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub delivered: std::sync::Mutex<Vec<(Notification, RenderedNotification)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification, rendered: &RenderedNotification) {
        self.delivered
            .lock()
            .unwrap()
            .push((notification.clone(), rendered.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppSettings;
    use chrono::TimeZone;

    fn overdue_debt() -> Notification {
        Notification::DebtOverdue {
            debt_id: "d1".into(),
            invoice_number: "INV-20260101-0003".into(),
            customer_name: "Amina".into(),
            customer_phone: "+254712345678".into(),
            remaining_cents: 350_000,
            due_at: Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let json = serde_json::to_value(overdue_debt()).unwrap();
        assert_eq!(json["type"], "debt_overdue");
        assert_eq!(json["remaining_cents"], 350_000);

        let json = serde_json::to_value(Notification::Success {
            message: "Saved".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "success");
    }

    #[test]
    fn test_render_overdue_uses_currency() {
        let config = ConfigState::in_memory(AppSettings::default());
        let rendered = overdue_debt().render(&config);

        assert_eq!(rendered.severity, Severity::Warning);
        assert_eq!(rendered.title, "Debt overdue: Amina");
        assert!(rendered.body.contains("$3500.00"));
        assert!(rendered.body.contains("INV-20260101-0003"));
        assert!(rendered.body.contains("2026-01-31"));
    }

    #[test]
    fn test_dispatch_reaches_every_sink() {
        let config = ConfigState::in_memory(AppSettings::default());
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(config).with_sink(a.clone()).with_sink(b.clone());

        notifier.dispatch(&Notification::Info {
            message: "hello".into(),
        });

        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
    }
}
