//! # Report Types
//!
//! Figures for the back office dashboard. The numbers are produced by
//! `kassa-db` in one read transaction; this module only defines their shape
//! and the derived values.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Dashboard totals for sales created since a point in time.
///
/// Cancelled sales are excluded from revenue, counts and items sold.
/// Debt figures are tenant-wide, not limited to the window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    #[ts(as = "String")]
    pub since: DateTime<Utc>,
    pub revenue_cents: i64,
    pub sale_count: i64,
    pub items_sold: i64,
    pub outstanding_debt_cents: i64,
    pub open_debt_count: i64,
    pub overdue_count: i64,
}

impl SalesSummary {
    pub fn revenue(&self) -> Money {
        Money::from_cents(self.revenue_cents)
    }

    /// Average ticket, rounded down to the cent. Zero when nothing sold.
    pub fn average_sale(&self) -> Money {
        if self.sale_count == 0 {
            return Money::zero();
        }
        Money::from_cents(self.revenue_cents / self.sale_count)
    }
}

/// Best sellers by quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// Summary and best sellers read together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dashboard {
    pub summary: SalesSummary,
    pub top_products: Vec<TopProduct>,
}

/// Start of the UTC day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Start of the window covering the last `days` days, including today.
pub fn last_days(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    start_of_day(now) - Duration::days(days.max(1) - 1)
}
