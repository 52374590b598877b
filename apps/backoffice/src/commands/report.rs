//! # Report Commands
//!
//! The dashboard: how the shop did over the last few days and who still
//! owes money.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use kassa_core::report::{last_days, TopProduct};

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};

const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 366;
const TOP_PRODUCTS: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub since: DateTime<Utc>,
    pub days: i64,
    pub revenue_cents: i64,
    pub sale_count: i64,
    pub items_sold: i64,
    pub average_sale_cents: i64,
    pub outstanding_debt_cents: i64,
    pub open_debt_count: i64,
    pub overdue_count: i64,
    pub top_products: Vec<TopProductDto>,
    pub formatted: DashboardAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProductDto {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

impl From<TopProduct> for TopProductDto {
    fn from(p: TopProduct) -> Self {
        TopProductDto {
            product_id: p.product_id,
            name: p.name,
            quantity: p.quantity,
            revenue_cents: p.revenue_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAmounts {
    pub revenue: String,
    pub average_sale: String,
    pub outstanding_debt: String,
}

/// Figures for the last `days` days including today (default 7).
pub async fn get_dashboard(
    db: &DbState,
    config: &ConfigState,
    days: Option<i64>,
) -> Result<DashboardResponse, ApiError> {
    let days = days.unwrap_or(DEFAULT_DAYS);
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(ApiError::validation(format!(
            "days must be between 1 and {MAX_DAYS}"
        )));
    }
    debug!(days, "get_dashboard command");

    let now = Utc::now();
    let dashboard = db
        .shop()
        .reports()
        .dashboard(last_days(now, days), now, TOP_PRODUCTS)
        .await?;
    let summary = dashboard.summary;
    let average = summary.average_sale().cents();

    Ok(DashboardResponse {
        since: summary.since,
        days,
        revenue_cents: summary.revenue_cents,
        sale_count: summary.sale_count,
        items_sold: summary.items_sold,
        average_sale_cents: average,
        outstanding_debt_cents: summary.outstanding_debt_cents,
        open_debt_count: summary.open_debt_count,
        overdue_count: summary.overdue_count,
        top_products: dashboard
            .top_products
            .into_iter()
            .map(TopProductDto::from)
            .collect(),
        formatted: DashboardAmounts {
            revenue: config.format_currency(summary.revenue_cents),
            average_sale: config.format_currency(average),
            outstanding_debt: config.format_currency(summary.outstanding_debt_cents),
        },
    })
}
