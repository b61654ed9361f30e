//! The dashboard: the monthly summary, the latest expenses and the daily totals, loaded together.

use crate::api::Service;
use crate::error::{ErrorType, IntoResult};
use crate::model::{DailyTotal, DashboardSummary, Expense};
use crate::Result;
use anyhow::Context;
use serde::Serialize;

/// How many days of daily totals the dashboard shows unless asked otherwise.
pub const DEFAULT_SERIES_DAYS: u32 = 30;

/// Everything the dashboard shows, loaded all at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub recent: Vec<Expense>,
    pub series: Vec<DailyTotal>,
}

impl Dashboard {
    /// Requests the summary, the recent expenses and `days` of daily totals concurrently. If any
    /// of the three fails the whole load fails.
    pub async fn load(service: &Service, days: u32) -> Result<Self> {
        let (summary, recent, series) = tokio::try_join!(
            service.dashboard(),
            service.recent(),
            service.daily_series(days)
        )
        .context("Failed to load dashboard data")
        .pub_result(ErrorType::Request)?;
        Ok(Self {
            summary,
            recent,
            series,
        })
    }
}
