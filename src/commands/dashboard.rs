use crate::api::Mode;
use crate::commands::Out;
use crate::dashboard::Dashboard;
use crate::nav::Route;
use crate::{Client, Config, Result};
use std::fmt::Write;

/// Handles `expenses dashboard`. The three requests are issued concurrently and nothing is shown
/// unless all of them succeed.
pub async fn dashboard(config: Config, mode: Mode, days: u32) -> Result<Out<Dashboard>> {
    let client = Client::connect(&config, mode).await?;
    let user = client.require_user(Route::Dashboard).await?;
    let dashboard = Dashboard::load(client.service(), days).await?;
    let message = render(user.display_name(), &dashboard, days);
    Ok(Out::new(message, dashboard))
}

fn render(name: &str, dashboard: &Dashboard, days: u32) -> String {
    let summary = &dashboard.summary;
    let mut s = String::new();
    let _ = writeln!(s, "Welcome back, {name}!");
    let _ = writeln!(
        s,
        "This month: {} ({} from last month)",
        summary.current_month_total,
        summary.trend_label()
    );
    let _ = writeln!(s, "Monthly average: {}", summary.monthly_average);
    let _ = writeln!(s, "This week: {}", summary.current_week_total);
    match summary.top_category {
        Some(top) => {
            let _ = writeln!(
                s,
                "Top category: {} ({}% of spending, {} active categories)",
                top.label(),
                summary.top_category_percentage.round_dp(1),
                summary.active_categories_count
            );
        }
        None => {
            let _ = writeln!(s, "Top category: none yet");
        }
    }

    let _ = writeln!(s, "Recent expenses:");
    if dashboard.recent.is_empty() {
        let _ = writeln!(s, "  No expenses yet");
    }
    for e in &dashboard.recent {
        let _ = writeln!(
            s,
            "  {}  {:>12}  {:<14}  {}",
            e.date,
            e.amount.to_string(),
            e.category.label(),
            e.display_description()
        );
    }

    let _ = write!(s, "Daily totals, last {days} days:");
    for point in &dashboard.series {
        let _ = write!(s, "\n  {}  {:>12}", point.day, point.total.to_string());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_dashboard() {
        let env = TestEnv::new().await;
        env.logged_in_client().await;
        let out = dashboard(env.config(), Mode::Test, 30).await.unwrap();
        let data = out.structure().unwrap();
        assert_eq!(data.recent.len(), 5);
        assert_eq!(data.series.len(), 10);
        assert!(out.message().starts_with("Welcome back, Demo!"));
        assert!(out.message().contains("Daily totals, last 30 days:"));
    }

    #[tokio::test]
    async fn test_dashboard_requires_login() {
        let env = TestEnv::new().await;
        let e = dashboard(env.config(), Mode::Test, 30).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
    }
}
