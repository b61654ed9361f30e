use crate::model::{Amount, Category};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The aggregate figures shown on the dashboard cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DashboardSummary {
    pub current_month_total: Amount,
    pub previous_month_total: Amount,
    /// Month-over-month change in percent, e.g. `12.5` or `-3.25`.
    pub trend_percentage: Decimal,
    pub monthly_average: Amount,
    pub active_categories_count: u32,
    pub top_category: Option<Category>,
    pub top_category_percentage: Decimal,
    pub current_week_total: Amount,
}

impl DashboardSummary {
    /// Formats the trend like `+12.5%`, `-3.3%` or `0%`.
    pub fn trend_label(&self) -> String {
        if self.trend_percentage.is_zero() {
            return "0%".to_string();
        }
        let sign = if self.trend_percentage.is_sign_positive() {
            "+"
        } else {
            ""
        };
        format!("{sign}{}%", self.trend_percentage.round_dp(1))
    }
}

/// The total spent on a single day, one point of the time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub day: chrono::NaiveDate,
    pub total: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn summary(trend: &str) -> DashboardSummary {
        let json = format!(
            r#"{{"current_month_total": 120.5, "previous_month_total": 100.0,
                "trend_percentage": {trend}, "monthly_average": 80.25,
                "active_categories_count": 3, "top_category": "GROCERIES",
                "top_category_percentage": 45.5, "current_week_total": 20.0}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_deserialize_numbers() {
        let s = summary("20.5");
        assert_eq!(s.current_month_total.to_string(), "$120.50");
        assert_eq!(s.top_category, Some(Category::Groceries));
        assert_eq!(s.active_categories_count, 3);
    }

    #[test]
    fn test_trend_label() {
        assert_eq!(summary("20.55").trend_label(), "+20.6%");
        assert_eq!(summary("-3.25").trend_label(), "-3.2%");
        assert_eq!(summary("0").trend_label(), "0%");
    }

    #[test]
    fn test_daily_total() {
        let d: DailyTotal = serde_json::from_str(r#"{"day": "2025-10-01", "total": 45.88}"#).unwrap();
        assert_eq!(d.total.value(), Decimal::from_str("45.88").unwrap());
    }
}
