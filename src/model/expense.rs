use crate::model::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The identity of an expense record on the remote service.
pub type ExpenseId = i64;

/// A single expense record, as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Expense {
    pub id: ExpenseId,
    pub amount: Amount,
    pub category: Category,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// The description, or a placeholder when it is blank.
    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() {
            "No description"
        } else {
            &self.description
        }
    }
}

/// The payload used to create or replace an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExpenseInput {
    pub amount: Amount,
    pub category: Category,
    pub payment_method: PaymentMethod,
    pub description: String,
    pub date: NaiveDate,
}

impl From<&Expense> for ExpenseInput {
    fn from(e: &Expense) -> Self {
        Self {
            amount: e.amount,
            category: e.category,
            payment_method: e.payment_method,
            description: e.description.clone(),
            date: e.date,
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    /// The address of the next page, `None` on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

/// The nine expense categories known to the service.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Groceries,
    Utilities,
    Entertainment,
    Transportation,
    DiningOut,
    Healthcare,
    Housing,
    Education,
    #[default]
    Other,
}

serde_plain::derive_display_from_serialize!(Category);
serde_plain::derive_fromstr_from_deserialize!(Category);

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Groceries,
        Category::Utilities,
        Category::Entertainment,
        Category::Transportation,
        Category::DiningOut,
        Category::Healthcare,
        Category::Housing,
        Category::Education,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::Utilities => "Utilities",
            Category::Entertainment => "Entertainment",
            Category::Transportation => "Transportation",
            Category::DiningOut => "Dining Out",
            Category::Healthcare => "Healthcare",
            Category::Housing => "Housing",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }

    /// The palette colour the service and the UI agree on for this category.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Groceries => "#0f7b46",
            Category::Utilities => "#d4a200",
            Category::Entertainment => "#d42a2a",
            Category::Transportation => "#083d7c",
            Category::DiningOut => "#6b3ac9",
            Category::Healthcare => "#00b6c7",
            Category::Housing => "#8a5a2d",
            Category::Education => "#1e88e5",
            Category::Other => "#ffffff",
        }
    }
}

/// The five payment methods known to the service.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    DebitCard,
    CreditCard,
    Cash,
    BankTransfer,
    #[default]
    Other,
}

serde_plain::derive_display_from_serialize!(PaymentMethod);
serde_plain::derive_fromstr_from_deserialize!(PaymentMethod);

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Other => "Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_deserialize_expense() {
        let json = r#"{
            "id": 42,
            "amount": "87.43",
            "category": "DINING_OUT",
            "payment_method": "CREDIT_CARD",
            "description": "Olive Garden",
            "date": "2025-10-07",
            "created_at": "2025-10-08T19:25:33Z",
            "updated_at": "2025-10-08T19:25:33Z"
        }"#;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.id, 42);
        assert_eq!(expense.category, Category::DiningOut);
        assert_eq!(expense.payment_method, PaymentMethod::CreditCard);
        assert_eq!(expense.date, NaiveDate::from_ymd_opt(2025, 10, 7).unwrap());
        assert_eq!(expense.amount.to_string(), "$87.43");
    }

    #[test]
    fn test_deserialize_expense_minimal() {
        let json = r#"{"id": 1, "amount": 5, "category": "OTHER",
                       "payment_method": "CASH", "date": "2025-01-01"}"#;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.description, "");
        assert_eq!(expense.display_description(), "No description");
        assert!(expense.created_at.is_none());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let json = r#"{"id": 1, "amount": "5", "category": "PETS",
                       "payment_method": "CASH", "date": "2025-01-01"}"#;
        assert!(serde_json::from_str::<Expense>(json).is_err());
    }

    #[test]
    fn test_category_strings() {
        assert_eq!(Category::DiningOut.to_string(), "DINING_OUT");
        assert_eq!(
            Category::from_str("TRANSPORTATION").unwrap(),
            Category::Transportation
        );
        assert_eq!(Category::Housing.label(), "Housing");
        assert_eq!(Category::ALL.len(), 9);
    }

    #[test]
    fn test_payment_method_strings() {
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "BANK_TRANSFER");
        assert_eq!(PaymentMethod::DebitCard.label(), "Debit Card");
    }

    #[test]
    fn test_page_without_next() {
        let page: Page<Expense> = serde_json::from_str(r#"{"results": [], "next": null}"#).unwrap();
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
    }
}
