//! The Filter/Paginate Engine: a pure function from the local collection, the filter state and a
//! page index to the page that is displayed.

use crate::model::{Category, Expense};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of rows on a page.
pub const PAGE_SIZE: usize = 20;

/// How far back the date predicate reaches.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum DateRange {
    #[default]
    #[serde(rename = "last_7_days")]
    #[value(name = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    #[value(name = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_year")]
    #[value(name = "last_year")]
    LastYear,
}

serde_plain::derive_display_from_serialize!(DateRange);
serde_plain::derive_fromstr_from_deserialize!(DateRange);

impl DateRange {
    pub fn days(&self) -> i64 {
        match self {
            DateRange::Last7Days => 7,
            DateRange::Last30Days => 30,
            DateRange::LastYear => 365,
        }
    }

    /// The earliest date that passes. There is no latest date.
    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days())
    }
}

/// Either every category, or exactly one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(only) => *only == category,
        }
    }
}

impl Display for CategoryFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(category) => Display::fmt(category, f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        Category::from_str(&s.to_ascii_uppercase())
            .map(CategoryFilter::Only)
            .map_err(|_| format!("'{s}' is not a category, use 'all' or one of GROCERIES, UTILITIES, ENTERTAINMENT, TRANSPORTATION, DINING_OUT, HEALTHCARE, HOUSING, EDUCATION, OTHER"))
    }
}

impl Serialize for CategoryFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The user's filter inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Case-insensitive substring of the description. Empty matches everything.
    pub search: String,
    pub category: CategoryFilter,
    pub date_range: DateRange,
}

impl FilterState {
    pub fn matches(&self, expense: &Expense, today: NaiveDate) -> bool {
        self.matches_search(expense)
            && self.category.matches(expense.category)
            && expense.date >= self.date_range.earliest(today)
    }

    fn matches_search(&self, expense: &Expense) -> bool {
        self.search.is_empty()
            || expense
                .description
                .to_lowercase()
                .contains(&self.search.to_lowercase())
    }
}

/// One page of the filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredPage {
    pub items: Vec<Expense>,
    /// 1-based.
    pub page_index: usize,
    pub total_pages: usize,
    /// Size of the whole filtered view.
    pub total_items: usize,
    /// 1-based position of the first row on this page, 0 when the page is empty.
    pub first_item: usize,
    /// 1-based position of the last row on this page, 0 when the page is empty.
    pub last_item: usize,
}

impl FilteredPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages
    }
}

/// Filters `collection` and cuts out page `page_index`. A page past the end is empty, and page
/// indexes below 1 are treated as 1.
pub fn apply(
    collection: &[Expense],
    filter: &FilterState,
    page_index: usize,
    today: NaiveDate,
) -> FilteredPage {
    let filtered: Vec<&Expense> = collection
        .iter()
        .filter(|e| filter.matches(e, today))
        .collect();

    let total_items = filtered.len();
    let page_index = page_index.max(1);
    let start = (page_index - 1).saturating_mul(PAGE_SIZE);
    let items: Vec<Expense> = filtered
        .iter()
        .skip(start)
        .take(PAGE_SIZE)
        .map(|e| (*e).clone())
        .collect();
    let (first_item, last_item) = if items.is_empty() {
        (0, 0)
    } else {
        (start + 1, start + items.len())
    };

    FilteredPage {
        items,
        page_index,
        total_pages: total_items.div_ceil(PAGE_SIZE),
        total_items,
        first_item,
        last_item,
    }
}
