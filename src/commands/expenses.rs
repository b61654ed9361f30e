//! Expense command handlers.
//!
//! `list` drains the whole collection and then filters and pages it locally. The other
//! subcommands act on a single record by id.

use crate::api::Mode;
use crate::args::{AddArgs, ListArgs, OutputFormat, UpdateArgs};
use crate::commands::{plural, Out};
use crate::error::{ErrorType, IntoResult};
use crate::filter::FilteredPage;
use crate::listing::ExpenseListing;
use crate::model::{Expense, ExpenseId, ExpenseInput};
use crate::nav::Route;
use crate::{Client, Config, Result};
use anyhow::Context;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::fmt::Write;

/// A page of expenses in the requested output format.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rows {
    /// The page with its position in the filtered view.
    Json(serde_json::Value),
    /// Aligned columns as a single formatted string.
    Table(String),
    /// CSV data as a properly escaped string.
    Csv(String),
}

impl Debug for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rows::Json(v) => write!(f, "Rows::Json({:?})", v),
            Rows::Table(s) => write!(f, "Rows::Table({} chars)", s.len()),
            Rows::Csv(s) => write!(f, "Rows::Csv({} chars)", s.len()),
        }
    }
}

impl Display for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rows::Json(v) => {
                if let Ok(s) = serde_json::to_string_pretty(v) {
                    write!(f, "{}", s)
                } else {
                    write!(f, "{:?}", v)
                }
            }
            Rows::Table(s) => write!(f, "{}", s),
            Rows::Csv(s) => write!(f, "{}", s),
        }
    }
}

/// Handles `expenses expenses list`.
pub async fn list_expenses(config: Config, mode: Mode, args: &ListArgs) -> Result<Out<Rows>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::Expenses).await?;

    let mut listing = ExpenseListing::default();
    listing
        .activate(client.service(), Local::now().date_naive())
        .await
        .pub_result(ErrorType::Sync)?;
    listing.set_search(args.search.clone());
    listing.set_category(args.category);
    listing.set_date_range(args.range);
    listing.set_page(args.page);

    let page = listing.page();
    let message = summary(&page);
    let rows = match args.format {
        OutputFormat::Table => Rows::Table(table(&page)),
        OutputFormat::Json => Rows::Json(
            serde_json::to_value(&page)
                .context("Unable to serialize the page")
                .pub_result(ErrorType::Internal)?,
        ),
        OutputFormat::Csv => Rows::Csv(to_csv(&page.items).pub_result(ErrorType::Internal)?),
    };
    Ok(Out::new(message, rows))
}

/// Handles `expenses expenses show`.
pub async fn show_expense(config: Config, mode: Mode, id: ExpenseId) -> Result<Out<Expense>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::EditExpense(id)).await?;
    let expense = client
        .service()
        .expense(id)
        .await
        .with_context(|| format!("Unable to load expense {id}"))
        .pub_result(ErrorType::Request)?;
    Ok(Out::new(describe(&expense), expense))
}

/// Handles `expenses expenses add`. The date defaults to today.
pub async fn add_expense(config: Config, mode: Mode, args: &AddArgs) -> Result<Out<Expense>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::NewExpense).await?;
    let input = ExpenseInput {
        amount: args.amount,
        category: args.category,
        payment_method: args.payment_method,
        description: args.description.clone(),
        date: args.date.unwrap_or_else(|| Local::now().date_naive()),
    };
    let expense = client
        .service()
        .create_expense(&input)
        .await
        .context("Unable to add the expense")
        .pub_result(ErrorType::Request)?;
    client.navigator().redirect(Route::Expenses);
    Ok(Out::new(
        format!("Added expense {}: {}", expense.id, describe(&expense)),
        expense,
    ))
}

/// Handles `expenses expenses update`. The record is read first so that fields which were not
/// given keep their current value.
pub async fn update_expense(config: Config, mode: Mode, args: &UpdateArgs) -> Result<Out<Expense>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::EditExpense(args.id)).await?;
    let current = client
        .service()
        .expense(args.id)
        .await
        .with_context(|| format!("Unable to load expense {}", args.id))
        .pub_result(ErrorType::Request)?;

    let mut input = ExpenseInput::from(&current);
    if let Some(amount) = args.amount {
        input.amount = amount;
    }
    if let Some(category) = args.category {
        input.category = category;
    }
    if let Some(payment_method) = args.payment_method {
        input.payment_method = payment_method;
    }
    if let Some(description) = &args.description {
        input.description = description.clone();
    }
    if let Some(date) = args.date {
        input.date = date;
    }

    let expense = client
        .service()
        .update_expense(args.id, &input)
        .await
        .with_context(|| format!("Unable to update expense {}", args.id))
        .pub_result(ErrorType::Request)?;
    client.navigator().redirect(Route::Expenses);
    Ok(Out::new(
        format!("Updated expense {}: {}", expense.id, describe(&expense)),
        expense,
    ))
}

/// Handles `expenses expenses delete`.
pub async fn delete_expense(config: Config, mode: Mode, id: ExpenseId) -> Result<Out<ExpenseId>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::Expenses).await?;
    client
        .service()
        .delete_expense(id)
        .await
        .context("Failed to delete expense")
        .pub_result(ErrorType::Request)?;
    Ok(Out::new(format!("Deleted expense {id}"), id))
}

fn describe(e: &Expense) -> String {
    format!(
        "{} on {}, {} paid by {} ({})",
        e.amount,
        e.date,
        e.category.label(),
        e.payment_method.label(),
        e.display_description()
    )
}

fn summary(page: &FilteredPage) -> String {
    if page.total_items == 0 {
        return "No expenses found. Try changing the filters.".to_string();
    }
    if page.is_empty() {
        return format!(
            "Page {} is past the end, there {} {}",
            page.page_index,
            if page.total_pages == 1 { "is" } else { "are" },
            plural(page.total_pages, "page", "pages")
        );
    }
    format!(
        "Showing {} to {} of {} (page {} of {})",
        page.first_item,
        page.last_item,
        plural(page.total_items, "expense", "expenses"),
        page.page_index,
        page.total_pages
    )
}

fn table(page: &FilteredPage) -> String {
    let mut s = String::new();
    let _ = write!(
        s,
        "{:>6}  {:<10}  {:>12}  {:<14}  {:<13}  DESCRIPTION",
        "ID", "DATE", "AMOUNT", "CATEGORY", "PAYMENT"
    );
    for e in &page.items {
        let _ = write!(
            s,
            "\n{:>6}  {:<10}  {:>12}  {:<14}  {:<13}  {}",
            e.id,
            e.date.to_string(),
            e.amount.to_string(),
            e.category.label(),
            e.payment_method.label(),
            e.display_description()
        );
    }
    s
}

fn to_csv(items: &[Expense]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "date", "amount", "category", "payment_method", "description"])?;
    for e in items {
        writer.write_record([
            e.id.to_string(),
            e.date.to_string(),
            e.amount.to_wire(),
            e.category.to_string(),
            e.payment_method.to_string(),
            e.description.clone(),
        ])?;
    }
    let bytes = writer.into_inner().context("Unable to write CSV")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
