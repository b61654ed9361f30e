//! The listing view's state: the local collection, the filter inputs and the page index.

use crate::api::Service;
use crate::error::{ErrorType, IntoResult};
use crate::filter::{self, CategoryFilter, DateRange, FilterState, FilteredPage};
use crate::model::{Expense, ExpenseId};
use crate::sync::{self, LoadError};
use crate::Result;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use tokio::sync::watch;
use tracing::debug;

/// Owns the local collection and republishes the filtered page whenever an input changes.
///
/// Changing a filter or the collection puts the view back on page 1. Moving between pages leaves
/// the filters alone.
pub struct ExpenseListing {
    collection: Vec<Expense>,
    filter: FilterState,
    page_index: usize,
    today: NaiveDate,
    page: watch::Sender<FilteredPage>,
}

impl Default for ExpenseListing {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl ExpenseListing {
    /// An empty listing with the default filters. `today` anchors the date predicate.
    pub fn new(today: NaiveDate) -> Self {
        let filter = FilterState::default();
        let (page, _) = watch::channel(filter::apply(&[], &filter, 1, today));
        Self {
            collection: Vec::new(),
            filter,
            page_index: 1,
            today,
            page,
        }
    }

    /// Drains the remote listing into a fresh collection. On failure the current collection is
    /// kept and nothing partial is shown.
    pub async fn activate(
        &mut self,
        service: &Service,
        today: NaiveDate,
    ) -> std::result::Result<(), LoadError> {
        let collection = sync::drain(service).await?;
        self.today = today;
        self.replace_collection(collection);
        Ok(())
    }

    /// Deletes the record on the server, then removes it from the collection without refetching.
    pub async fn delete(&mut self, service: &Service, id: ExpenseId) -> Result<()> {
        service
            .delete_expense(id)
            .await
            .context("Failed to delete expense")
            .pub_result(ErrorType::Request)?;
        self.remove(id);
        Ok(())
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
        self.reset();
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.filter.category = category;
        self.reset();
    }

    pub fn set_date_range(&mut self, date_range: DateRange) {
        self.filter.date_range = date_range;
        self.reset();
    }

    pub fn replace_collection(&mut self, collection: Vec<Expense>) {
        self.collection = collection;
        self.reset();
    }

    /// Removes `id` from the collection. Returns false if it was not there.
    pub fn remove(&mut self, id: ExpenseId) -> bool {
        let before = self.collection.len();
        self.collection.retain(|e| e.id != id);
        let removed = self.collection.len() != before;
        if removed {
            debug!("Removed expense {id} from the local collection");
            self.reset();
        }
        removed
    }

    /// Jumps to `page_index`. Out of range pages are shown as empty.
    pub fn set_page(&mut self, page_index: usize) {
        self.page_index = page_index.max(1);
        self.publish();
    }

    pub fn next_page(&mut self) {
        let last = self.page.borrow().total_pages.max(1);
        self.page_index = (self.page_index + 1).min(last);
        self.publish();
    }

    pub fn previous_page(&mut self) {
        self.page_index = self.page_index.saturating_sub(1).max(1);
        self.publish();
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn collection(&self) -> &[Expense] {
        &self.collection
    }

    /// The page as of the last change.
    pub fn page(&self) -> FilteredPage {
        self.page.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilteredPage> {
        self.page.subscribe()
    }

    fn reset(&mut self) {
        self.page_index = 1;
        self.publish();
    }

    fn publish(&self) {
        let page = filter::apply(&self.collection, &self.filter, self.page_index, self.today);
        self.page.send_replace(page);
    }
}
