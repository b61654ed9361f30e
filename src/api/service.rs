//! Typed operations for each endpoint of the expense service.

use crate::api::{
    ApiError, Transport, CHANGE_PASSWORD, DAILY_SERIES, DASHBOARD, EXPENSES, LOGIN, PROFILE,
    RECENT, REGISTER,
};
use crate::model::{
    AuthResponse, DailyTotal, DashboardSummary, Expense, ExpenseId, ExpenseInput, LoginRequest,
    Page, PasswordChange, Profile, ProfileUpdate, RegisterRequest,
};

/// The expense service, one method per endpoint. Every call goes through the [`Transport`].
#[derive(Clone)]
pub struct Service {
    transport: Transport,
}

impl Service {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.transport.post(LOGIN, request).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.transport.post(REGISTER, request).await
    }

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.transport.get(PROFILE).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        self.transport.put(PROFILE, update).await
    }

    pub async fn delete_profile(&self) -> Result<(), ApiError> {
        self.transport.delete(PROFILE).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.transport.put_unit(CHANGE_PASSWORD, change).await
    }

    /// The address of the first page of the expense listing.
    pub fn first_page(&self) -> &'static str {
        EXPENSES
    }

    /// Fetches one page of the listing. `cursor` is a path relative to the base address.
    pub async fn expenses_page(&self, cursor: &str) -> Result<Page<Expense>, ApiError> {
        self.transport.get(cursor).await
    }

    pub async fn expense(&self, id: ExpenseId) -> Result<Expense, ApiError> {
        self.transport.get(&expense_path(id)).await
    }

    pub async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, ApiError> {
        self.transport.post(EXPENSES, input).await
    }

    pub async fn update_expense(
        &self,
        id: ExpenseId,
        input: &ExpenseInput,
    ) -> Result<Expense, ApiError> {
        self.transport.put(&expense_path(id), input).await
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<(), ApiError> {
        self.transport.delete(&expense_path(id)).await
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, ApiError> {
        self.transport.get(DASHBOARD).await
    }

    /// The five most recent expenses.
    pub async fn recent(&self) -> Result<Vec<Expense>, ApiError> {
        self.transport.get(RECENT).await
    }

    pub async fn daily_series(&self, days: u32) -> Result<Vec<DailyTotal>, ApiError> {
        self.transport
            .get(&format!("{DAILY_SERIES}?days={days}"))
            .await
    }
}

fn expense_path(id: ExpenseId) -> String {
    format!("{EXPENSES}{id}/")
}
