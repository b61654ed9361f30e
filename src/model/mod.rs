//! Types that represent the data exchanged with the expense service, such as `Expense` and
//! `Profile`.
mod amount;
mod dashboard;
mod expense;
mod profile;

pub use amount::{Amount, AmountError};
pub use dashboard::{DailyTotal, DashboardSummary};
pub use expense::{Category, Expense, ExpenseId, ExpenseInput, Page, PaymentMethod};
pub use profile::{
    AuthResponse, LoginRequest, PasswordChange, Profile, ProfileUpdate, RegisterRequest,
};
