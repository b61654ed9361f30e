//! These structs provide the CLI interface for the expenses CLI.

use crate::dashboard::DEFAULT_SERIES_DAYS;
use crate::filter::{CategoryFilter, DateRange};
use crate::model::{Amount, Category, ExpenseId, PaymentMethod};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expenses: A command-line client for a personal expense-tracking service.
///
/// Log in once and your session is kept in the expenses home directory. From there you can list,
/// filter, add, update and delete expenses, look at the dashboard figures and manage your
/// account.
///
/// Run `expenses init --api-url <URL>` first to point the client at your server.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and write the configuration file.
    ///
    /// This is the first command you should run. By default the home directory is
    /// $HOME/expenses. If you want it somewhere else, pass --expenses-home or set EXPENSES_HOME.
    Init(InitArgs),
    /// Log in with your email and password.
    Login(LoginArgs),
    /// Create an account and log in to it.
    Register(RegisterArgs),
    /// Forget the stored session. Nothing is sent to the server.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Update or delete your profile.
    Profile(ProfileArgs),
    /// Change your password.
    Password(PasswordArgs),
    /// List, show, add, update or delete expenses.
    Expenses(ExpensesArgs),
    /// Show this month's figures, the recent expenses and the daily totals.
    Dashboard(DashboardArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration and the session are held. Defaults to ~/expenses
    #[arg(long, env = "EXPENSES_HOME", default_value_t = default_expenses_home())]
    expenses_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expenses_home: PathBuf) -> Self {
        Self {
            log_level,
            expenses_home: expenses_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expenses_home(&self) -> &DisplayPath {
        &self.expenses_home
    }
}

/// (Not shown): Args for the `expenses init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base address of the expense service, e.g. http://127.0.0.1:8000/
    #[arg(long)]
    api_url: String,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// (Not shown): Args for the `expenses login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "EXPENSES_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `expenses register` command.
#[derive(Debug, Parser, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub email: String,

    /// At least 8 characters and not entirely numeric.
    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub confirm_password: String,
}

/// (Not shown): Args for the `expenses profile` command.
#[derive(Debug, Parser, Clone)]
pub struct ProfileArgs {
    #[command(subcommand)]
    action: ProfileSubcommand,
}

impl ProfileArgs {
    pub fn new(action: ProfileSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &ProfileSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileSubcommand {
    /// Change your first and last name.
    Update(ProfileUpdateArgs),
    /// Delete your account and everything in it. This cannot be undone.
    Delete,
}

#[derive(Debug, Parser, Clone)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,
}

/// (Not shown): Args for the `expenses password` command.
#[derive(Debug, Parser, Clone)]
pub struct PasswordArgs {
    /// Your current password.
    #[arg(long)]
    pub old: String,

    #[arg(long)]
    pub new: String,

    /// The new password again.
    #[arg(long)]
    pub confirm: String,
}

/// (Not shown): Args for the `expenses expenses` command.
#[derive(Debug, Parser, Clone)]
pub struct ExpensesArgs {
    #[command(subcommand)]
    action: ExpensesSubcommand,
}

impl ExpensesArgs {
    pub fn new(action: ExpensesSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &ExpensesSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExpensesSubcommand {
    /// Load all of your expenses and show one filtered page of them.
    List(ListArgs),
    /// Show a single expense.
    Show(IdArgs),
    /// Record a new expense.
    Add(AddArgs),
    /// Change an expense. Fields that are not given keep their current value.
    Update(UpdateArgs),
    /// Delete an expense.
    Delete(IdArgs),
}

/// How `expenses list` prints the page.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// Only expenses whose description contains this, ignoring case.
    #[arg(long, default_value = "")]
    pub search: String,

    /// 'all' or one of the categories, e.g. GROCERIES.
    #[arg(long, default_value_t = CategoryFilter::All)]
    pub category: CategoryFilter,

    /// How far back to look.
    #[arg(long, value_enum, default_value_t = DateRange::Last7Days)]
    pub range: DateRange,

    /// The page to show, starting at 1. Each page has 20 expenses.
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: CategoryFilter::All,
            range: DateRange::Last7Days,
            page: 1,
            format: OutputFormat::Table,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct IdArgs {
    pub id: ExpenseId,
}

#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// e.g. 12.50 or $1,200.00
    #[arg(long)]
    pub amount: Amount,

    #[arg(long, value_enum, ignore_case = true)]
    pub category: Category,

    #[arg(long, value_enum, ignore_case = true)]
    pub payment_method: PaymentMethod,

    #[arg(long, default_value = "")]
    pub description: String,

    /// YYYY-MM-DD, defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    pub id: ExpenseId,

    #[arg(long)]
    pub amount: Option<Amount>,

    #[arg(long, value_enum, ignore_case = true)]
    pub category: Option<Category>,

    #[arg(long, value_enum, ignore_case = true)]
    pub payment_method: Option<PaymentMethod>,

    #[arg(long)]
    pub description: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// (Not shown): Args for the `expenses dashboard` command.
#[derive(Debug, Parser, Clone)]
pub struct DashboardArgs {
    /// How many days of daily totals to show.
    #[arg(long, default_value_t = DEFAULT_SERIES_DAYS)]
    days: u32,
}

impl DashboardArgs {
    pub fn new(days: u32) -> Self {
        Self { days }
    }

    pub fn days(&self) -> u32 {
        self.days
    }
}

fn default_expenses_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expenses-home or EXPENSES_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
