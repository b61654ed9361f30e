//! Implements the `Http` trait with an in-memory expense service.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a running backend. Each base address gets its own server, which
//! lives for the rest of the process, so separate commands in the same test see the same data.

use crate::api::{ApiError, FieldErrors, Http, HttpRequest, HttpResponse, Method};
use crate::model::{
    Amount, AuthResponse, Category, DailyTotal, DashboardSummary, Expense, ExpenseId,
    ExpenseInput, Page, PaymentMethod, Profile,
};
use chrono::{Datelike, Duration, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use url::Url;
use uuid::Uuid;

/// The seeded account of every test server.
pub(crate) const DEMO_EMAIL: &str = "demo@example.com";
pub(crate) const DEMO_PASSWORD: &str = "password123";

const DEFAULT_PAGE_SIZE: usize = 20;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_AMOUNT_DIGITS: u32 = 10;

static SERVERS: OnceLock<Mutex<HashMap<String, Arc<Mutex<TestServer>>>>> = OnceLock::new();

/// An implementation of the `Http` trait that never touches the network.
#[derive(Clone)]
pub(crate) struct TestHttp {
    base: Url,
    server: Arc<Mutex<TestServer>>,
}

impl TestHttp {
    /// Connects to the server for `base`, creating and seeding it on first use.
    pub(crate) fn new(base: &Url) -> Self {
        let servers = SERVERS.get_or_init(Mutex::default);
        let server = lock(servers)
            .entry(base.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TestServer::seeded(Local::now().date_naive()))))
            .clone();
        Self {
            base: base.clone(),
            server,
        }
    }

    fn server(&self) -> MutexGuard<'_, TestServer> {
        lock(&self.server)
    }
}

#[async_trait::async_trait]
impl Http for TestHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.server().handle(&self.base, request)
    }
}

/// Fault injection and inspection, used by tests.
#[cfg(test)]
impl TestHttp {
    /// Every request to `path` (e.g. `/api/profile/`) gets `status` from now on.
    pub(crate) fn force_status(&self, path: &str, status: u16) {
        self.server().forced.insert(path.to_string(), status);
    }

    /// While offline every request fails as if the connection was refused.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.server().offline = offline;
    }

    pub(crate) fn set_page_size(&self, page_size: usize) {
        self.server().page_size = page_size.max(1);
    }

    /// Every token issued so far stops working.
    pub(crate) fn revoke_tokens(&self) {
        self.server().tokens.clear();
    }

    /// Replaces the demo account's expenses.
    pub(crate) fn set_expenses(&self, inputs: Vec<ExpenseInput>) {
        let mut server = self.server();
        let owner = server.demo_user_id;
        server.expenses.retain(|e| e.owner != owner);
        for input in inputs {
            server.insert(owner, input);
        }
    }

    /// `METHOD /path?query` for every request received, oldest first.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.server().requests.clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TestUser {
    profile: Profile,
    password: String,
}

struct StoredExpense {
    owner: i64,
    expense: Expense,
}

enum Endpoint {
    Login,
    Register,
    Profile,
    ChangePassword,
    Expenses,
    Expense(ExpenseId),
    Dashboard,
    Recent,
    DailySeries,
}

type Reply = (u16, String);

struct TestServer {
    today: NaiveDate,
    users: Vec<TestUser>,
    tokens: HashMap<String, i64>,
    expenses: Vec<StoredExpense>,
    demo_user_id: i64,
    next_user_id: i64,
    next_expense_id: ExpenseId,
    page_size: usize,
    forced: HashMap<String, u16>,
    offline: bool,
    requests: Vec<String>,
}

impl TestServer {
    fn seeded(today: NaiveDate) -> Self {
        let mut server = Self {
            today,
            users: Vec::new(),
            tokens: HashMap::new(),
            expenses: Vec::new(),
            demo_user_id: 1,
            next_user_id: 1,
            next_expense_id: 1,
            page_size: DEFAULT_PAGE_SIZE,
            forced: HashMap::new(),
            offline: false,
            requests: Vec::new(),
        };
        let owner = server.add_user(DEMO_EMAIL, DEMO_PASSWORD, "Demo", "User");
        server.demo_user_id = owner;
        for input in seed_expenses(today) {
            server.insert(owner, input);
        }
        server
    }

    fn handle(&mut self, base: &Url, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if self.offline {
            return Err(ApiError::network(
                "connection refused (the test server is offline)",
            ));
        }

        let path = match request.url.path().strip_prefix(base.path()) {
            Some(rest) => format!("/{rest}"),
            None => request.url.path().to_string(),
        };
        self.requests.push(match request.url.query() {
            Some(q) => format!("{} {path}?{q}", request.method),
            None => format!("{} {path}", request.method),
        });

        let (status, body) = match self.forced.get(&path) {
            Some(status) => detail(*status, "Forced by the test server."),
            None => self.route(base, &request, &path),
        };
        Ok(HttpResponse { status, body })
    }

    fn route(&mut self, base: &Url, request: &HttpRequest, path: &str) -> Reply {
        let Some(endpoint) = endpoint(path) else {
            return (404, "<h1>Not Found</h1>".to_string());
        };
        let body = request.body.clone().unwrap_or(Value::Null);

        match (&endpoint, request.method) {
            (Endpoint::Login, Method::Post) => return self.login(&body),
            (Endpoint::Register, Method::Post) => return self.register(&body),
            (Endpoint::Login | Endpoint::Register, m) => return not_allowed(m),
            _ => {}
        }

        let Some(token) = request.bearer.as_deref() else {
            return detail(401, "Authentication credentials were not provided.");
        };
        let Some(user_id) = self.tokens.get(token).copied() else {
            return detail(401, "Given token not valid for any token type");
        };

        match (endpoint, request.method) {
            (Endpoint::Profile, Method::Get) => self.profile(user_id),
            (Endpoint::Profile, Method::Put) => self.update_profile(user_id, &body),
            (Endpoint::Profile, Method::Delete) => self.delete_user(user_id),
            (Endpoint::ChangePassword, Method::Put) => self.change_password(user_id, &body),
            (Endpoint::Expenses, Method::Get) => {
                self.list(base, user_id, query(&request.url, "cursor").as_deref())
            }
            (Endpoint::Expenses, Method::Post) => self.create(user_id, &body),
            (Endpoint::Expense(id), Method::Get) => self.retrieve(user_id, id),
            (Endpoint::Expense(id), Method::Put) => self.update(user_id, id, &body),
            (Endpoint::Expense(id), Method::Delete) => self.destroy(user_id, id),
            (Endpoint::Dashboard, Method::Get) => reply(200, &self.summary(user_id)),
            (Endpoint::Recent, Method::Get) => self.recent(user_id),
            (Endpoint::DailySeries, Method::Get) => {
                self.daily_series(user_id, query(&request.url, "days").as_deref())
            }
            (_, m) => not_allowed(m),
        }
    }

    fn add_user(&mut self, email: &str, password: &str, first: &str, last: &str) -> i64 {
        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.push(TestUser {
            profile: Profile {
                id,
                email: email.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
            },
            password: password.to_string(),
        });
        id
    }

    fn user_mut(&mut self, id: i64) -> Option<&mut TestUser> {
        self.users.iter_mut().find(|u| u.profile.id == id)
    }

    fn issue_tokens(&mut self, user: Profile) -> AuthResponse {
        let access = format!("access-{}", Uuid::new_v4().simple());
        let refresh = format!("refresh-{}", Uuid::new_v4().simple());
        self.tokens.insert(access.clone(), user.id);
        AuthResponse {
            access,
            refresh,
            user,
        }
    }

    fn login(&mut self, body: &Value) -> Reply {
        let email = text(body, "email");
        let password = text(body, "password");
        let found = self
            .users
            .iter()
            .find(|u| u.profile.email == email && u.password == password)
            .map(|u| u.profile.clone());
        match found {
            Some(user) => reply(200, &self.issue_tokens(user)),
            None => detail(401, "Invalid credentials"),
        }
    }

    fn register(&mut self, body: &Value) -> Reply {
        let mut errors = FieldErrors::new();
        for key in ["email", "password", "confirm_password"] {
            if text(body, key).trim().is_empty() {
                add_error(&mut errors, key, "This field is required.");
            }
        }
        let email = text(body, "email").trim().to_string();
        let password = text(body, "password");
        if !email.is_empty() {
            if !email.contains('@') {
                add_error(&mut errors, "email", "Enter a valid email address.");
            } else if self.users.iter().any(|u| u.profile.email == email) {
                add_error(&mut errors, "email", "user with this email already exists.");
            }
        }
        if !password.is_empty() {
            check_password(&mut errors, "password", &password);
        }
        if errors.is_empty() && password != text(body, "confirm_password") {
            add_error(&mut errors, "password", "Passwords do not match.");
        }
        if !errors.is_empty() {
            return reply(400, &errors);
        }

        let id = self.add_user(
            &email,
            &password,
            &text(body, "first_name"),
            &text(body, "last_name"),
        );
        let Some(user) = self.user_mut(id).map(|u| u.profile.clone()) else {
            return detail(500, "The new user disappeared.");
        };
        reply(201, &self.issue_tokens(user))
    }

    fn profile(&mut self, user_id: i64) -> Reply {
        match self.user_mut(user_id) {
            Some(user) => reply(200, &user.profile),
            None => detail(401, "User not found"),
        }
    }

    fn update_profile(&mut self, user_id: i64, body: &Value) -> Reply {
        let Some(user) = self.user_mut(user_id) else {
            return detail(401, "User not found");
        };
        if let Some(first) = body.get("first_name").and_then(Value::as_str) {
            user.profile.first_name = first.to_string();
        }
        if let Some(last) = body.get("last_name").and_then(Value::as_str) {
            user.profile.last_name = last.to_string();
        }
        reply(200, &user.profile)
    }

    fn delete_user(&mut self, user_id: i64) -> Reply {
        self.users.retain(|u| u.profile.id != user_id);
        self.expenses.retain(|e| e.owner != user_id);
        self.tokens.retain(|_, owner| *owner != user_id);
        (204, String::new())
    }

    fn change_password(&mut self, user_id: i64, body: &Value) -> Reply {
        let mut errors = FieldErrors::new();
        let new_password = text(body, "new_password");
        let Some(user) = self.user_mut(user_id) else {
            return detail(401, "User not found");
        };
        if user.password != text(body, "old_password") {
            add_error(&mut errors, "old_password", "Old password is incorrect.");
        }
        check_password(&mut errors, "new_password", &new_password);
        if errors.is_empty() && new_password != text(body, "confirm_password") {
            add_error(
                &mut errors,
                "confirm_password",
                "Password confirmation does not match.",
            );
        }
        if !errors.is_empty() {
            return reply(400, &errors);
        }
        user.password = new_password;
        (200, "{}".to_string())
    }

    /// The owner's expenses, newest first.
    fn owned(&self, owner: i64) -> Vec<&Expense> {
        let mut mine: Vec<&Expense> = self
            .expenses
            .iter()
            .filter(|e| e.owner == owner)
            .map(|e| &e.expense)
            .collect();
        mine.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        mine
    }

    fn list(&self, base: &Url, owner: i64, cursor: Option<&str>) -> Reply {
        let offset = match cursor {
            None => 0,
            Some(c) => match c.strip_prefix('o').and_then(|n| n.parse::<usize>().ok()) {
                Some(offset) => offset,
                None => return detail(404, "Invalid cursor"),
            },
        };
        let mine = self.owned(owner);
        let end = offset.saturating_add(self.page_size).min(mine.len());
        let results: Vec<Expense> = mine
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|e| (*e).clone())
            .collect();
        // Like the real service, the next link is absolute and includes the base address.
        let next = (end < mine.len())
            .then(|| base.join(&format!("api/expenses/?cursor=o{end}")).ok())
            .flatten()
            .map(|u| u.to_string());
        reply(200, &Page { results, next })
    }

    fn insert(&mut self, owner: i64, input: ExpenseInput) -> Expense {
        let id = self.next_expense_id;
        self.next_expense_id += 1;
        let now = Utc::now();
        let expense = Expense {
            id,
            amount: input.amount,
            category: input.category,
            payment_method: input.payment_method,
            description: input.description,
            date: input.date,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.expenses.push(StoredExpense {
            owner,
            expense: expense.clone(),
        });
        expense
    }

    fn find_mut(&mut self, owner: i64, id: ExpenseId) -> Option<&mut Expense> {
        self.expenses
            .iter_mut()
            .find(|e| e.owner == owner && e.expense.id == id)
            .map(|e| &mut e.expense)
    }

    fn create(&mut self, owner: i64, body: &Value) -> Reply {
        match validate_expense(body) {
            Ok(input) => {
                let expense = self.insert(owner, input);
                reply(201, &expense)
            }
            Err(errors) => reply(400, &errors),
        }
    }

    fn retrieve(&mut self, owner: i64, id: ExpenseId) -> Reply {
        match self.find_mut(owner, id) {
            Some(expense) => reply(200, expense),
            None => no_such_expense(),
        }
    }

    fn update(&mut self, owner: i64, id: ExpenseId, body: &Value) -> Reply {
        let input = match validate_expense(body) {
            Ok(input) => input,
            Err(errors) => return reply(400, &errors),
        };
        let Some(expense) = self.find_mut(owner, id) else {
            return no_such_expense();
        };
        expense.amount = input.amount;
        expense.category = input.category;
        expense.payment_method = input.payment_method;
        expense.description = input.description;
        expense.date = input.date;
        expense.updated_at = Some(Utc::now());
        reply(200, expense)
    }

    fn destroy(&mut self, owner: i64, id: ExpenseId) -> Reply {
        let before = self.expenses.len();
        self.expenses
            .retain(|e| !(e.owner == owner && e.expense.id == id));
        if self.expenses.len() == before {
            return no_such_expense();
        }
        (204, String::new())
    }

    fn recent(&self, owner: i64) -> Reply {
        let mut mine = self.owned(owner);
        mine.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        let recent: Vec<&Expense> = mine.into_iter().take(5).collect();
        reply(200, &recent)
    }

    fn daily_series(&self, owner: i64, days: Option<&str>) -> Reply {
        let days = match days.map(str::parse::<u32>) {
            None => 30,
            Some(Ok(days)) => days,
            Some(Err(_)) => return detail(400, "days must be a whole number"),
        };
        let cutoff = self.today - Duration::days(i64::from(days) - 1);
        let mut totals: BTreeMap<NaiveDate, Amount> = BTreeMap::new();
        for e in self.owned(owner) {
            if e.date >= cutoff {
                let total = totals.entry(e.date).or_default();
                *total = *total + e.amount;
            }
        }
        let series: Vec<DailyTotal> = totals
            .into_iter()
            .map(|(day, total)| DailyTotal { day, total })
            .collect();
        reply(200, &series)
    }

    fn summary(&self, owner: i64) -> DashboardSummary {
        let today = self.today;
        let mine = self.owned(owner);
        let total_between = |from: NaiveDate, to: NaiveDate| -> Decimal {
            mine.iter()
                .filter(|e| e.date >= from && e.date <= to)
                .map(|e| e.amount.value())
                .sum()
        };

        let month_start = today.with_day(1).unwrap_or(today);
        let previous_month_end = month_start - Duration::days(1);
        let previous_month_start = previous_month_end.with_day(1).unwrap_or(previous_month_end);
        let week_start =
            today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        let current = total_between(month_start, today);
        let previous = total_between(previous_month_start, previous_month_end);
        let hundred = Decimal::ONE_HUNDRED;

        let trend = if previous > Decimal::ZERO {
            ((current - previous) / previous * hundred).round_dp(2)
        } else if current.is_zero() {
            Decimal::ZERO
        } else {
            hundred
        };

        let monthly_average = match mine.iter().map(|e| e.date).min() {
            Some(first) => {
                let months = (today.year() - first.year()) * 12
                    + (today.month() as i32 - first.month() as i32)
                    + 1;
                let all_time: Decimal = mine.iter().map(|e| e.amount.value()).sum();
                if months > 0 {
                    (all_time / Decimal::from(months)).round_dp(2)
                } else {
                    Decimal::ZERO
                }
            }
            None => Decimal::ZERO,
        };

        let mut by_category: BTreeMap<Category, Decimal> = BTreeMap::new();
        for e in mine.iter().filter(|e| e.date >= month_start && e.date <= today) {
            *by_category.entry(e.category).or_default() += e.amount.value();
        }
        let active_categories: BTreeSet<Category> = by_category.keys().copied().collect();
        let top = by_category.iter().max_by(|a, b| a.1.cmp(b.1));
        let (top_category, top_category_percentage) = match top {
            Some((category, total)) if current > Decimal::ZERO => {
                (Some(*category), (*total / current * hundred).round_dp(2))
            }
            _ => (None, Decimal::ZERO),
        };

        DashboardSummary {
            current_month_total: Amount::new(current),
            previous_month_total: Amount::new(previous),
            trend_percentage: trend,
            monthly_average: Amount::new(monthly_average),
            active_categories_count: active_categories.len() as u32,
            top_category,
            top_category_percentage,
            current_week_total: Amount::new(total_between(week_start, today)),
        }
    }
}

fn endpoint(path: &str) -> Option<Endpoint> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", "login"] => Some(Endpoint::Login),
        ["api", "register"] => Some(Endpoint::Register),
        ["api", "profile"] => Some(Endpoint::Profile),
        ["api", "change-password"] => Some(Endpoint::ChangePassword),
        ["api", "expenses"] => Some(Endpoint::Expenses),
        ["api", "expenses", "dashboard"] => Some(Endpoint::Dashboard),
        ["api", "expenses", "recent"] => Some(Endpoint::Recent),
        ["api", "expenses", "series", "daily"] => Some(Endpoint::DailySeries),
        ["api", "expenses", id] => id.parse().ok().map(Endpoint::Expense),
        _ => None,
    }
}

fn query(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn text(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        add_error(
            errors,
            field,
            "This password is too short. It must contain at least 8 characters.",
        );
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        add_error(errors, field, "This password is entirely numeric.");
    }
}

/// Parses one field of an expense payload, recording an error if it is missing or invalid.
fn parse_field<T>(body: &Value, key: &str, errors: &mut FieldErrors, invalid: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    match body.get(key) {
        None | Some(Value::Null) => {
            add_error(errors, key, "This field is required.");
            None
        }
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                add_error(errors, key, &invalid.replace("{}", &value.to_string()));
                None
            }
        },
    }
}

fn validate_expense(body: &Value) -> Result<ExpenseInput, FieldErrors> {
    let mut errors = FieldErrors::new();
    let amount: Option<Amount> =
        parse_field(body, "amount", &mut errors, "A valid number is required.");
    let category: Option<Category> =
        parse_field(body, "category", &mut errors, "{} is not a valid choice.");
    let payment_method: Option<PaymentMethod> = parse_field(
        body,
        "payment_method",
        &mut errors,
        "{} is not a valid choice.",
    );
    let date: Option<NaiveDate> = parse_field(
        body,
        "date",
        &mut errors,
        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
    );

    if let Some(amount) = amount {
        let mut rounded = amount.value().round_dp(2);
        rounded.rescale(2);
        let digits = rounded.abs().mantissa().to_string().len() as u32;
        if digits > MAX_AMOUNT_DIGITS {
            add_error(
                &mut errors,
                "amount",
                "Ensure that there are no more than 10 digits in total.",
            );
        }
    }

    match (amount, category, payment_method, date) {
        (Some(amount), Some(category), Some(payment_method), Some(date)) if errors.is_empty() => {
            Ok(ExpenseInput {
                amount,
                category,
                payment_method,
                description: text(body, "description"),
                date,
            })
        }
        _ => Err(errors),
    }
}

fn reply<T>(status: u16, value: &T) -> Reply
where
    T: Serialize + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(body) => (status, body),
        Err(e) => (500, format!("Unable to serialize the response: {e}")),
    }
}

fn detail(status: u16, message: &str) -> Reply {
    reply(status, &json!({ "detail": message }))
}

fn not_allowed(method: Method) -> Reply {
    detail(405, &format!("Method \"{method}\" not allowed."))
}

fn no_such_expense() -> Reply {
    detail(404, "No Expense matches the given query.")
}

/// Twenty-five expenses, one every three days going back from `today`.
fn seed_expenses(today: NaiveDate) -> Vec<ExpenseInput> {
    const SEED: [(&str, Category, PaymentMethod, &str); 10] = [
        ("Whole Foods Market", Category::Groceries, PaymentMethod::CreditCard, "87.43"),
        ("Shell Gas Station", Category::Transportation, PaymentMethod::DebitCard, "52.30"),
        ("Netflix", Category::Entertainment, PaymentMethod::CreditCard, "15.49"),
        ("Olive Garden", Category::DiningOut, PaymentMethod::CreditCard, "42.30"),
        ("PG&E Electric", Category::Utilities, PaymentMethod::BankTransfer, "142.67"),
        ("CVS Pharmacy", Category::Healthcare, PaymentMethod::DebitCard, "23.99"),
        ("Monthly rent", Category::Housing, PaymentMethod::BankTransfer, "1850.00"),
        ("Online course", Category::Education, PaymentMethod::CreditCard, "49.00"),
        ("Farmers market", Category::Groceries, PaymentMethod::Cash, "31.25"),
        ("Birthday gift", Category::Other, PaymentMethod::Other, "60.00"),
    ];
    (0..25i64)
        .map(|i| {
            let (description, category, payment_method, amount) = SEED[i as usize % SEED.len()];
            ExpenseInput {
                amount: Amount::from_str(amount).unwrap_or_default(),
                category,
                payment_method,
                description: description.to_string(),
                date: today - Duration::days(i * 3),
            }
        })
        .collect()
}
