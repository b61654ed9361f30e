//! Everything that talks to the remote expense service.
//!
//! The [`Transport`] is the only way out of the process. It sits on top of the [`Http`] trait,
//! which has two implementations: [`ReqwestHttp`] for the real service and [`TestHttp`], an
//! in-memory stand-in that is selected by setting `EXPENSES_IN_TEST_MODE`.

mod client;
mod error;
mod service;
pub(crate) mod test_client;
mod transport;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub use error::{ApiError, ApiErrorKind, FieldErrors};
pub use service::Service;
pub use transport::Transport;

pub(crate) use client::ReqwestHttp;
pub(crate) use test_client::TestHttp;

pub(crate) const LOGIN: &str = "/api/login/";
pub(crate) const REGISTER: &str = "/api/register/";
pub(crate) const PROFILE: &str = "/api/profile/";
pub(crate) const CHANGE_PASSWORD: &str = "/api/change-password/";
pub(crate) const EXPENSES: &str = "/api/expenses/";
pub(crate) const DASHBOARD: &str = "/api/expenses/dashboard";
pub(crate) const RECENT: &str = "/api/expenses/recent";
pub(crate) const DAILY_SERIES: &str = "/api/expenses/series/daily";

/// The environment variable that, when set to a non-empty value, selects [`Mode::Test`].
pub const TEST_MODE_ENV: &str = "EXPENSES_IN_TEST_MODE";

/// Whether we talk to a real service or to the in-memory one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum Method {
    Get,
    Post,
    Put,
    Delete,
}

serde_plain::derive_display_from_serialize!(Method);

pub(crate) struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) bearer: Option<String>,
    pub(crate) body: Option<Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl HttpResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns whatever status came back. Only failures to get a response at
/// all are errors here.
#[async_trait::async_trait]
pub(crate) trait Http: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}
