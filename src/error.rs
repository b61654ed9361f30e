//! Error types for the public interface of the library.
//!
//! Internally we pass `anyhow` errors around with plenty of `.context(..)`. At the public boundary
//! (commands and the types re-exported from `lib.rs`) errors are converted into [`Error`], which
//! carries an [`ErrorType`] so that callers can decide how to present the failure.

use crate::api::{ApiError, ApiErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The result type used internally, where an `anyhow` context chain is all we need.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The result type of the public interface.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The home directory or `config.json` is missing or invalid.
    Config,
    /// The durable credential storage could not be read or written.
    Storage,
    /// The user is not logged in, or the session was invalidated by the server.
    Auth,
    /// A call to the remote service failed.
    Request,
    /// The expense collection could not be loaded.
    Sync,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Returns the remote-call error somewhere in the chain, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        self.source.chain().find_map(|e| e.downcast_ref::<ApiError>())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.source)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Self {
        let error_type = match e.kind() {
            ApiErrorKind::AuthInvalid => ErrorType::Auth,
            _ => ErrorType::Request,
        };
        Error::new(error_type, e)
    }
}

/// Converts internal results into public results with the given [`ErrorType`].
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_context_chain() {
        let internal: Res<()> = Err(anyhow::anyhow!("disk full")).context("Unable to save");
        let e = internal.pub_result(ErrorType::Storage).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Storage);
        assert_eq!(e.to_string(), "Unable to save: disk full");
    }

    #[test]
    fn test_api_error_is_found_in_chain() {
        let internal: Res<()> = Err(ApiError::not_found("/api/expenses/9/"))
            .context("Unable to load the expense");
        let e = internal.pub_result(ErrorType::Request).unwrap_err();
        let api = e.api_error().unwrap();
        assert_eq!(api.kind(), ApiErrorKind::NotFound);
    }

    #[test]
    fn test_auth_invalid_maps_to_auth() {
        let e: Error = ApiError::AuthInvalid { status: 403 }.into();
        assert_eq!(e.error_type(), ErrorType::Auth);
    }
}
