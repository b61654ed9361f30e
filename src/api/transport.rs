//! The single request pipeline used for every call to the remote service.

use crate::api::{ApiError, Http, HttpRequest, Method};
use crate::credentials::CredentialStore;
use crate::nav::{Navigator, Route};
use crate::session::SessionCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, trace, warn};
use url::Url;

/// Resolves paths against a fixed base address, attaches the bearer token and reacts to
/// authentication failures.
///
/// A 401 or 403 from any endpoint ends the session, once, here: the credentials are cleared, all
/// outstanding session operations are made stale and the navigator is sent to the login view.
/// The error is still returned so that the caller's future completes, but callers do not react to
/// it again. There is no retry and no attempt to renew with the refresh token.
#[derive(Clone)]
pub struct Transport {
    http: Arc<dyn Http>,
    base: Url,
    credentials: CredentialStore,
    session: SessionCell,
    navigator: Navigator,
}

impl Transport {
    pub(crate) fn new(
        http: Arc<dyn Http>,
        base: Url,
        credentials: CredentialStore,
        session: SessionCell,
        navigator: Navigator,
    ) -> Self {
        Self {
            http,
            base,
            credentials,
            session,
            navigator,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `path`, e.g. `/api/expenses/?cursor=abc`, against the base address. Paths that
    /// resolve to a different origin are refused so that the token never leaves the service.
    pub(crate) fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::unknown(None, format!("Invalid request path '{path}': {e}")))?;
        if url.origin() != self.base.origin() {
            return Err(ApiError::unknown(
                None,
                format!("Refusing to send a request to another server: {url}"),
            ));
        }
        Ok(url)
    }

    /// Sends the request and returns the body of a successful response.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<String, ApiError> {
        let url = self.resolve(path)?;
        trace!("{method} {}", url.path());
        let request = HttpRequest {
            method,
            bearer: self.credentials.access_token(),
            url,
            body,
        };
        let request_path = request.url.path().to_string();

        let response = self.http.send(request).await?;
        if response.is_success() {
            return Ok(response.body);
        }

        let e = ApiError::from_response(response.status, &request_path, &response.body);
        if let ApiError::AuthInvalid { status } = &e {
            self.end_session(*status, &request_path).await;
        }
        Err(e)
    }

    async fn end_session(&self, status: u16, path: &str) {
        warn!("The server rejected the session (HTTP {status} from {path}), logging out");
        self.session.invalidate();
        if let Err(e) = self.credentials.clear().await {
            error!("Unable to clear stored credentials: {e}");
        }
        self.navigator.redirect(Route::Login);
    }

    pub(crate) async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let body = self.send(Method::Get, path, None).await?;
        decode(path, &body)
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::Post, path, Some(encode(body)?)).await?;
        decode(path, &body)
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::Put, path, Some(encode(body)?)).await?;
        decode(path, &body)
    }

    /// A `PUT` whose response body, if any, is ignored.
    pub(crate) async fn put_unit<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::Put, path, Some(encode(body)?)).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::Delete, path, None).await?;
        Ok(())
    }
}

fn encode<B>(body: &B) -> Result<Value, ApiError>
where
    B: Serialize + ?Sized,
{
    serde_json::to_value(body)
        .map_err(|e| ApiError::unknown(None, format!("Unable to serialize the request: {e}")))
}

fn decode<T>(path: &str, body: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|e| {
        ApiError::unknown(
            None,
            format!("Unable to parse the response from {path}: {e}"),
        )
    })
}
