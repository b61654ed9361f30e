//! Wires the credential store, the transport and the session together from a [`Config`].

use crate::api::{Http, Mode, ReqwestHttp, Service, TestHttp, Transport};
use crate::credentials::CredentialStore;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::Profile;
use crate::nav::{guard, Guard, Navigator, Route};
use crate::session::{Session, SessionCell, SessionState};
use crate::{Config, Result};
use anyhow::anyhow;
use std::sync::Arc;
use tracing::debug;

/// One running instance of the app. Clones share all state.
#[derive(Clone)]
pub struct Client {
    credentials: CredentialStore,
    navigator: Navigator,
    service: Service,
    session: Session,
}

impl Client {
    /// Reads the credential storage and builds the transport for `mode`. No request is sent and
    /// the session stays `Loading` until [`Session::resolve`] runs.
    pub async fn connect(config: &Config, mode: Mode) -> Result<Self> {
        let credentials = CredentialStore::open(&config.storage_path()).await?;
        let http: Arc<dyn Http> = match mode {
            Mode::Live => Arc::new(
                ReqwestHttp::new(config.timeout()).pub_result(ErrorType::Internal)?,
            ),
            Mode::Test => Arc::new(TestHttp::new(config.api_url())),
        };
        debug!("Connecting to {} in {mode} mode", config.api_url());

        let cell = SessionCell::new();
        let navigator = Navigator::default();
        let transport = Transport::new(
            http,
            config.api_url().clone(),
            credentials.clone(),
            cell.clone(),
            navigator.clone(),
        );
        let service = Service::new(transport);
        let session = Session::new(
            service.clone(),
            credentials.clone(),
            cell,
            navigator.clone(),
        );

        Ok(Self {
            credentials,
            navigator,
            service,
            session,
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolves the session and runs the guard for `route`. Returns the user when the view may be
    /// shown, otherwise an `Auth` error and the navigator is sent to the login view.
    pub async fn require_user(&self, route: Route) -> Result<Profile> {
        let state = self.session.resolve().await;
        match guard(&state) {
            Guard::Allow => {
                self.navigator.redirect(route);
                match state {
                    SessionState::Authenticated(user) => Ok(user),
                    _ => Err(not_logged_in()),
                }
            }
            Guard::Redirect(to) => {
                self.navigator.redirect(to);
                Err(not_logged_in())
            }
            Guard::Suspend => Err(Error::new(
                ErrorType::Internal,
                anyhow!("The session is still being resolved"),
            )),
        }
    }
}

fn not_logged_in() -> Error {
    Error::new(
        ErrorType::Auth,
        anyhow!("You are not logged in, run 'expenses login' first"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_require_user_when_anonymous() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let e = client.require_user(Route::Expenses).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
        assert_eq!(client.navigator().current(), Route::Login);
    }

    #[tokio::test]
    async fn test_require_user_when_logged_in() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        let user = client.require_user(Route::Settings).await.unwrap();
        assert_eq!(user.email, TestEnv::EMAIL);
        assert_eq!(client.navigator().current(), Route::Settings);
    }

    #[tokio::test]
    async fn test_revoked_token_logs_out() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        env.server().revoke_tokens();
        let e = client.require_user(Route::Dashboard).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
        assert!(client.credentials().get().is_none());
        assert_eq!(client.navigator().current(), Route::Login);
    }
}
