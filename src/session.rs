//! Session state, the stale-completion guard and the session lifecycle operations.

use crate::api::{ApiError, Service};
use crate::credentials::{CredentialPair, CredentialStore};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{
    AuthResponse, LoginRequest, PasswordChange, Profile, ProfileUpdate, RegisterRequest,
};
use crate::nav::{Navigator, Route};
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Who is using the app. `Loading` is only ever seen before the first resolution completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Authenticated(Profile),
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// Identifies one asynchronous session operation. See [`SessionCell::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// The observable session state plus a generation counter.
///
/// Every operation that will eventually change the session takes a [`Ticket`] before it starts
/// awaiting. Its result is applied only if no other operation began, and no invalidation
/// happened, in the meantime. This keeps a slow profile fetch that completes after a logout from
/// resurrecting the session.
#[derive(Debug, Clone)]
pub struct SessionCell {
    state: Arc<watch::Sender<SessionState>>,
    generation: Arc<AtomicU64>,
}

impl Default for SessionCell {
    fn default() -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an operation. Any ticket handed out earlier becomes stale.
    pub fn begin(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Publishes `state` if `ticket` is still current. Returns whether it was applied.
    pub fn apply(&self, ticket: Ticket, state: SessionState) -> bool {
        // The check happens under the channel's lock, so it cannot interleave with invalidate.
        let applied = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != ticket.0 {
                return false;
            }
            *current = state;
            true
        });
        if !applied {
            debug!("Dropping a stale session update");
        }
        applied
    }

    /// Ends the session. All outstanding tickets become stale.
    pub fn invalidate(&self) {
        self.state.send_modify(|current| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *current = SessionState::Anonymous;
        });
    }

    /// Replaces the cached profile. Does nothing unless a user is authenticated.
    pub fn set_user(&self, user: Profile) -> bool {
        self.state.send_if_modified(|current| match current {
            SessionState::Authenticated(existing) => {
                *existing = user;
                true
            }
            _ => false,
        })
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

/// The session lifecycle: resolving a stored credential, logging in and out, and the account
/// operations that end or change the session.
#[derive(Clone)]
pub struct Session {
    service: Service,
    credentials: CredentialStore,
    cell: SessionCell,
    navigator: Navigator,
}

impl Session {
    pub(crate) fn new(
        service: Service,
        credentials: CredentialStore,
        cell: SessionCell,
        navigator: Navigator,
    ) -> Self {
        Self {
            service,
            credentials,
            cell,
            navigator,
        }
    }

    pub fn state(&self) -> SessionState {
        self.cell.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.cell.subscribe()
    }

    pub fn cell(&self) -> &SessionCell {
        &self.cell
    }

    /// Exchanges the stored access token for the current profile.
    ///
    /// - No token: `Anonymous`, without a request.
    /// - Profile fetched: `Authenticated(user)`.
    /// - Any failure: the credentials are cleared and the state becomes `Anonymous`.
    ///
    /// The state stays `Loading` for as long as the request is in flight.
    pub async fn resolve(&self) -> SessionState {
        let ticket = self.cell.begin();
        if self.credentials.access_token().is_none() {
            debug!("No stored credentials");
            self.cell.apply(ticket, SessionState::Anonymous);
            return self.cell.current();
        }

        self.cell.apply(ticket, SessionState::Loading);
        match self.service.profile().await {
            Ok(user) => {
                debug!("Resolved the session for user {}", user.id);
                self.cell.apply(ticket, SessionState::Authenticated(user));
            }
            Err(e) => {
                debug!("Unable to resolve the session: {e}");
                // An auth rejection has already invalidated the ticket and cleared the store.
                if self.cell.is_current(ticket) {
                    if let Err(e) = self.credentials.clear().await {
                        error!("Unable to clear stored credentials: {e}");
                    }
                    self.cell.apply(ticket, SessionState::Anonymous);
                }
            }
        }
        self.cell.current()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Profile> {
        let ticket = self.cell.begin();
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self
            .service
            .login(&request)
            .await
            .context("Login failed")
            .pub_result(ErrorType::Auth)?;
        self.establish(ticket, response).await
    }

    /// The confirmation is compared before anything is sent.
    pub async fn register(&self, form: &RegisterRequest) -> Result<Profile> {
        if form.password != form.confirm_password {
            return Err(
                ApiError::invalid_field("confirm_password", "Passwords do not match").into(),
            );
        }
        let ticket = self.cell.begin();
        let response = self
            .service
            .register(form)
            .await
            .context("Registration failed")
            .pub_result(ErrorType::Request)?;
        self.establish(ticket, response).await
    }

    /// Stores the pair and publishes the user as one transition.
    async fn establish(&self, ticket: Ticket, response: AuthResponse) -> Result<Profile> {
        if !self.cell.is_current(ticket) {
            return Err(superseded());
        }
        self.credentials
            .set(CredentialPair::new(response.access, response.refresh))
            .await?;
        let user = response.user;
        if !self
            .cell
            .apply(ticket, SessionState::Authenticated(user.clone()))
        {
            // Something ended the session while the tokens were being written.
            self.credentials.clear().await?;
            return Err(superseded());
        }
        info!("Logged in as {}", user.email);
        Ok(user)
    }

    /// Ends the session locally. Nothing is sent to the server.
    pub async fn logout(&self) -> Result<()> {
        self.cell.invalidate();
        let cleared = self.credentials.clear().await;
        self.navigator.redirect(Route::Login);
        cleared
    }

    pub fn set_user(&self, user: Profile) {
        self.cell.set_user(user);
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        let user = self
            .service
            .update_profile(update)
            .await
            .context("Unable to update the profile")
            .pub_result(ErrorType::Request)?;
        self.set_user(user.clone());
        Ok(user)
    }

    /// The confirmation is compared before anything is sent.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        if change.new_password != change.confirm_password {
            return Err(ApiError::invalid_field(
                "confirm_password",
                "New passwords do not match",
            )
            .into());
        }
        self.service
            .change_password(change)
            .await
            .context("Unable to change the password")
            .pub_result(ErrorType::Request)
    }

    /// Deletes the account on the server, then logs out.
    pub async fn delete_account(&self) -> Result<()> {
        self.service
            .delete_profile()
            .await
            .context("Unable to delete the account")
            .pub_result(ErrorType::Request)?;
        self.logout().await
    }
}

fn superseded() -> Error {
    Error::new(
        ErrorType::Auth,
        anyhow!("The session changed while logging in, please try again"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiErrorKind, Http, HttpRequest, HttpResponse, Transport};
    use crate::test::TestEnv;
    use tokio::sync::Notify;
    use url::Url;

    fn user(id: i64) -> Profile {
        Profile {
            id,
            email: format!("user{id}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }

    /// Answers every request with the profile of user 1, but only once released.
    #[derive(Default)]
    struct Gated {
        started: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl Http for Gated {
        async fn send(&self, _: HttpRequest) -> std::result::Result<HttpResponse, ApiError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(HttpResponse {
                status: 200,
                body: serde_json::to_string(&user(1)).unwrap(),
            })
        }
    }

    struct GatedClient {
        http: Arc<Gated>,
        session: Session,
        credentials: CredentialStore,
        navigator: Navigator,
    }

    async fn gated_client() -> GatedClient {
        let http = Arc::new(Gated::default());
        let credentials = CredentialStore::in_memory();
        credentials
            .set(CredentialPair::new("access", "refresh"))
            .await
            .unwrap();
        let cell = SessionCell::new();
        let navigator = Navigator::default();
        let transport = Transport::new(
            http.clone(),
            Url::parse("http://127.0.0.1:8000/").unwrap(),
            credentials.clone(),
            cell.clone(),
            navigator.clone(),
        );
        let session = Session::new(
            Service::new(transport),
            credentials.clone(),
            cell,
            navigator.clone(),
        );
        GatedClient {
            http,
            session,
            credentials,
            navigator,
        }
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let cell = SessionCell::new();
        let first = cell.begin();
        let second = cell.begin();
        assert!(!cell.apply(first, SessionState::Authenticated(user(1))));
        assert_eq!(cell.current(), SessionState::Loading);
        assert!(cell.apply(second, SessionState::Anonymous));
        assert_eq!(cell.current(), SessionState::Anonymous);
    }

    #[test]
    fn test_invalidate_makes_tickets_stale() {
        let cell = SessionCell::new();
        let ticket = cell.begin();
        cell.invalidate();
        assert!(!cell.is_current(ticket));
        assert!(!cell.apply(ticket, SessionState::Authenticated(user(1))));
        assert_eq!(cell.current(), SessionState::Anonymous);
    }

    #[test]
    fn test_set_user_only_when_authenticated() {
        let cell = SessionCell::new();
        assert!(!cell.set_user(user(2)));
        let ticket = cell.begin();
        cell.apply(ticket, SessionState::Authenticated(user(1)));
        assert!(cell.set_user(user(2)));
        assert_eq!(cell.current().user().unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_resolve_without_credentials_is_anonymous() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        assert!(client.session().state().is_loading());
        assert_eq!(client.session().resolve().await, SessionState::Anonymous);
        assert!(env.server().requests().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_is_loading_while_in_flight() {
        let client = gated_client().await;
        let session = client.session.clone();
        let task = tokio::spawn(async move { session.resolve().await });

        client.http.started.notified().await;
        assert!(client.session.state().is_loading());

        client.http.release.notify_one();
        let state = task.await.unwrap();
        assert_eq!(state.user().map(|u| u.id), Some(1));
        assert_eq!(client.session.state(), state);
    }

    #[tokio::test]
    async fn test_resolve_finishing_after_logout_is_dropped() {
        let client = gated_client().await;
        let session = client.session.clone();
        let task = tokio::spawn(async move { session.resolve().await });

        client.http.started.notified().await;
        client.session.logout().await.unwrap();
        assert_eq!(client.session.state(), SessionState::Anonymous);

        client.http.release.notify_one();
        let state = task.await.unwrap();
        assert_eq!(state, SessionState::Anonymous);
        assert_eq!(client.session.state(), SessionState::Anonymous);
        assert!(client.credentials.get().is_none());
        assert_eq!(client.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn test_login_then_resolve_in_a_new_process() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let profile = client
            .session()
            .login(TestEnv::EMAIL, TestEnv::PASSWORD)
            .await
            .unwrap();
        assert_eq!(profile.email, TestEnv::EMAIL);
        assert!(client.credentials().get().is_some());

        // A second client reads the same storage file.
        let again = env.client().await;
        let state = again.session().resolve().await;
        assert_eq!(state.user().unwrap().email, TestEnv::EMAIL);
    }

    #[tokio::test]
    async fn test_resolve_with_rejected_token() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        client
            .credentials()
            .set(CredentialPair::new("expired", "refresh"))
            .await
            .unwrap();
        env.server().force_status("/api/profile/", 403);

        let state = client.session().resolve().await;
        assert_eq!(state, SessionState::Anonymous);
        assert!(client.credentials().get().is_none());
        assert_eq!(client.navigator().current(), Route::Login);
    }

    #[tokio::test]
    async fn test_resolve_network_failure_clears_credentials() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        env.server().set_offline(true);
        let state = client.session().resolve().await;
        assert_eq!(state, SessionState::Anonymous);
        assert!(client.credentials().get().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let e = client
            .session()
            .login(TestEnv::EMAIL, "wrong")
            .await
            .unwrap_err();
        assert_eq!(e.api_error().unwrap().kind(), ApiErrorKind::AuthInvalid);
        assert!(client.credentials().get().is_none());
        assert_eq!(client.session().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_makes_no_request() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        let before = env.server().requests().len();
        client.session().logout().await.unwrap();
        assert_eq!(env.server().requests().len(), before);
        assert!(client.credentials().get().is_none());
        assert_eq!(client.session().state(), SessionState::Anonymous);
        assert_eq!(client.navigator().current(), Route::Login);
    }

    #[tokio::test]
    async fn test_register_establishes_session() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let form = RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical1".to_string(),
            confirm_password: "analytical1".to_string(),
        };
        let user = client.session().register(&form).await.unwrap();
        assert_eq!(user.first_name, "Ada");
        assert_eq!(client.session().state().user(), Some(&user));
    }

    #[tokio::test]
    async fn test_register_mismatch_sends_nothing() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let form = RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical1".to_string(),
            confirm_password: "analytical2".to_string(),
        };
        let e = client.session().register(&form).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Request);
        assert!(e.api_error().unwrap().field("confirm_password").is_some());
        assert!(env.server().requests().is_empty());
        assert!(client.credentials().get().is_none());
        // the session was never touched
        assert!(client.session().state().is_loading());
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let env = TestEnv::new().await;
        let client = env.client().await;
        let form = RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: TestEnv::EMAIL.to_string(),
            password: "short".to_string(),
            confirm_password: "short".to_string(),
        };
        let e = client.session().register(&form).await.unwrap_err();
        let api = e.api_error().unwrap();
        assert_eq!(api.kind(), ApiErrorKind::ValidationFailed);
        assert!(api.field("email").is_some());
        assert!(api.field("password").is_some());
    }

    #[tokio::test]
    async fn test_change_password_mismatch_sends_nothing() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        let before = env.server().requests().len();
        let change = PasswordChange {
            old_password: TestEnv::PASSWORD.to_string(),
            new_password: "brand-new-pass".to_string(),
            confirm_password: "brand-new-typo".to_string(),
        };
        let e = client.session().change_password(&change).await.unwrap_err();
        assert!(e.api_error().unwrap().field("confirm_password").is_some());
        assert_eq!(env.server().requests().len(), before);
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_password() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        let change = PasswordChange {
            old_password: "not-it".to_string(),
            new_password: "brand-new-pass".to_string(),
            confirm_password: "brand-new-pass".to_string(),
        };
        let e = client.session().change_password(&change).await.unwrap_err();
        assert!(e.api_error().unwrap().field("old_password").is_some());
        // still logged in
        assert!(client.session().state().user().is_some());
    }

    #[tokio::test]
    async fn test_update_profile_replaces_cached_user() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        let update = ProfileUpdate {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
        };
        client.session().update_profile(&update).await.unwrap();
        assert_eq!(
            client.session().state().user().unwrap().first_name,
            "Grace"
        );
    }

    #[tokio::test]
    async fn test_delete_account_logs_out() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        client.session().delete_account().await.unwrap();
        assert_eq!(client.session().state(), SessionState::Anonymous);
        assert!(client.credentials().get().is_none());
        let e = client
            .session()
            .login(TestEnv::EMAIL, TestEnv::PASSWORD)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
    }
}
