//! Navigation targets and the route guard for protected views.

use crate::model::ExpenseId;
use crate::session::SessionState;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// The views of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Expenses,
    NewExpense,
    EditExpense(ExpenseId),
    Settings,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Expenses => "/expenses".to_string(),
            Route::NewExpense => "/expenses/new".to_string(),
            Route::EditExpense(id) => format!("/expenses/{id}/edit"),
            Route::Settings => "/settings".to_string(),
        }
    }

    /// Whether the view needs an authenticated session.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Holds the current route. Anything that needs to follow navigation, including forced
/// redirects to the login view, subscribes to it.
#[derive(Debug, Clone)]
pub struct Navigator {
    route: Arc<watch::Sender<Route>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Dashboard)
    }
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        let (route, _) = watch::channel(initial);
        Self {
            route: Arc::new(route),
        }
    }

    pub fn redirect(&self, to: Route) {
        let from = self.route.send_replace(to);
        if from != to {
            debug!("Navigating from {from} to {to}");
        }
    }

    pub fn current(&self) -> Route {
        *self.route.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.route.subscribe()
    }
}

/// The decision a protected view makes before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The session is still being resolved. Render nothing and decide nothing.
    Suspend,
    Allow,
    Redirect(Route),
}

/// Never redirects while the session is loading, otherwise a valid session would flash the
/// login view.
pub fn guard(state: &SessionState) -> Guard {
    match state {
        SessionState::Loading => Guard::Suspend,
        SessionState::Anonymous => Guard::Redirect(Route::Login),
        SessionState::Authenticated(_) => Guard::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;

    #[test]
    fn test_guard() {
        assert_eq!(guard(&SessionState::Loading), Guard::Suspend);
        assert_eq!(
            guard(&SessionState::Anonymous),
            Guard::Redirect(Route::Login)
        );
        let user = Profile {
            id: 1,
            email: "a@b.c".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        assert_eq!(guard(&SessionState::Authenticated(user)), Guard::Allow);
    }

    #[test]
    fn test_paths() {
        assert_eq!(Route::EditExpense(7).to_string(), "/expenses/7/edit");
        assert!(!Route::Login.is_protected());
        assert!(Route::Settings.is_protected());
    }

    #[tokio::test]
    async fn test_subscribers_see_redirect() {
        let nav = Navigator::default();
        let mut rx = nav.subscribe();
        nav.redirect(Route::Login);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Route::Login);
        assert_eq!(nav.current(), Route::Login);
    }
}
