use super::error::ClientError;
use super::session::{Session, TokenValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    Expenses,
}

impl Route {
    /// Unknown paths resolve like `/`.
    pub fn resolve(path: &str) -> Route {
        match path.trim().trim_end_matches('/') {
            "/login" | "login" => Route::Login,
            "/expenses" | "expenses" => Route::Expenses,
            _ => Route::Root,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::Expenses => "/expenses",
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Expenses)
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow(Route),
    Redirect(Route),
}

impl Navigation {
    /// Where the user ends up.
    pub fn target(&self) -> Route {
        match self {
            Navigation::Allow(route) | Navigation::Redirect(route) => *route,
        }
    }
}

/// Presence-only rule: a stored token opens the protected view.
pub fn guard(route: Route, has_token: bool) -> Navigation {
    match route {
        Route::Login => Navigation::Allow(Route::Login),
        Route::Root if has_token => Navigation::Redirect(Route::Expenses),
        Route::Root => Navigation::Redirect(Route::Login),
        Route::Expenses if has_token => Navigation::Allow(Route::Expenses),
        Route::Expenses => Navigation::Redirect(Route::Login),
    }
}

/// Presence check first, then a (cached) validity check. A token the
/// server rejects is cleared and the user is sent to login.
pub async fn navigate(
    route: Route,
    session: &Session,
    validator: &dyn TokenValidator,
) -> Result<Navigation, ClientError> {
    let presence = guard(route, session.has_token()?);
    if presence.target() == Route::Login {
        return Ok(presence);
    }

    if session.is_authenticated(validator).await? {
        Ok(presence)
    } else {
        log::info!("🔒 Token no longer valid, redirecting to {}", Route::Login.path());
        Ok(Navigation::Redirect(Route::Login))
    }
}
