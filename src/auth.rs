//! Auth session handling.
//!
//! The remote client and the synchronizer never reach for a global auth
//! instance; they are handed a [`SessionProvider`] and ask it for the current
//! session on every call.

use std::fmt;
use std::sync::RwLock;

use log::info;

/// The signed-in principal and the bearer token for the task API.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Source of the current auth session.
pub trait SessionProvider: Send + Sync {
    /// The active session, or `None` when nobody is signed in.
    fn current_session(&self) -> Option<AuthSession>;

    /// Id of the signed-in user.
    fn current_user_id(&self) -> Option<String> {
        self.current_session().map(|session| session.user_id)
    }
}

/// In-process session holder, updated by the app's sign-in flow.
#[derive(Default)]
pub struct SessionStore {
    session: RwLock<Option<AuthSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(session: AuthSession) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    pub fn sign_in(&self, session: AuthSession) {
        info!("🔑 Signed in as {}", session.user_id);
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session);
        }
    }

    /// Forget the session, returning it if there was one.
    pub fn sign_out(&self) -> Option<AuthSession> {
        let previous = self.session.write().ok().and_then(|mut guard| guard.take());
        if let Some(session) = &previous {
            info!("🔒 Signed out {}", session.user_id);
        }
        previous
    }

    /// Replace the bearer token of the current session (token refresh).
    pub fn update_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.session.write() {
            if let Some(session) = guard.as_mut() {
                session.token = token.into();
            }
        }
    }
}

impl SessionProvider for SessionStore {
    fn current_session(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }
}
