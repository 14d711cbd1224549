//! In-memory identity provider for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use portcullis_core::{CookieJar, Cookies, SameSite, SessionUser, SetCookie};

use crate::error::{IdentityError, IdentityResult};
use crate::provider::IdentityProvider;

/// Default session cookie name used by the in-memory provider.
pub const DEFAULT_SESSION_COOKIE: &str = "portcullis-session";

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, SessionUser>,
    accounts: HashMap<String, (String, SessionUser)>,
    refresh: HashMap<String, String>,
}

/// Identity provider backed by a map of session tokens.
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// gate owns another.
#[derive(Debug, Clone)]
pub struct InMemoryIdentityProvider {
    cookie_name: String,
    state: Arc<RwLock<State>>,
    calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    /// Creates an empty provider using [`DEFAULT_SESSION_COOKIE`].
    pub fn new() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            state: Arc::new(RwLock::new(State::default())),
            calls: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Name of the session cookie this provider reads and writes.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Registers a live session token for `user`.
    pub fn insert_session(&self, token: impl Into<String>, user: SessionUser) {
        self.state.write().sessions.insert(token.into(), user);
    }

    /// Makes `token` rotate on its next use: the provider emits a new
    /// session cookie carrying `new_token`.
    pub fn rotate_on_use(&self, token: impl Into<String>, new_token: impl Into<String>) {
        self.state.write().refresh.insert(token.into(), new_token.into());
    }

    /// Registers an account usable with [`IdentityProvider::sign_in`].
    pub fn insert_account(&self, email: impl Into<String>, password: impl Into<String>, user: SessionUser) {
        self.state
            .write()
            .accounts
            .insert(email.into(), (password.into(), user));
    }

    /// Makes every call fail with [`IdentityError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every `current_user` call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of `current_user` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn session_cookie(&self, token: &str) -> SetCookie {
        SetCookie::new(self.cookie_name.clone(), token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
    }

    fn issue_session(&self, user: &SessionUser, jar: &mut CookieJar) {
        let token = format!("session-{}-{}", user.id, self.calls() + self.state.read().sessions.len());
        self.state.write().sessions.insert(token.clone(), user.clone());
        jar.push(self.session_cookie(&token));
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_user(
        &self,
        cookies: &Cookies,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(token) = cookies.get(&self.cookie_name) else {
            return if self.unavailable.load(Ordering::SeqCst) {
                Err(IdentityError::Unavailable)
            } else {
                Ok(None)
            };
        };

        let rotated = self.state.write().refresh.remove(token);
        if let Some(new_token) = rotated {
            let user = self.state.read().sessions.get(token).cloned();
            if let Some(user) = user {
                self.state.write().sessions.insert(new_token.clone(), user);
            }
            jar.push(self.session_cookie(&new_token));
        }

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable);
        }

        Ok(self.state.read().sessions.get(token).cloned())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<SessionUser> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable);
        }
        let account = self.state.read().accounts.get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => {
                self.issue_session(&user, jar);
                Ok(user)
            }
            _ => Err(IdentityError::rejected("Invalid login credentials")),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable);
        }
        if self.state.read().accounts.contains_key(email) {
            return Err(IdentityError::rejected("User already registered"));
        }
        let id = format!("user-{}", self.state.read().accounts.len() + 1);
        let user = SessionUser::new(id).with_email(email);
        self.insert_account(email, password, user.clone());
        self.issue_session(&user, jar);
        Ok(Some(user))
    }
}
