//! Session manager for authentication lifecycle
//!
//! Owns the derived session state and is the only writer of the bearer
//! credential. Startup resolves the persisted credential into a settled
//! state; afterwards the session moves between authenticated and
//! anonymous through login, logout, refresh, and the global 401 policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::{RegisterRequest, UserProfile};
use crate::auth::{Credential, TokenStore};
use crate::error::{Error, Result};

/// Authentication status derived from the credential
///
/// Holding the profile inside `Authenticated` makes "user present iff
/// authenticated" structural; there is no separate nullable user field
/// to fall out of sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup: a persisted credential may exist but is unvalidated
    Bootstrapping,
    /// Verified identity with its profile snapshot
    Authenticated(UserProfile),
    /// No credential, or the last one was rejected
    Anonymous,
}

impl SessionState {
    /// Whether this state carries a verified identity
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The profile, if authenticated
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bootstrapping => write!(f, "bootstrapping"),
            Self::Authenticated(user) => write!(f, "authenticated as {}", user.email),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Server operations the session manager depends on
///
/// Implemented by `ApiClient` in production; tests substitute stubs.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn exchange_token(&self, email: &str, password: &str) -> Result<Credential>;

    /// Create a new account
    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile>;

    /// Fetch the profile a credential resolves to
    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile>;
}

/// Manager for the authentication session
///
/// One instance per process; everything that needs the session holds a
/// reference to it rather than reaching into globals. Each settled
/// transition advances an epoch counter, and async completions that
/// started under an older epoch are discarded instead of applied.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    tokens: Arc<TokenStore>,
    state: RwLock<SessionState>,
    epoch: AtomicU64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .finish()
    }
}

impl SessionManager {
    /// Create a manager starting in `Bootstrapping`
    pub fn new(backend: Arc<dyn AuthBackend>, tokens: Arc<TokenStore>) -> Self {
        Self {
            backend,
            tokens,
            state: RwLock::new(SessionState::Bootstrapping),
            epoch: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current session state
    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .ok()
            .map(|state| state.clone())
            .unwrap_or(SessionState::Anonymous)
    }

    /// Whether a verified identity is active
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The current user's profile, if authenticated
    pub fn current_user(&self) -> Option<UserProfile> {
        match self.state() {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Resolve the persisted credential into a settled session
    ///
    /// Runs once at startup. With no stored credential the session
    /// settles `Anonymous` without any profile request; a stored
    /// credential must prove itself against the profile endpoint or it
    /// is cleared from durable storage.
    pub async fn bootstrap(&self) -> SessionState {
        if !matches!(self.state(), SessionState::Bootstrapping) {
            warn!("bootstrap called on a settled session");
            return self.state();
        }

        let stored = match self.tokens.load_persisted().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "credential store unavailable, starting anonymous");
                None
            }
        };

        let Some(credential) = stored else {
            debug!("no persisted credential");
            self.settle(SessionState::Anonymous);
            return self.state();
        };

        self.tokens.hydrate(Some(credential.clone()));
        let epoch = self.current_epoch();

        let fetched = self.backend.fetch_profile(&credential).await;

        if self.current_epoch() != epoch {
            debug!("discarding stale bootstrap completion");
            return self.state();
        }

        match fetched {
            Ok(user) => {
                info!(user_id = user.id, "session restored");
                self.settle(SessionState::Authenticated(user));
            }
            Err(e) => {
                info!(error = %e, "persisted credential rejected, clearing");
                self.tokens.set(None).await;
                self.settle(SessionState::Anonymous);
            }
        }

        self.state()
    }

    /// Authenticate with email and password
    ///
    /// The token exchange and the subsequent profile fetch must both
    /// succeed. A token whose profile cannot be loaded is discarded and
    /// the whole login fails; the session never ends up holding a
    /// credential without an identity. Completions that land after the
    /// session has already moved on (a logout while the exchange or the
    /// profile fetch was in flight) are discarded without touching the
    /// newer state, and the login fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let epoch = self.current_epoch();

        let credential = self
            .backend
            .exchange_token(email, password)
            .await
            .map_err(reject_as_auth)?;

        // A token that arrives after the session moved on is never stored
        if self.current_epoch() != epoch {
            debug!("discarding stale login completion");
            return Err(login_superseded());
        }

        self.tokens.set(Some(credential.clone())).await;

        let fetched = self.backend.fetch_profile(&credential).await;

        if self.current_epoch() != epoch {
            debug!("discarding stale login completion");
            return Err(login_superseded());
        }

        match fetched {
            Ok(user) => {
                self.settle(SessionState::Authenticated(user.clone()));
                info!(user_id = user.id, "logged in");
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed after token exchange, rolling back");
                self.tokens.set(None).await;
                self.settle(SessionState::Anonymous);
                Err(Error::Auth("failed to load user profile".to_string()))
            }
        }
    }

    /// Create an account and log straight into it
    ///
    /// Registration rejections surface as authentication failures and
    /// no login is attempted; there is no registered-but-logged-out
    /// success path.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<UserProfile> {
        let mut request = RegisterRequest::new(email, password);
        if let Some(name) = name {
            request = request.with_name(name);
        }

        self.backend
            .register(&request)
            .await
            .map_err(reject_as_auth)?;

        info!("account registered, logging in");
        self.login(email, password).await
    }

    /// End the session
    ///
    /// The state flips and the in-memory credential drops before any
    /// I/O begins; durable deletion is best-effort and cannot fail the
    /// logout.
    pub async fn logout(&self) {
        self.settle(SessionState::Anonymous);
        self.tokens.set(None).await;
        info!("logged out");
    }

    /// Re-fetch the profile for the current credential
    ///
    /// Completions that land after the session has already moved on
    /// (a logout or newer login while the fetch was in flight) are
    /// discarded without touching state.
    pub async fn refresh_user(&self) -> Result<()> {
        let epoch = self.current_epoch();

        let Some(credential) = self.tokens.get().await else {
            return Err(Error::Auth("no active session to refresh".to_string()));
        };

        let fetched = self.backend.fetch_profile(&credential).await;

        if self.current_epoch() != epoch {
            debug!("discarding stale profile refresh");
            return Ok(());
        }

        match fetched {
            Ok(user) => {
                self.settle(SessionState::Authenticated(user));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "profile refresh failed, ending session");
                self.tokens.set(None).await;
                self.settle(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    /// Apply the global 401 policy to an error observed elsewhere
    ///
    /// Any `Unauthorized` response means the server no longer honors
    /// the current credential, so the session ends exactly as if the
    /// user had logged out. Returns whether a teardown happened.
    pub async fn recover(&self, error: &Error) -> bool {
        if !error.is_unauthorized() {
            return false;
        }
        if matches!(self.state(), SessionState::Anonymous) {
            return false;
        }

        warn!("credential rejected by server, ending session");
        self.logout().await;
        true
    }

    fn settle(&self, next: SessionState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Rejections during login or registration read as authentication
/// failures, not as an expired session; server faults and transport
/// errors pass through unchanged
fn reject_as_auth(error: Error) -> Error {
    match error {
        Error::Unauthorized(message) => Error::Auth(message),
        Error::Api { status, message } if (400..500).contains(&status) => Error::Auth(message),
        other => other,
    }
}

/// A login whose completion lands after the session has moved on does
/// not apply; the newer state wins
fn login_superseded() -> Error {
    Error::Auth("login superseded by a newer session change".to_string())
}
