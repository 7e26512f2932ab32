//! Session store: the single owner of authentication state.
//!
//! DESIGN
//! ======
//! The session is a tagged value, `LoggedOut` or `LoggedIn { token, username }`,
//! swapped atomically. Durable storage is a mirror written on every change and
//! read once at construction. The store hands the `ApiClient` a token accessor
//! that reads the in-memory session, so outbound headers and
//! `is_authenticated` can never disagree.
//!
//! CONCURRENCY
//! ===========
//! Each `login` call takes a generation number. Only the newest attempt may
//! write the session, the error message, or clear `loading`; an older attempt
//! that resolves late is reported to its caller as superseded. `logout`
//! also bumps the generation so an in-flight login cannot undo it.
//! Storage is written under the state write lock, so the last session
//! committed in memory is always the one left on disk.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiClient, ApiError, TokenSource};
use crate::storage::{DurableStorage, TOKEN_KEY, USERNAME_KEY};

pub const LOGIN_PATH: &str = "/auth/login";
pub const MISSING_TOKEN_MESSAGE: &str = "unable to obtain token from server";
pub const GENERIC_LOGIN_FAILURE: &str = "login failed";
pub const SUPERSEDED_MESSAGE: &str = "login superseded by a newer attempt";

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn { token: String, username: String },
}

impl Session {
    /// An empty token yields `LoggedOut`.
    #[must_use]
    pub fn logged_in(token: impl Into<String>, username: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            return Self::LoggedOut;
        }
        Self::LoggedIn { token, username: username.into() }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::LoggedOut => "",
            Self::LoggedIn { token, .. } => token,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::LoggedOut => "",
            Self::LoggedIn { username, .. } => username,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.token().is_empty()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful `/auth/login` payload. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureKind {
    /// Connection failure or timeout.
    Network,
    /// Non-2xx response.
    HttpStatus,
    /// 2xx response without an `access_token`.
    AuthResponse,
    /// A newer login or a logout happened while this attempt was in flight.
    Superseded,
}

/// The single error `login` hands back: a display-ready message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoginError {
    message: String,
    kind: LoginFailureKind,
}

impl LoginError {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn kind(&self) -> LoginFailureKind {
        self.kind
    }

    fn superseded() -> Self {
        Self { message: SUPERSEDED_MESSAGE.to_owned(), kind: LoginFailureKind::Superseded }
    }
}

/// Internal failure before normalization into [`LoginError`].
#[derive(Debug, thiserror::Error)]
enum LoginFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("unable to obtain token from server")]
    AuthResponse,
}

impl LoginFailure {
    /// Server detail, then the error's own text, then the generic fallback.
    fn into_login_error(self) -> LoginError {
        let kind = match &self {
            Self::Api(ApiError::Status { .. }) => LoginFailureKind::HttpStatus,
            Self::Api(_) => LoginFailureKind::Network,
            Self::AuthResponse => LoginFailureKind::AuthResponse,
        };
        let detail = match &self {
            Self::Api(e) => e.detail().filter(|d| !d.is_empty()).map(str::to_owned),
            Self::AuthResponse => None,
        };
        let message = detail
            .or_else(|| Some(self.to_string()).filter(|m| !m.is_empty()))
            .unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_owned());
        LoginError { message, kind }
    }
}

fn parse_login_payload(data: Value) -> Result<LoginResponse, LoginFailure> {
    let has_token = data
        .get("access_token")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if !has_token {
        return Err(LoginFailure::AuthResponse);
    }
    serde_json::from_value(data).map_err(|_| LoginFailure::AuthResponse)
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    session: Session,
    loading: bool,
    error: String,
    generation: u64,
}

type SharedState = Arc<RwLock<StoreState>>;

fn read(state: &SharedState) -> RwLockReadGuard<'_, StoreState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &SharedState) -> RwLockWriteGuard<'_, StoreState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Token accessor handed to the `ApiClient`.
struct SessionTokens(SharedState);

impl TokenSource for SessionTokens {
    fn bearer_token(&self) -> Option<String> {
        let state = read(&self.0);
        Some(state.session.token().to_owned()).filter(|t| !t.is_empty())
    }
}

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionStore {
    state: SharedState,
    storage: Arc<dyn DurableStorage>,
    api: ApiClient,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = read(&self.state);
        f.debug_struct("SessionStore")
            .field("authenticated", &state.session.is_authenticated())
            .field("username", &state.session.username())
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Restore the session from `storage` and wire `api` to read tokens from it.
    #[must_use]
    pub fn new(api: ApiClient, storage: Arc<dyn DurableStorage>) -> Self {
        let token = storage.get_item(TOKEN_KEY).unwrap_or_default();
        let username = storage.get_item(USERNAME_KEY).unwrap_or_default();
        let session = Session::logged_in(token, username);
        if session.is_authenticated() {
            tracing::debug!(username = session.username(), "restored session from storage");
        }

        let state: SharedState = Arc::new(RwLock::new(StoreState { session, ..StoreState::default() }));
        let api = api.with_token_source(Arc::new(SessionTokens(Arc::clone(&state))));
        Self { state, storage, api }
    }

    /// The API client bound to this session's token.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn session(&self) -> Session {
        read(&self.state).session.clone()
    }

    #[must_use]
    pub fn token(&self) -> String {
        read(&self.state).session.token().to_owned()
    }

    #[must_use]
    pub fn username(&self) -> String {
        read(&self.state).session.username().to_owned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        read(&self.state).session.is_authenticated()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        read(&self.state).loading
    }

    /// Message from the last failed login, empty otherwise.
    #[must_use]
    pub fn error(&self) -> String {
        read(&self.state).error.clone()
    }

    /// Replace the session and mirror it to storage.
    pub fn set_session(&self, session: Session) {
        let mut state = write(&self.state);
        state.session = session;
        self.persist(&state.session);
    }

    /// Authenticate against `POST /auth/login` and store the returned token.
    ///
    /// # Errors
    ///
    /// Returns a [`LoginError`] carrying a display-ready message on network
    /// failure, non-2xx status, a response without `access_token`, or when
    /// a newer login or logout superseded this call. The same message is
    /// stored in [`SessionStore::error`] unless the call was superseded.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, LoginError> {
        let generation = {
            let mut state = write(&self.state);
            state.generation += 1;
            state.loading = true;
            state.error.clear();
            state.generation
        };
        tracing::debug!(username = %credentials.username, generation, "login attempt");

        let result = self.request_token(credentials).await;

        let mut state = write(&self.state);
        if state.generation != generation {
            tracing::debug!(username = %credentials.username, generation, "discarding stale login result");
            return Err(LoginError::superseded());
        }
        state.loading = false;

        match result {
            Ok(payload) => {
                state.session = Session::logged_in(payload.access_token.clone(), credentials.username.clone());
                self.persist(&state.session);
                drop(state);
                tracing::info!(username = %credentials.username, "login succeeded");
                Ok(payload)
            }
            Err(failure) => {
                let err = failure.into_login_error();
                state.error = err.message().to_owned();
                drop(state);
                tracing::warn!(username = %credentials.username, error = %err, "login failed");
                Err(err)
            }
        }
    }

    /// Clear the session and its stored copy. Cancels any in-flight login.
    pub fn logout(&self) {
        {
            let mut state = write(&self.state);
            state.generation += 1;
            state.loading = false;
            state.session = Session::LoggedOut;
            self.persist(&state.session);
        }
        tracing::info!("logged out");
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<LoginResponse, LoginFailure> {
        let response = self.api.post(LOGIN_PATH, credentials).await?;
        parse_login_payload(response.data)
    }

    /// Callers hold the state write lock so storage order matches commit order.
    fn persist(&self, session: &Session) {
        let result = match session {
            Session::LoggedIn { token, username } => self.storage.set_item(TOKEN_KEY, token).and_then(|()| {
                if username.is_empty() {
                    self.storage.remove_item(USERNAME_KEY)
                } else {
                    self.storage.set_item(USERNAME_KEY, username)
                }
            }),
            Session::LoggedOut => self
                .storage
                .remove_item(TOKEN_KEY)
                .and_then(|()| self.storage.remove_item(USERNAME_KEY)),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }
}
