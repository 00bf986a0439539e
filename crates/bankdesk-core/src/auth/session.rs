//! Session lifecycle: hydration, login, logout and token refresh.
//!
//! `SessionManager` is the single source of truth for whether the user is
//! signed in. It publishes every state change on a `watch` channel and is
//! the only component that writes persisted credentials.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{AuthError, RefreshError};
use super::store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::api::transport::{HttpRequest, Transport, TransportError};
use crate::config::join_url;

const TOKEN_PATH: &str = "/token/";
const TOKEN_REFRESH_PATH: &str = "/token/refresh/";

/// Login requests give up sooner than ordinary API calls.
const LOGIN_TIMEOUT_SECS: u64 = 15;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

// Tokens never reach log output.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// The refresh token was rejected mid-request and the session was torn down.
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub user: Option<User>,
    pub status: SessionStatus,
    /// Message from the last failed login or expiry, for inline display.
    pub last_error: Option<String>,
}

impl Session {
    fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            status: SessionStatus::Authenticated,
            last_error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Authenticating
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

/// Result of [`SessionManager::hydrate`].
///
/// `session` is the optimistic state derived from storage alone. Await
/// [`Hydration::settled`] for the state after the stored refresh token has
/// been checked against the server.
pub struct Hydration {
    pub session: Session,
    manager: Arc<SessionManager>,
    validation: Option<JoinHandle<Session>>,
}

impl Hydration {
    pub fn is_validating(&self) -> bool {
        self.validation.is_some()
    }

    pub async fn settled(self) -> Session {
        match self.validation {
            Some(handle) => match handle.await {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "Session validation task failed");
                    self.manager.session()
                }
            },
            None => self.session,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

#[derive(Default)]
struct RefreshSlot {
    next_id: u64,
    inflight: Option<(u64, SharedRefresh)>,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    api_url: String,
    state: watch::Sender<Session>,
    refresh: Mutex<RefreshSlot>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>, api_url: &str) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            transport,
            store,
            api_url: api_url.to_string(),
            state,
            refresh: Mutex::new(RefreshSlot::default()),
        }
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The persisted access token, if any.
    pub fn access_token(&self) -> Option<String> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                None
            }
        }
    }

    // ===== Hydration =====

    /// Restore the session from storage and validate it in the background.
    ///
    /// A stored pair with a cached user is reported as authenticated right
    /// away; the spawned validation then runs a refresh and signs out if
    /// the server no longer accepts the refresh token.
    pub fn hydrate(self: &Arc<Self>) -> Hydration {
        let session = self.restore();
        let validation = if session.is_authenticated() {
            let manager = Arc::clone(self);
            Some(tokio::spawn(async move { manager.validate().await }))
        } else {
            None
        };

        Hydration {
            session,
            manager: Arc::clone(self),
            validation,
        }
    }

    fn restore(&self) -> Session {
        let stored = self
            .store
            .load_pair()
            .and_then(|pair| Ok((pair, self.store.load_user()?)));

        let session = match stored {
            Ok((Some(_), Some(user))) => {
                debug!(username = %user.username, "Restored stored session");
                Session::authenticated(user)
            }
            Ok(_) => {
                // Half-written or identity-less leftovers are not a session
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear partial session state");
                }
                Session::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                Session::default()
            }
        };

        self.state.send_replace(session.clone());
        session
    }

    /// Second phase of hydration.
    pub async fn validate(&self) -> Session {
        let validated = self.stored_refresh_token();
        match self.refresh().await {
            Ok(_) => info!("Stored session validated"),
            Err(e) if self.stored_refresh_token() == validated => {
                warn!(error = %e, "Stored session is no longer valid");
                self.logout();
            }
            Err(e) => {
                debug!(error = %e, "Session changed during validation, keeping it");
            }
        }
        self.session()
    }

    fn stored_refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY).ok().flatten()
    }

    // ===== Login / logout =====

    /// Exchange a username and password for a credential pair.
    ///
    /// The user identity is taken from the submitted username; tokens are
    /// never decoded. Concurrent logins are not deduplicated.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.state.send_modify(|s| {
            s.status = SessionStatus::Authenticating;
            s.last_error = None;
        });
        info!(username = username, "Attempting login");

        let pair = match self.request_tokens(username, password).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(username = username, error = %e, "Login failed");
                self.state.send_modify(|s| {
                    s.status = if s.user.is_some() {
                        SessionStatus::Authenticated
                    } else {
                        SessionStatus::Unauthenticated
                    };
                    s.last_error = Some(e.to_string());
                });
                return Err(e);
            }
        };

        let user = User {
            username: username.to_string(),
        };
        if let Err(e) = self.store.save_session(&pair, &user) {
            let err = AuthError::Storage(e.to_string());
            warn!(error = %e, "Failed to persist credentials");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear partial credentials");
            }
            self.state.send_replace(Session {
                last_error: Some(err.to_string()),
                ..Session::default()
            });
            return Err(err);
        }

        let session = Session::authenticated(user);
        self.state.send_replace(session.clone());
        info!(username = username, "Login successful");
        Ok(session)
    }

    async fn request_tokens(&self, username: &str, password: &str) -> Result<CredentialPair, AuthError> {
        let request = HttpRequest::new(Method::POST, join_url(&self.api_url, TOKEN_PATH))
            .json(json!({ "username": username, "password": password }))
            .timeout(Duration::from_secs(LOGIN_TIMEOUT_SECS));

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(error = %e, "Network error during login");
            match e {
                TransportError::Unreachable(_) => AuthError::NetworkUnreachable,
                other => AuthError::Unexpected(other.to_string()),
            }
        })?;

        if !response.is_success() {
            return Err(AuthError::from_status(response.status));
        }

        let tokens: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| AuthError::Unexpected(format!("malformed token response: {}", e)))?;
        Ok(CredentialPair {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
        })
    }

    /// Clear stored credentials and sign out. Safe to call repeatedly.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        let changed = self.state.send_if_modified(|s| {
            if *s == Session::default() {
                false
            } else {
                *s = Session::default();
                true
            }
        });
        if changed {
            info!("Signed out");
        }
    }

    /// Sign out because the refresh token was rejected.
    ///
    /// Clears stored credentials and leaves the session `RefreshFailed`.
    /// Returns false if the session had already expired, so only the first
    /// of several failing requests redirects.
    pub fn expire(&self) -> bool {
        let store = &self.store;
        let changed = self.state.send_if_modified(|s| {
            if s.status == SessionStatus::RefreshFailed {
                return false;
            }
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
            *s = Session {
                user: None,
                status: SessionStatus::RefreshFailed,
                last_error: Some(SESSION_EXPIRED_MESSAGE.to_string()),
            };
            true
        });
        if changed {
            info!("Session expired, signed out");
        }
        changed
    }

    // ===== Refresh =====

    /// Mint a new access token from the stored refresh token.
    ///
    /// Concurrent callers share one in-flight request. Session state is not
    /// touched here: on failure the caller decides whether to sign out.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let (id, shared) = {
            let mut slot = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
            let existing = slot
                .inflight
                .as_ref()
                .map(|(id, inflight)| (*id, inflight.clone()));
            match existing {
                Some(joined) => {
                    debug!("Joining in-flight token refresh");
                    joined
                }
                None => {
                    let id = slot.next_id;
                    slot.next_id += 1;
                    let inflight = refresh_access_token(
                        Arc::clone(&self.transport),
                        Arc::clone(&self.store),
                        join_url(&self.api_url, TOKEN_REFRESH_PATH),
                    )
                    .boxed()
                    .shared();
                    slot.inflight = Some((id, inflight.clone()));
                    (id, inflight)
                }
            }
        };

        let result = shared.await;

        let mut slot = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.inflight, Some((current, _)) if current == id) {
            slot.inflight = None;
        }
        result
    }
}

async fn refresh_access_token(
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    url: String,
) -> Result<String, RefreshError> {
    let refresh_token = store
        .get(REFRESH_TOKEN_KEY)
        .map_err(|e| RefreshError::Storage(e.to_string()))?
        .ok_or(RefreshError::NoRefreshToken)?;

    let request = HttpRequest::new(Method::POST, url).json(json!({ "refresh": refresh_token }));
    let response = transport.send(request).await.map_err(|e| {
        warn!(error = %e, "Network error during token refresh");
        match e {
            TransportError::Unreachable(msg) => RefreshError::NetworkUnreachable(msg),
            other => RefreshError::InvalidResponse(other.to_string()),
        }
    })?;

    if !response.is_success() {
        warn!(status = response.status.as_u16(), "Token refresh rejected");
        return Err(RefreshError::RefreshRejected {
            status: response.status.as_u16(),
        });
    }

    let body: RefreshResponse = serde_json::from_str(&response.body)
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    // A logout or a new login may have landed while the request was out.
    let written = store
        .replace_access_token(&refresh_token, &body.access)
        .map_err(|e| RefreshError::Storage(e.to_string()))?;
    if !written {
        debug!("Credentials changed during refresh, discarding new token");
        return match store.load_pair() {
            Ok(Some(pair)) => Ok(pair.access_token),
            Ok(None) => Err(RefreshError::NoRefreshToken),
            Err(e) => Err(RefreshError::Storage(e.to_string())),
        };
    }

    debug!("Access token refreshed");
    Ok(body.access)
}
