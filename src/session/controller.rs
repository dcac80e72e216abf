use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::auth::TokenService;
use crate::error::{RefreshFailure, SessionError, SessionResult};
use crate::models::{Credentials, TokenPair};
use crate::pipeline::ExpiryHandler;

/// Where the application stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    LoggingOut,
}

/// The value published to observers on every transition.
///
/// `epoch` is bumped each time a new authenticated session begins, so caches
/// can be scoped to a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub epoch: u64,
}

#[derive(Clone, Copy)]
enum AuthCall {
    Login,
    Register,
}

impl AuthCall {
    fn event(self) -> &'static str {
        match self {
            AuthCall::Login => "login",
            AuthCall::Register => "register",
        }
    }
}

/// The user-facing session state machine.
///
/// Transitions:
/// - `Unauthenticated` → `Authenticating` on login/register
/// - `Authenticating` → `Authenticated` / `Unauthenticated` on the backend answer
/// - any → `LoggingOut` → `Unauthenticated` on logout
/// - `Authenticated` → `LoggingOut` → `Unauthenticated` on expired authentication
///
/// A login that completes after a logout began does not sign the user in.
pub struct SessionController {
    token_service: Arc<TokenService>,
    snapshot: watch::Sender<SessionSnapshot>,
    auto_login: Option<Credentials>,
}

impl SessionController {
    /// `auto_login` enables the fixed-credential fallback used by `restore`.
    pub fn new(token_service: Arc<TokenService>, auto_login: Option<Credentials>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        SessionController {
            token_service,
            snapshot,
            auto_login,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot.borrow().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Observers (routing layer, profile gate) watch this for transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.token_service
    }

    pub async fn login(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        self.authenticate(AuthCall::Login, credentials).await
    }

    /// Registration hands back a token pair as well, so it also starts a session.
    pub async fn register(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        self.authenticate(AuthCall::Register, credentials).await
    }

    async fn authenticate(
        &self,
        call: AuthCall,
        credentials: &Credentials,
    ) -> SessionResult<TokenPair> {
        self.begin_authenticating(call.event())?;

        let result = match call {
            AuthCall::Login => self.token_service.login(credentials).await,
            AuthCall::Register => self.token_service.register(credentials).await,
        };

        match result {
            Ok(pair) => {
                if !self.enter_authenticated() {
                    warn!(
                        event_name = "session.authentication.superseded",
                        event_domain = "session",
                        operation = call.event(),
                        "Session was ended while authenticating; not signing in"
                    );
                    return Err(SessionError::SessionEnded);
                }
                info!(
                    event_name = "session.authenticated",
                    event_domain = "session",
                    operation = call.event(),
                    epoch = self.snapshot().epoch,
                    "Session authenticated as '{}'",
                    credentials.username
                );
                Ok(pair)
            }
            Err(e) => {
                self.transition(SessionStatus::Authenticating, SessionStatus::Unauthenticated);
                warn!(
                    event_name = "session.authentication.failed",
                    event_domain = "session",
                    operation = call.event(),
                    "Authentication failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Ends the session: clears the stored pair and notifies observers.
    ///
    /// The controller settles on `Unauthenticated` even when clearing the store
    /// fails; that failure is still returned.
    pub async fn logout(&self) -> SessionResult<()> {
        self.set_status(SessionStatus::LoggingOut);
        self.end_session("logout").await
    }

    /// Clears the stored pair and settles on `Unauthenticated`. The caller has
    /// already moved the controller to `LoggingOut`.
    async fn end_session(&self, reason: &'static str) -> SessionResult<()> {
        let cleared = self.token_service.logout().await;
        self.set_status(SessionStatus::Unauthenticated);

        match &cleared {
            Ok(()) => info!(
                event_name = "session.ended",
                event_domain = "session",
                reason,
                "Session ended"
            ),
            Err(e) => error!(
                event_name = "session.ended",
                event_domain = "session",
                reason,
                "Session ended but stored tokens could not be cleared: {}",
                e
            ),
        }
        cleared
    }

    /// Restores a session at process start.
    ///
    /// A stored access token is never trusted as-is: it is validated with a
    /// refresh. Without a valid stored session the configured auto-login
    /// credentials are tried, if any.
    pub async fn restore(&self) -> SessionStatus {
        if self.status() != SessionStatus::Unauthenticated {
            debug!("Restore skipped; session is {:?}", self.status());
            return self.status();
        }

        match self.token_service.vault().access_token().await {
            Ok(Some(_)) => {
                if self.validate_stored_session().await {
                    return SessionStatus::Authenticated;
                }
            }
            Ok(None) => debug!("No stored session to restore"),
            Err(e) => warn!("Could not read stored session: {}", e),
        }

        if let Some(credentials) = &self.auto_login {
            info!(
                "Falling back to auto-login as '{}'",
                credentials.username
            );
            if let Err(e) = self.login(credentials).await {
                warn!("Auto-login failed: {}", e);
            }
        }

        self.status()
    }

    async fn validate_stored_session(&self) -> bool {
        if !self.transition(SessionStatus::Unauthenticated, SessionStatus::Authenticating) {
            return false;
        }
        match self.token_service.refresh().await {
            Ok(_) => {
                if !self.enter_authenticated() {
                    debug!("Session ended while the stored session was being validated");
                    return false;
                }
                info!(
                    event_name = "session.restored",
                    event_domain = "session",
                    "Stored session validated"
                );
                true
            }
            Err(e) => {
                warn!("Stored session could not be validated: {}", e);
                if let Err(e) = self.token_service.logout().await {
                    warn!("Failed to discard stale tokens: {}", e);
                }
                self.transition(SessionStatus::Authenticating, SessionStatus::Unauthenticated);
                false
            }
        }
    }

    fn begin_authenticating(&self, event: &'static str) -> SessionResult<()> {
        let mut rejected_from = None;
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.status == SessionStatus::Unauthenticated {
                snapshot.status = SessionStatus::Authenticating;
                true
            } else {
                rejected_from = Some(snapshot.status);
                false
            }
        });

        match rejected_from {
            Some(from) => Err(SessionError::InvalidTransition { from, event }),
            None => Ok(()),
        }
    }

    /// Completes a login, register or restore. Refused when a logout moved the
    /// controller away from `Authenticating` in the meantime.
    fn enter_authenticated(&self) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.status != SessionStatus::Authenticating {
                return false;
            }
            snapshot.status = SessionStatus::Authenticated;
            snapshot.epoch += 1;
            true
        })
    }

    /// Moves from `from` to `to`; does nothing in any other state.
    fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.status != from {
                return false;
            }
            snapshot.status = to;
            true
        })
    }

    fn set_status(&self, status: SessionStatus) {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.status == status {
                false
            } else {
                snapshot.status = status;
                true
            }
        });
    }
}

#[async_trait]
impl ExpiryHandler for SessionController {
    async fn on_authentication_expired(&self, cause: &RefreshFailure) {
        if !self.transition(SessionStatus::Authenticated, SessionStatus::LoggingOut) {
            debug!(
                "Ignoring expired authentication ({}) while session is {:?}",
                cause,
                self.status()
            );
            return;
        }
        warn!(
            event_name = "session.expired",
            event_domain = "session",
            "Authentication expired ({}); logging out",
            cause
        );
        // end_session already logs the storage failure.
        let _ = self.end_session("authentication-expired").await;
    }
}
