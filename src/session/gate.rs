use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use super::controller::{SessionSnapshot, SessionStatus};
use crate::error::{SessionError, SessionResult};
use crate::models::InterestForm;
use crate::profile::ProfileService;

/// Profile setup state for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSetup {
    Unknown,
    Checking,
    Complete,
    Incomplete,
}

/// Where a navigation to a protected screen should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Not authenticated: go to sign-in
    SignIn,
    /// Authenticated but the one-time setup form is pending
    Setup,
    Allow,
}

struct GateCache {
    epoch: u64,
    setup: ProfileSetup,
}

fn decision_for(setup: ProfileSetup) -> GateDecision {
    match setup {
        ProfileSetup::Incomplete => GateDecision::Setup,
        _ => GateDecision::Allow,
    }
}

/// Decides whether protected screens are reachable.
///
/// The backend is asked at most once per session; the answer is cached against
/// the session epoch. A failing check fails open (treated as complete).
pub struct ProfileGate {
    profile: Arc<ProfileService>,
    session: watch::Receiver<SessionSnapshot>,
    /// Never held across an await.
    cache: Mutex<GateCache>,
    /// Serializes backend checks so concurrent callers share one answer.
    check: AsyncMutex<()>,
}

impl ProfileGate {
    pub fn new(profile: Arc<ProfileService>, session: watch::Receiver<SessionSnapshot>) -> Self {
        ProfileGate {
            profile,
            session,
            cache: Mutex::new(GateCache {
                epoch: 0,
                setup: ProfileSetup::Unknown,
            }),
            check: AsyncMutex::new(()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, GateCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current setup state without triggering a check.
    pub fn setup_status(&self) -> ProfileSetup {
        let epoch = self.session.borrow().epoch;
        let cache = self.cache();
        if cache.epoch == epoch {
            cache.setup
        } else {
            ProfileSetup::Unknown
        }
    }

    pub async fn decide(&self) -> GateDecision {
        let snapshot = *self.session.borrow();
        if snapshot.status != SessionStatus::Authenticated {
            return GateDecision::SignIn;
        }

        let _check = self.check.lock().await;
        {
            let mut cache = self.cache();
            if cache.epoch != snapshot.epoch {
                cache.epoch = snapshot.epoch;
                cache.setup = ProfileSetup::Unknown;
            }
            match cache.setup {
                ProfileSetup::Complete | ProfileSetup::Incomplete => {
                    return decision_for(cache.setup)
                }
                // Checking here means an earlier check was cancelled.
                ProfileSetup::Unknown | ProfileSetup::Checking => {
                    cache.setup = ProfileSetup::Checking
                }
            }
        }

        let answer = self.query().await;

        let mut cache = self.cache();
        let same_session = cache.epoch == snapshot.epoch;
        match answer {
            Some(setup) => {
                // mark_complete may have settled it while the check ran.
                if same_session && cache.setup == ProfileSetup::Checking {
                    cache.setup = setup;
                }
                decision_for(if same_session { cache.setup } else { setup })
            }
            None => {
                if same_session {
                    cache.setup = ProfileSetup::Unknown;
                }
                GateDecision::SignIn
            }
        }
    }

    /// Asks the backend. `None` means the session ended during the check.
    async fn query(&self) -> Option<ProfileSetup> {
        match self.profile.check_first_login().await {
            Ok(true) => Some(ProfileSetup::Complete),
            Ok(false) => {
                info!(
                    event_name = "gate.setup.required",
                    event_domain = "gate",
                    "Profile setup has not been completed"
                );
                Some(ProfileSetup::Incomplete)
            }
            Err(SessionError::AuthenticationExpired(cause)) => {
                debug!("Session expired during profile check: {}", cause);
                None
            }
            Err(e) => {
                warn!(
                    event_name = "gate.check.failed",
                    event_domain = "gate",
                    "Profile check failed, allowing access: {}",
                    e
                );
                Some(ProfileSetup::Complete)
            }
        }
    }

    /// Records a completed setup for the current session without asking the backend.
    pub fn mark_complete(&self) {
        let epoch = self.session.borrow().epoch;
        let mut cache = self.cache();
        cache.epoch = epoch;
        cache.setup = ProfileSetup::Complete;
    }

    /// Submits the setup form and, on success, marks setup complete locally.
    pub async fn submit_setup(&self, form: &InterestForm) -> SessionResult<()> {
        self.profile.submit(form).await?;
        self.mark_complete();
        info!(
            event_name = "gate.setup.completed",
            event_domain = "gate",
            "Profile setup submitted"
        );
        Ok(())
    }
}
