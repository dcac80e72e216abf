//! Single-flight token refresh.
//!
//! Any number of requests can fail with 401 around the same time; the first one
//! starts a refresh and every later one queues behind it. The refresh runs on
//! its own task, so a caller that stops waiting cannot leave the queue stuck.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::TokenService;
use crate::error::RefreshFailure;
use crate::utils::log_throttle::should_emit;

const QUEUED_LOG_WINDOW: Duration = Duration::from_secs(10);

/// What every waiter of one refresh observes.
pub type RefreshOutcome = Result<(), RefreshFailure>;

/// Told once per failed refresh, before any waiter is rejected.
#[async_trait]
pub trait ExpiryHandler: Send + Sync {
    async fn on_authentication_expired(&self, cause: &RefreshFailure);
}

/// A request suspended until the in-flight refresh settles.
struct PendingRequest {
    request_id: Uuid,
    notify: oneshot::Sender<RefreshOutcome>,
}

#[derive(Default)]
struct RefreshState {
    in_flight: Option<JoinHandle<()>>,
    pending: VecDeque<PendingRequest>,
}

struct CoordinatorInner {
    token_service: Arc<TokenService>,
    expiry: Arc<dyn ExpiryHandler>,
    state: Mutex<RefreshState>,
    refreshes_started: AtomicU64,
}

/// Owns the in-flight refresh handle and the queue of requests waiting on it.
///
/// State lives on the instance, so independent sessions never share a refresh.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    pub fn new(token_service: Arc<TokenService>, expiry: Arc<dyn ExpiryHandler>) -> Self {
        RefreshCoordinator {
            inner: Arc::new(CoordinatorInner {
                token_service,
                expiry,
                state: Mutex::new(RefreshState::default()),
                refreshes_started: AtomicU64::new(0),
            }),
        }
    }

    /// Number of refresh calls started by this coordinator.
    pub fn refreshes_started(&self) -> u64 {
        self.inner.refreshes_started.load(Ordering::SeqCst)
    }

    pub async fn is_refreshing(&self) -> bool {
        self.inner.state.lock().await.in_flight.is_some()
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Waits until a credential newer than `stale_token` is stored.
    ///
    /// Joins the in-flight refresh if there is one. Otherwise, if the stored
    /// access token already differs from `stale_token`, returns immediately;
    /// if not, starts a refresh and waits for it.
    pub async fn await_fresh_token(
        &self,
        request_id: Uuid,
        stale_token: Option<&str>,
    ) -> RefreshOutcome {
        let receiver = {
            let mut state = self.inner.state.lock().await;

            if state.in_flight.is_none() && self.superseded(stale_token).await {
                debug!(
                    request_id = %request_id,
                    "Credential already replaced by an earlier refresh; replaying"
                );
                return Ok(());
            }

            let (notify, receiver) = oneshot::channel();
            state.pending.push_back(PendingRequest { request_id, notify });

            if state.in_flight.is_none() {
                self.inner.refreshes_started.fetch_add(1, Ordering::SeqCst);
                info!(
                    event_name = "pipeline.refresh.started",
                    event_domain = "pipeline",
                    request_id = %request_id,
                    "Access token rejected; starting token refresh"
                );
                state.in_flight = Some(tokio::spawn(run_refresh(self.inner.clone())));
            } else if let Some(suppressed_count) =
                should_emit("pipeline.refresh.queued", QUEUED_LOG_WINDOW)
            {
                debug!(
                    event_name = "pipeline.refresh.queued",
                    event_domain = "pipeline",
                    request_id = %request_id,
                    queue_len = state.pending.len(),
                    suppressed_count,
                    "Request queued behind in-flight refresh"
                );
            }

            receiver
        };

        receiver.await.unwrap_or(Err(RefreshFailure::Abandoned))
    }

    async fn superseded(&self, stale_token: Option<&str>) -> bool {
        match self.inner.token_service.vault().access_token().await {
            Ok(Some(current)) => Some(current.as_str()) != stale_token,
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read access token before refresh: {}", e);
                false
            }
        }
    }
}

/// Body of the refresh task: refresh, report expiry, then drain the queue in
/// FIFO order. The queue is drained only after the new pair is stored.
async fn run_refresh(inner: Arc<CoordinatorInner>) {
    let outcome = match inner.token_service.refresh().await {
        Ok(_) => {
            info!(
                event_name = "pipeline.refresh.succeeded",
                event_domain = "pipeline",
                "Token refresh succeeded"
            );
            Ok(())
        }
        Err(err) => {
            let failure = RefreshFailure::from(&err);
            warn!(
                event_name = "pipeline.refresh.failed",
                event_domain = "pipeline",
                "Token refresh failed, ending session: {}",
                failure
            );
            inner.expiry.on_authentication_expired(&failure).await;
            Err(failure)
        }
    };

    let pending = {
        let mut state = inner.state.lock().await;
        state.in_flight = None;
        std::mem::take(&mut state.pending)
    };

    debug!("Releasing {} request(s) queued on refresh", pending.len());
    for waiter in pending {
        if waiter.notify.send(outcome.clone()).is_err() {
            debug!(
                request_id = %waiter.request_id,
                "Waiter went away before the refresh settled"
            );
        }
    }
}
