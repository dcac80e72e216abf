#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode};
use sessiongate::config::ApiConfig;
use sessiongate::error::TransportError;
use sessiongate::models::{Credentials, TokenKeys, TokenPair};
use sessiongate::state::AppState;
use sessiongate::store::{CredentialStore, MemoryStore};
use sessiongate::transport::{ApiRequest, ApiResponse, Transport};
use tokio::sync::Notify;

pub fn credentials() -> Credentials {
    Credentials::new("cook@example.com", "secret")
}

/// State over a real reqwest transport pointed at `base_url`, with an
/// in-memory credential store.
pub fn build_state(base_url: String) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        &ApiConfig {
            base_url,
            timeout_in_ms: Some(5_000),
        },
        store.clone(),
        None,
    )
    .unwrap();
    (state, store)
}

pub fn build_fake_state(backend: Arc<FakeBackend>) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_transport(backend, store.clone(), None);
    (state, store)
}

pub async fn stored_pair(store: &MemoryStore) -> (Option<String>, Option<String>) {
    (
        store.get(TokenKeys::ACCESS).await.unwrap(),
        store.get(TokenKeys::REFRESH).await.unwrap(),
    )
}

pub fn pair_body(access: &str, refresh: &str) -> String {
    serde_json::to_string(&TokenPair::new(access, refresh)).unwrap()
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Which kind of call a `FakeBackend` holds until `release`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Nothing,
    Login,
    Refresh,
    /// Everything outside `/auth/*`
    Resources,
}

/// In-process backend for concurrency tests.
///
/// Accepts exactly one access token at a time. `/auth/login` issues
/// `A0`/`R0`; each successful `/auth/refresh-token` issues the next
/// generation. Other paths answer `true` to the valid token and 401 otherwise.
/// Calls of the held kind block until `release`.
pub struct FakeBackend {
    valid_token: Mutex<Option<String>>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    requests: AtomicUsize,
    refresh_status: StatusCode,
    hold: Hold,
    gate: Notify,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::build(StatusCode::OK, Hold::Nothing)
    }

    /// Refresh calls wait for `release` before answering.
    pub fn gated() -> Self {
        Self::holding(Hold::Refresh)
    }

    pub fn holding(hold: Hold) -> Self {
        Self::build(StatusCode::OK, hold)
    }

    /// Refresh calls answer with `status` and no pair.
    pub fn rejecting_refresh(status: StatusCode) -> Self {
        Self::build(status, Hold::Nothing)
    }

    fn build(refresh_status: StatusCode, hold: Hold) -> Self {
        FakeBackend {
            valid_token: Mutex::new(None),
            generation: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            refresh_status,
            hold,
            gate: Notify::new(),
        }
    }

    async fn wait_if_held(&self, kind: Hold) {
        if self.hold == kind {
            self.gate.notified().await;
        }
    }

    /// Invalidates the current access token without issuing a new one.
    pub fn expire_access_token(&self) {
        *self.valid_token.lock().unwrap() = None;
    }

    /// Lets one held call through.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Calls to endpoints other than `/auth/*`.
    pub fn resource_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn issue(&self, generation: usize) -> ApiResponse {
        let access = format!("A{}", generation);
        let refresh = format!("R{}", generation);
        *self.valid_token.lock().unwrap() = Some(access.clone());
        ApiResponse::new(StatusCode::OK, pair_body(&access, &refresh))
    }

    async fn refresh(&self) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held(Hold::Refresh).await;
        if self.refresh_status != StatusCode::OK {
            return ApiResponse::new(self.refresh_status, "invalid refresh token");
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.issue(generation)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        match (&request.method, request.path.as_str()) {
            (&Method::POST, "/auth/login") => {
                self.wait_if_held(Hold::Login).await;
                self.generation.store(0, Ordering::SeqCst);
                Ok(self.issue(0))
            }
            (&Method::POST, "/auth/refresh-token") => Ok(self.refresh().await),
            _ => {
                self.requests.fetch_add(1, Ordering::SeqCst);
                self.wait_if_held(Hold::Resources).await;
                let valid = self.valid_token.lock().unwrap().clone();
                match (bearer, valid) {
                    (Some(sent), Some(valid)) if sent == valid => {
                        Ok(ApiResponse::new(StatusCode::OK, "true"))
                    }
                    _ => Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "")),
                }
            }
        }
    }
}
