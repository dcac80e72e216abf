use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::coordinator::{ExpiryHandler, RefreshCoordinator};
use crate::auth::TokenService;
use crate::error::{SessionError, SessionResult};
use crate::store::TokenVault;
use crate::transport::{ApiRequest, ApiResponse, Attempt, Transport};

/// The authenticated HTTP client every feature screen talks through.
///
/// Outbound, it attaches the stored access token when there is one. Inbound, a
/// 401 on a first attempt waits for a coordinated refresh and replays the
/// request once; anything else is handed back as-is.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    vault: TokenVault,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        token_service: Arc<TokenService>,
        expiry: Arc<dyn ExpiryHandler>,
    ) -> Self {
        let vault = token_service.vault().clone();
        ApiClient {
            transport,
            vault,
            coordinator: RefreshCoordinator::new(token_service, expiry),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Sends `request`, recovering from a single stale-token 401.
    ///
    /// # Errors
    ///
    /// - `AuthenticationExpired` when the refresh itself failed (the session
    ///   has already been logged out by then).
    /// - `RequestFailed` for any other non-2xx status, including a 401 on the
    ///   replay.
    /// - `Transport` when no response was received.
    pub async fn execute(&self, request: ApiRequest) -> SessionResult<ApiResponse> {
        let mut attempt = Attempt::first(&request);

        loop {
            let (bearer, response) = self.deliver(attempt).await?;

            if response.status != StatusCode::UNAUTHORIZED {
                return response.error_for_status();
            }

            if attempt.is_retry() {
                warn!(
                    event_name = "pipeline.replay.rejected",
                    event_domain = "pipeline",
                    request_id = %request.id,
                    path = request.path.as_str(),
                    "Request rejected again after refresh; not retrying"
                );
                return response.error_for_status();
            }

            debug!(
                request_id = %request.id,
                path = request.path.as_str(),
                "Received 401, waiting for fresh credentials"
            );
            self.coordinator
                .await_fresh_token(request.id, bearer.as_deref())
                .await
                .map_err(SessionError::AuthenticationExpired)?;

            attempt = attempt.retry();
        }
    }

    /// Reads the current token and performs one delivery.
    async fn deliver(
        &self,
        attempt: Attempt<'_>,
    ) -> SessionResult<(Option<String>, ApiResponse)> {
        let bearer = self.vault.access_token().await?;
        let request = attempt.request();
        debug!(
            request_id = %request.id,
            attempt = attempt.number(),
            method = %request.method,
            path = request.path.as_str(),
            authenticated = bearer.is_some(),
            "Dispatching request"
        );
        let response = self.transport.send(request, bearer.as_deref()).await?;
        Ok((bearer, response))
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> SessionResult<T> {
        self.execute(request).await?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).with_json(body)?).await
    }
}
