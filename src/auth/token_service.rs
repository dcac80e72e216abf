use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::models::credentials::{
    EmailRequest, RefreshRequest, ResetPasswordRequest, VerifyCodeRequest,
};
use crate::models::{Credentials, TokenPair};
use crate::store::TokenVault;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Wraps the backend's `/auth/*` endpoints.
///
/// Calls go straight to the transport: no bearer header, no refresh-and-retry.
/// Every call that yields a token pair stores it before returning, so a caller
/// holding the returned pair can rely on the vault already containing it.
pub struct TokenService {
    transport: Arc<dyn Transport>,
    vault: TokenVault,
}

impl TokenService {
    pub fn new(transport: Arc<dyn Transport>, vault: TokenVault) -> Self {
        TokenService { transport, vault }
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    async fn call(&self, request: ApiRequest) -> SessionResult<ApiResponse> {
        let response = self.transport.send(&request, None).await?;
        if !response.is_success() {
            warn!(
                event_name = "auth.call.failed",
                event_domain = "auth",
                request_id = %request.id,
                path = request.path.as_str(),
                status = response.status.as_u16(),
                "Auth endpoint returned an error"
            );
        }
        response.error_for_status()
    }

    /// Performs a call whose success body is a token pair, then persists it.
    ///
    /// `generation` is the vault generation read before the call was made. If
    /// the pair was cleared or replaced meanwhile, the new pair is dropped and
    /// `SessionEnded` is returned.
    async fn issue_pair(
        &self,
        request: ApiRequest,
        operation: &str,
        generation: u64,
    ) -> SessionResult<TokenPair> {
        let response = self.call(request).await?;
        let pair: TokenPair = response.json()?;
        if !self.vault.write_pair_if(&pair, generation).await? {
            warn!(
                event_name = "auth.tokens.discarded",
                event_domain = "auth",
                operation,
                "Session ended during the call; discarding the new token pair"
            );
            return Err(SessionError::SessionEnded);
        }
        info!(
            event_name = "auth.tokens.issued",
            event_domain = "auth",
            operation,
            "Token pair received and stored"
        );
        Ok(pair)
    }

    pub async fn login(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        debug!("Logging in as '{}'", credentials.username);
        let generation = self.vault.generation().await;
        let request = ApiRequest::post("/auth/login").with_json(credentials)?;
        self.issue_pair(request, "login", generation).await
    }

    pub async fn register(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        debug!("Registering '{}'", credentials.username);
        let generation = self.vault.generation().await;
        let request = ApiRequest::post("/auth/register").with_json(credentials)?;
        self.issue_pair(request, "register", generation).await
    }

    /// Exchanges the stored refresh token for a new pair.
    ///
    /// Fails with `NoRefreshToken` without touching the network when nothing
    /// is stored, and with `SessionEnded` when the pair is cleared before the
    /// answer arrives.
    pub async fn refresh(&self) -> SessionResult<TokenPair> {
        let generation = self.vault.generation().await;
        let refresh_token = match self.vault.refresh_token().await? {
            Some(token) => token,
            None => {
                debug!("No refresh token stored; skipping refresh call");
                return Err(SessionError::NoRefreshToken);
            }
        };

        let request = ApiRequest::post("/auth/refresh-token").with_json(&RefreshRequest {
            refresh_token: &refresh_token,
        })?;
        self.issue_pair(request, "refresh", generation).await
    }

    /// Asks the backend to email a verification code. Returns the backend's message.
    pub async fn send_verification_code(&self, email: &str) -> SessionResult<String> {
        let request =
            ApiRequest::post("/auth/send-verification-code").with_json(&EmailRequest { email })?;
        Ok(self.call(request).await?.text())
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> SessionResult<bool> {
        let request =
            ApiRequest::post("/auth/verify-code").with_json(&VerifyCodeRequest { email, code })?;
        self.call(request).await?.json()
    }

    /// Whether an account is already registered for `email`.
    pub async fn exists(&self, email: &str) -> SessionResult<bool> {
        let request = ApiRequest::get("/auth/exists").with_query("email", email);
        self.call(request).await?.json()
    }

    pub async fn forgot_password(&self, email: &str) -> SessionResult<String> {
        let request =
            ApiRequest::post("/auth/forgot-password").with_json(&EmailRequest { email })?;
        Ok(self.call(request).await?.text())
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> SessionResult<String> {
        let request = ApiRequest::post("/auth/reset-password").with_json(&ResetPasswordRequest {
            email,
            new_password,
        })?;
        Ok(self.call(request).await?.text())
    }

    /// Removes the stored pair.
    pub async fn logout(&self) -> SessionResult<()> {
        self.vault.clear_pair().await?;
        Ok(())
    }
}
