//! Shared application state.
//!
//! Wires the credential store, token service, request pipeline, session
//! controller and profile gate together. Every component is owned by this
//! value, so two `AppState`s never share a session or a refresh.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::ApiConfig;
use crate::error::TransportError;
use crate::models::Credentials;
use crate::pipeline::{ApiClient, ExpiryHandler};
use crate::profile::ProfileService;
use crate::session::{ProfileGate, SessionController};
use crate::store::{CredentialStore, TokenVault};
use crate::transport::{ReqwestTransport, Transport};

/// Everything a client front-end needs to talk to the backend.
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
    pub session: Arc<SessionController>,
    /// Authenticated client for every feature endpoint.
    pub client: Arc<ApiClient>,
    pub profile: Arc<ProfileService>,
    pub gate: Arc<ProfileGate>,
}

impl AppState {
    /// Builds the state over a reqwest transport for `api`.
    pub fn new(
        api: &ApiConfig,
        store: Arc<dyn CredentialStore>,
        auto_login: Option<Credentials>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(api)?);
        Ok(Self::with_transport(transport, store, auto_login))
    }

    /// Builds the state over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        auto_login: Option<Credentials>,
    ) -> Self {
        let token_service = Arc::new(TokenService::new(
            transport.clone(),
            TokenVault::new(store),
        ));
        let session = Arc::new(SessionController::new(token_service.clone(), auto_login));
        let client = Arc::new(ApiClient::new(
            transport,
            token_service.clone(),
            session.clone() as Arc<dyn ExpiryHandler>,
        ));
        let profile = Arc::new(ProfileService::new(client.clone()));
        let gate = Arc::new(ProfileGate::new(profile.clone(), session.subscribe()));

        AppState {
            token_service,
            session,
            client,
            profile,
            gate,
        }
    }
}
