//! Application startup.
//!
//! Builds the credential store and application state from configuration,
//! restores any previous session and evaluates the profile gate once.

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigV1;
use crate::session::GateDecision;
use crate::state::AppState;
use crate::store::create_store;

/// Builds the application state described by `config`.
///
/// # Errors
///
/// Returns an error if the credential store cannot be opened or the HTTP
/// client cannot be constructed.
pub async fn build_state(config: &ConfigV1) -> Result<AppState, Box<dyn std::error::Error>> {
    let store = create_store(&config.store).await?;
    let state = AppState::new(&config.api, store, config.session.auto_login.clone())?;
    Ok(state)
}

/// Initializes the session core and reports where the user would land.
pub async fn run(config: Arc<ConfigV1>) -> Result<GateDecision, Box<dyn std::error::Error>> {
    info!("Using backend at {}", config.api.base_url);
    let state = build_state(&config).await?;

    let status = state.session.restore().await;
    info!("Session status after restore: {:?}", status);

    let decision = state.gate.decide().await;
    info!(
        event_name = "startup.gate.decided",
        event_domain = "startup",
        "Initial route decision: {:?}",
        decision
    );
    Ok(decision)
}
