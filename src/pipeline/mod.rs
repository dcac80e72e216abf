pub mod client;
pub mod coordinator;

pub use client::ApiClient;
pub use coordinator::{ExpiryHandler, RefreshCoordinator, RefreshOutcome};
