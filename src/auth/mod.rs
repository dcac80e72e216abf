pub mod token_service;

// Re-export so we can do "use crate::auth::TokenService;"
pub use token_service::TokenService;
