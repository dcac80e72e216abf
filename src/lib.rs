//! Library exports for sessiongate, shared between the binary and tests.
//!
//! Client-side session core: token persistence, bearer injection, single-flight
//! refresh with one replay per request, the session state machine and the
//! profile-completion gate.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod transport;
pub mod utils;
