pub mod base;
pub mod reqwest_transport;

pub use base::{ApiRequest, ApiResponse, Attempt, Transport};
pub use reqwest_transport::ReqwestTransport;
