pub mod credentials;
pub mod interest_form;
pub mod token;

pub use credentials::Credentials;
pub use interest_form::InterestForm;
pub use token::{TokenKeys, TokenPair};
