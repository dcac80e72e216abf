//! Error types shared by every layer of the session core.

use http::StatusCode;
use thiserror::Error;

use crate::session::SessionStatus;

/// Failure of the persistence layer behind a `CredentialStore`.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error while reading or writing the backing document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing document exists but is not a valid key/value map
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Network-level failure: no HTTP response was obtained at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// Why a coordinated refresh did not produce a new token pair.
///
/// Cloned once per queued waiter, so it only carries owned, cheap data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("refresh rejected with status {status}")]
    Rejected { status: StatusCode, body: String },

    #[error("refresh could not reach the backend: {0}")]
    Transport(String),

    #[error("refresh response could not be stored: {0}")]
    Storage(String),

    #[error("refresh response was malformed: {0}")]
    Decode(String),

    #[error("session ended while the refresh was in flight")]
    SessionEnded,

    #[error("refresh task ended without reporting an outcome")]
    Abandoned,
}

impl From<&SessionError> for RefreshFailure {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::NoRefreshToken => RefreshFailure::NoRefreshToken,
            SessionError::RequestFailed { status, body } => RefreshFailure::Rejected {
                status: *status,
                body: body.clone(),
            },
            SessionError::Transport(e) => RefreshFailure::Transport(e.0.clone()),
            SessionError::Storage(e) => RefreshFailure::Storage(e.to_string()),
            SessionError::Decode(msg) => RefreshFailure::Decode(msg.clone()),
            SessionError::AuthenticationExpired(cause) => cause.clone(),
            SessionError::SessionEnded => RefreshFailure::SessionEnded,
            SessionError::InvalidTransition { .. } => RefreshFailure::Abandoned,
        }
    }
}

/// Error type for every public session operation.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Refresh attempted with nothing in the credential store
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh call failed; the session has been logged out
    #[error("Authentication expired: {0}")]
    AuthenticationExpired(RefreshFailure),

    /// Backend answered with a non-success status; body is passed through as-is
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: StatusCode, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// The session was ended (logout or expiry) before the new token pair
    /// could be stored; the pair was discarded
    #[error("Session ended before the token pair could be stored")]
    SessionEnded,

    /// The session state machine does not accept this event in its current state
    #[error("Cannot {event} while session is {from:?}")]
    InvalidTransition {
        from: SessionStatus,
        event: &'static str,
    },
}

impl SessionError {
    /// HTTP status reported by the backend, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SessionError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
