use serde::{Deserialize, Serialize};

/// Storage keys under which the two halves of a `TokenPair` are persisted.
pub struct TokenKeys;

impl TokenKeys {
    pub const ACCESS: &'static str = "accessToken";
    pub const REFRESH: &'static str = "refreshToken";
    pub const ALL: [&'static str; 2] = [Self::ACCESS, Self::REFRESH];
}

/// An access/refresh token pair as issued by the backend.
///
/// Both tokens are opaque bearer strings; the client never inspects them.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        TokenPair {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
