use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult, TransportError};

/// An outbound request, relative to the configured API base URL.
///
/// The descriptor is never mutated once handed to the pipeline; retries are
/// tracked by `Attempt`, not by flags on the request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Correlates every log line of one logical call, replays included
    pub id: Uuid,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches a JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> SessionResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SessionError::Decode(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// One delivery of an `ApiRequest`. The attempt number is fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    request: &'a ApiRequest,
    number: u8,
}

impl<'a> Attempt<'a> {
    pub fn first(request: &'a ApiRequest) -> Self {
        Attempt { request, number: 1 }
    }

    /// The replay that follows this attempt.
    pub fn retry(&self) -> Self {
        Attempt {
            request: self.request,
            number: self.number.saturating_add(1),
        }
    }

    pub fn is_retry(&self) -> bool {
        self.number > 1
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn request(&self) -> &'a ApiRequest {
        self.request
    }
}

/// A response as received from the backend, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        ApiResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> SessionResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            SessionError::Decode(format!(
                "Failed to parse response JSON (status {}): {}",
                self.status, e
            ))
        })
    }

    /// Converts a non-success response into `RequestFailed`, body untouched.
    pub fn error_for_status(self) -> SessionResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SessionError::RequestFailed {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// The HTTP transport the session core is parameterised over.
///
/// `send` returns `Ok` for every HTTP status; `Err` means no response at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;
}
