use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ApiRequest, ApiResponse, Transport};
use crate::config::ApiConfig;
use crate::error::TransportError;

/// `Transport` over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Builds a client for `config.base_url`. The only timeout applied is the
    /// optional platform-level `timeout_in_ms`.
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.timeout_in_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }

        Ok(ReqwestTransport {
            http_client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        debug!(
            request_id = %request.id,
            method = %request.method,
            path = request.path.as_str(),
            authenticated = bearer.is_some(),
            "Sending request to {}",
            url
        );

        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(
            request_id = %request.id,
            status = status.as_u16(),
            "Received response"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
