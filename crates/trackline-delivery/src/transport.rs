//! HTTP transport abstraction.
//!
//! [`HttpTransport`] is the seam between request classification and the
//! actual network. Production uses [`ReqwestTransport`]; tests swap in
//! scripted transports to exercise every response class without a
//! server.

use crate::{DeliveryError, DeliveryResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound API request, path relative to the tracking host.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body.into()),
        }
    }

    pub fn put(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(body.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A received HTTP response, body already drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes a single HTTP exchange.
///
/// Implementations return `Err(NoResponseMade)` when the exchange never
/// produced a status line; any received response comes back as `Ok`,
/// whatever its status.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> DeliveryResult<HttpResponse>;
}

/// Production transport over a shared reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    auth_header: String,
}

impl ReqwestTransport {
    /// Build a transport for the given tracking host.
    ///
    /// Requests authenticate with HTTP Basic auth derived from the site
    /// id and api key.
    pub fn new(mut base_url: Url, site_id: &str, api_key: &str, timeout: Duration) -> Self {
        // Url::join drops the last path segment unless the base ends
        // with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trackline-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        let credentials = BASE64.encode(format!("{}:{}", site_id, api_key));

        Self {
            client,
            base_url,
            auth_header: format!("Basic {}", credentials),
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> DeliveryResult<HttpResponse> {
        let url = self.base_url.join(&request.path).map_err(|e| {
            warn!(path = %request.path, error = %e, "Failed to build request URL");
            DeliveryError::NoResponseMade
        })?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        builder = builder.header(reqwest::header::AUTHORIZATION, &self.auth_header);
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "Request did not complete");
            DeliveryError::NoResponseMade
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "Failed to read response body");
            DeliveryError::NoResponseMade
        })?;

        Ok(HttpResponse { status, body })
    }
}
