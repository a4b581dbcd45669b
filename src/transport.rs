//! HTTP transport seam
//!
//! A [`Transport`] performs exactly one HTTP exchange and reports either a
//! status plus body or a [`TransportError`]. Retrying is layered on top by
//! [`crate::retry::RetryingExecutor`].
//!
//! ## Implementations
//! - [`GooseTransport`] issues requests through a `GooseUser`, so every
//!   attempt shows up in Goose's request metrics.
//! - [`ReqwestTransport`] uses a plain `reqwest::Client`; the setup phase
//!   runs before the attack starts and has no `GooseUser` to borrow.

use async_trait::async_trait;
use goose::goose::GooseResponse;
use goose::prelude::*;
use reqwest::Client;
use std::time::Duration;

use crate::error::TransportError;

/// Connection pool idle timeout in seconds
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout for the setup client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Verbs this workload needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    fn goose(&self) -> GooseMethod {
        match self {
            Self::Get => GooseMethod::Get,
            Self::Post => GooseMethod::Post,
            Self::Put => GooseMethod::Put,
        }
    }

    fn reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
        }
    }
}

/// A single request, described independently of the client that sends it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, query string included.
    pub path: String,
    /// Stable metric name, e.g. `GET /api/usuarios/{id}/reservas`.
    pub name: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
    /// Non-2xx statuses that still count as a successful request in Goose.
    pub accepted_statuses: &'static [u16],
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, name: &'static str) -> Self {
        Self {
            method,
            path: path.into(),
            name,
            headers: Vec::new(),
            body: None,
            accepted_statuses: &[],
        }
    }

    pub fn get(path: impl Into<String>, name: &'static str) -> Self {
        Self::new(HttpMethod::Get, path, name).header("Accept", "application/json")
    }

    pub fn post_json(
        path: impl Into<String>,
        name: &'static str,
        body: &serde_json::Value,
    ) -> Self {
        Self::new(HttpMethod::Post, path, name)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .with_body(body.to_string())
    }

    /// PUT without a body.
    pub fn put_empty(path: impl Into<String>, name: &'static str) -> Self {
        Self::new(HttpMethod::Put, path, name)
    }

    pub fn header(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub fn accept_statuses(mut self, statuses: &'static [u16]) -> Self {
        self.accepted_statuses = statuses;
        self
    }
}

/// Status and body of an exchange that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request, with no retry.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

// ============================================================================
// Goose
// ============================================================================

/// Sends requests as a specific Goose user.
pub struct GooseTransport<'a> {
    user: &'a mut GooseUser,
}

impl<'a> GooseTransport<'a> {
    pub fn new(user: &'a mut GooseUser) -> Self {
        Self { user }
    }
}

#[async_trait]
impl Transport for GooseTransport<'_> {
    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut request_builder = self
            .user
            .get_request_builder(&request.method.goose(), &request.path)
            .map_err(|e| TransportError::Harness(e.to_string()))?;
        for (key, value) in &request.headers {
            request_builder = request_builder.header(*key, value.as_str());
        }
        if let Some(body) = &request.body {
            request_builder = request_builder.body(body.clone());
        }

        let goose_request = GooseRequest::builder()
            .set_request_builder(request_builder)
            .name(request.name)
            .build();

        let goose = self
            .user
            .request(goose_request)
            .await
            .map_err(|e| TransportError::Harness(e.to_string()))?;
        let GooseResponse {
            request: mut metric,
            response,
        } = goose;

        let response = response?;
        let status = response.status().as_u16();
        if request.accepted_statuses.contains(&status) {
            if let Err(e) = self.user.set_success(&mut metric) {
                tracing::debug!(name = request.name, "could not mark request as success: {e}");
            }
        }
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// reqwest
// ============================================================================

/// Sends requests with a shared `reqwest::Client` against a fixed base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a client with timeouts to prevent hangs.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.reqwest(), &url);
        for (key, value) in &request.headers {
            builder = builder.header(*key, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_json_post_carries_headers() {
        let request = HttpRequest::post_json(
            "/api/reservas/byuser",
            "POST /api/reservas/byuser",
            &serde_json::json!({ "turnoId": 7 }),
        )
        .bearer("T");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(r#"{"turnoId":7}"#));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| *k == "Authorization" && v == "Bearer T"));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| *k == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = ReqwestTransport::with_client(Client::new(), "http://app:8080/");
        assert_eq!(transport.base_url, "http://app:8080");
    }
}
