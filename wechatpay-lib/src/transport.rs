//! HTTP transport seam.
//!
//! The client signs and validates; a [`Transport`] only moves bytes. The
//! default [`HttpTransport`] is backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::{Result, WechatPayError};

/// A fully prepared outbound request.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Headers, including `Authorization`.
    pub headers: HeaderMap,
    /// Serialized body, if any.
    pub body: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Raw response as received from the wire.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body text.
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is in `200..=299`.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Executes a single HTTP exchange.
///
/// Implementations must not retry: every attempt has to be signed anew.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw response, whatever its status.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh connection pool.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| WechatPayError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client (shared pool, custom TLS, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn map_reqwest_error(e: reqwest::Error, request: &TransportRequest) -> WechatPayError {
        if e.is_timeout() {
            WechatPayError::ConnectionTimeout {
                operation: format!("{} {}", request.method, request.url),
                timeout_ms: request.timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            WechatPayError::ConnectionFailed {
                target: request.url.clone(),
                reason: e.to_string(),
            }
        } else {
            WechatPayError::Transport(format!("request failed: {}", e))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(e, &request))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_reqwest_error(e, &request))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let response = |status| TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(199).is_success());
        assert!(!response(301).is_success());
        assert!(!response(500).is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connection_failed() {
        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest {
            method: Method::GET,
            url: "http://127.0.0.1:1/v3/certificates".to_string(),
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(2),
        };

        let err = transport.execute(request).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
