//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Issue a single GET for an already-validated URL
//! - Enforce connect and response timeouts
//! - Cap the response body size
//!
//! # Design Decisions
//! - Redirects are never followed; a 3xx is handed back as-is so a redirect
//!   cannot lead the request to a host the URL guard never saw
//! - Environment proxies are ignored so the connection goes to the address
//!   the guard resolved, not wherever a proxy decides
//! - Bodies of non-2xx responses are not read

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// A blocking-free GET primitive.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError>;
}

/// Production transport over `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .user_agent(concat!("api-shield/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let mut response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            return Ok(TransportResponse {
                status,
                body: Vec::new(),
            });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(TransportError::BodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_2xx_is_success() {
        for (status, ok) in [(199, false), (200, true), (204, true), (299, true), (301, false), (500, false)] {
            let response = TransportResponse { status, body: Vec::new() };
            assert_eq!(response.is_success(), ok, "{}", status);
        }
    }
}
