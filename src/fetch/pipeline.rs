//! Resilient fetch pipeline.
//!
//! # Data Flow
//! ```text
//! fetch(url)
//!     → circuit breaker open?          → CircuitOpen    (nothing else runs)
//!     → URL guard rejects?             → Blocked        (breaker untouched)
//!     → GET under timeout fails?       → UpstreamError  (failure recorded)
//!     → status not 2xx?                → UpstreamError  (failure recorded)
//!     → body fails strict schema?      → SchemaInvalid  (breaker reset)
//!     → Success                                          (success recorded)
//! ```
//!
//! One attempt per call. No lock is held while the request is in flight.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fetch::schema::{parse_strict, ResponseSchema};
use crate::fetch::transport::HttpTransport;
use crate::observability::metrics;
use crate::resilience::{with_timeout, CircuitBreaker};
use crate::security::{OutboundUrlGuard, UrlRejection};

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Success(T),
    Blocked(UrlRejection),
    CircuitOpen,
    UpstreamError(String),
    SchemaInvalid(String),
}

impl<T> FetchOutcome<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::Blocked(_) => "blocked",
            FetchOutcome::CircuitOpen => "circuit_open",
            FetchOutcome::UpstreamError(_) => "upstream_error",
            FetchOutcome::SchemaInvalid(_) => "schema_invalid",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

impl<T> fmt::Display for FetchOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(_) => f.write_str("success"),
            FetchOutcome::Blocked(reason) => write!(f, "blocked: {}", reason),
            FetchOutcome::CircuitOpen => f.write_str("circuit open"),
            FetchOutcome::UpstreamError(detail) => write!(f, "upstream error: {}", detail),
            FetchOutcome::SchemaInvalid(detail) => write!(f, "schema invalid: {}", detail),
        }
    }
}

/// Guarded, time-bounded, breaker-supervised fetching of external records.
pub struct ResilientFetchPipeline {
    guard: OutboundUrlGuard,
    breaker: CircuitBreaker,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl ResilientFetchPipeline {
    pub fn new(
        guard: OutboundUrlGuard,
        breaker: CircuitBreaker,
        transport: Arc<dyn HttpTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            guard,
            breaker,
            transport,
            timeout,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn guard(&self) -> &OutboundUrlGuard {
        &self.guard
    }

    /// Fetch `url` and validate the body as `T`.
    pub async fn fetch<T: ResponseSchema>(&self, url: &str) -> FetchOutcome<T> {
        let start = Instant::now();
        let outcome = self.run(url).await;

        match &outcome {
            FetchOutcome::Success(_) => {
                tracing::debug!(dependency = %self.breaker.name(), "External fetch succeeded")
            }
            FetchOutcome::Blocked(_) | FetchOutcome::CircuitOpen => {}
            other => tracing::warn!(dependency = %self.breaker.name(), outcome = %other, "External fetch failed"),
        }
        metrics::record_fetch_outcome(outcome.kind(), start);
        outcome
    }

    async fn run<T: ResponseSchema>(&self, raw_url: &str) -> FetchOutcome<T> {
        if self.breaker.is_open() {
            return FetchOutcome::CircuitOpen;
        }

        let url = match self.guard.inspect(raw_url).await {
            Ok(url) => url,
            Err(rejection) => return FetchOutcome::Blocked(rejection),
        };

        let response = match with_timeout(self.timeout, self.transport.get(&url)).await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure();
                return FetchOutcome::UpstreamError(e.to_string());
            }
        };

        if !response.is_success() {
            self.breaker.record_failure();
            return FetchOutcome::UpstreamError(format!("upstream returned status {}", response.status));
        }

        match parse_strict::<T>(&response.body) {
            Ok(payload) => {
                self.breaker.record_success();
                FetchOutcome::Success(payload)
            }
            Err(e) => {
                // Reachable upstream, unusable data: not an availability problem.
                self.breaker.reset();
                FetchOutcome::SchemaInvalid(e.to_string())
            }
        }
    }
}
