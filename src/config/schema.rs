//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the API shield.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-caller rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Outbound URL policy (SSRF defense).
    pub outbound: OutboundConfig,

    /// Circuit breaker guarding the external dependency.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Where the caller identity comes from.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Tokens per bucket (requests admitted per refill period).
    pub capacity: u32,

    /// Refill period in seconds. The bucket is refilled to capacity, not
    /// proportionally, once this much time has passed since the last refill.
    pub refill_period_secs: u64,
}

impl RateLimitConfig {
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs(self.refill_period_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 5,
            refill_period_secs: 60,
        }
    }
}

/// Outbound request policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Hosts the server may fetch from. Exact, lower-case match only.
    pub allowed_hosts: Vec<String>,

    /// URL schemes the server may fetch over.
    pub allowed_protocols: Vec<String>,

    /// Largest response body accepted from an external host, in bytes.
    pub max_response_bytes: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![
                "jsonplaceholder.typicode.com".to_string(),
                "external-api.trusted.com".to_string(),
            ],
            allowed_protocols: vec!["http".to_string(), "https".to_string()],
            max_response_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a probe is admitted.
    pub cooldown_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connect + response timeout for outbound fetches, in seconds.
    pub outbound_request_secs: u64,

    /// Total time allowed for handling an inbound request, in seconds.
    pub inbound_request_secs: u64,
}

impl TimeoutConfig {
    pub fn outbound_request(&self) -> Duration {
        Duration::from_secs(self.outbound_request_secs)
    }

    pub fn inbound_request(&self) -> Duration {
        Duration::from_secs(self.inbound_request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            outbound_request_secs: 5,
            inbound_request_secs: 30,
        }
    }
}

/// Caller identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header set by the authenticating front door carrying the caller id.
    pub header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            header: "x-user-id".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
