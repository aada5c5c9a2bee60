//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity, timeouts, thresholds > 0)
//! - Check the outbound policy is expressible as exact matches
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShieldConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::ShieldConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("outbound.allowed_hosts must not be empty")]
    NoAllowedHosts,

    #[error("outbound.allowed_hosts entry {0:?} must be a bare lower-case host name")]
    InvalidHost(String),

    #[error("outbound.allowed_protocols entry {0:?} is not http or https")]
    UnsupportedProtocol(String),

    #[error("identity.header {0:?} is not a valid header name")]
    InvalidIdentityHeader(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positives: [(&'static str, u64); 6] = [
        ("rate_limit.capacity", config.rate_limit.capacity as u64),
        ("rate_limit.refill_period_secs", config.rate_limit.refill_period_secs),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("circuit_breaker.cooldown_secs", config.circuit_breaker.cooldown_secs),
        ("timeouts.outbound_request_secs", config.timeouts.outbound_request_secs),
        ("timeouts.inbound_request_secs", config.timeouts.inbound_request_secs),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.outbound.max_response_bytes == 0 {
        errors.push(ValidationError::Zero { field: "outbound.max_response_bytes" });
    }

    if config.outbound.allowed_hosts.is_empty() {
        errors.push(ValidationError::NoAllowedHosts);
    }
    for host in &config.outbound.allowed_hosts {
        if !is_bare_host(host) {
            errors.push(ValidationError::InvalidHost(host.clone()));
        }
    }

    for protocol in &config.outbound.allowed_protocols {
        let lowered = protocol.to_ascii_lowercase();
        if lowered != "http" && lowered != "https" {
            errors.push(ValidationError::UnsupportedProtocol(protocol.clone()));
        }
    }

    if HeaderName::from_bytes(config.identity.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidIdentityHeader(config.identity.header.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Allow-list entries are compared verbatim against the lower-cased URL host,
/// so anything with a scheme, port, path or upper-case letter never matches.
fn is_bare_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}
