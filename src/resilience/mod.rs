//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → circuit_breaker.rs (fail fast while the dependency is considered down)
//!     → timeouts.rs (every external call has a deadline)
//!     → circuit_breaker.rs (record the outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Single attempt per call; nothing here retries
//! - Only availability problems (transport errors, non-2xx) trip the breaker

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerPolicy, CircuitBreaker, CircuitStatus};
pub use timeouts::{with_timeout, TimeoutError};
