//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (attach caller identity)
//!     → rate_limit.rs (per-caller token bucket)
//!     → handler
//!
//! Outbound fetch requested by a client:
//!     → url_guard.rs (protocol, host allow-list, resolved addresses)
//!     → fetch pipeline
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Rejection details go to logs, never to the client

pub mod identity;
pub mod rate_limit;
pub mod url_guard;

pub use identity::{identity_middleware, CallerIdentity, IdentityState};
pub use rate_limit::{rate_limit_middleware, Admission, TokenBucketLimiter};
pub use url_guard::{DnsResolver, OutboundUrlGuard, SystemResolver, UrlRejection, UrlValidationResult};
