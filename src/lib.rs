//! API shield: request admission and outbound-call safety for a REST backend.

pub mod config;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ShieldConfig;
pub use fetch::{FetchOutcome, ResilientFetchPipeline};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
