//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline.rs
//!     → security::url_guard (may we call this URL at all?)
//!     → transport.rs (single timed GET, no redirects)
//!     → schema.rs (strict typed parse of the body)
//! ```

pub mod pipeline;
pub mod schema;
pub mod transport;

pub use pipeline::{FetchOutcome, ResilientFetchPipeline};
pub use schema::{parse_strict, ResponseSchema, SchemaError, TodoRecord};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
