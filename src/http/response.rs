//! Client-facing responses.
//!
//! # Responsibilities
//! - Map each fetch outcome to a status code and a generic message
//!
//! # Design Decisions
//! - Messages never include resolved addresses, rejection reasons or
//!   upstream error text; those stay in the logs
//! - Dependency unavailability is 503, a misbehaving dependency is 502

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::fetch::FetchOutcome;

pub const URL_REJECTED: &str = "Error: The provided URL is not safe or is restricted.";
pub const CIRCUIT_OPEN: &str = "External service temporarily unavailable";
pub const UPSTREAM_FAILED: &str = "Failed to fetch external content";
pub const SCHEMA_INVALID: &str = "External content failed validation";

impl<T: Serialize> IntoResponse for FetchOutcome<T> {
    fn into_response(self) -> Response {
        match self {
            FetchOutcome::Success(payload) => (StatusCode::OK, Json(payload)).into_response(),
            FetchOutcome::Blocked(_) => (StatusCode::BAD_REQUEST, URL_REJECTED).into_response(),
            FetchOutcome::CircuitOpen => {
                (StatusCode::SERVICE_UNAVAILABLE, CIRCUIT_OPEN).into_response()
            }
            FetchOutcome::UpstreamError(_) => {
                (StatusCode::BAD_GATEWAY, UPSTREAM_FAILED).into_response()
            }
            FetchOutcome::SchemaInvalid(_) => {
                (StatusCode::BAD_GATEWAY, SCHEMA_INVALID).into_response()
            }
        }
    }
}
