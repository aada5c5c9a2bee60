//! Caller identity middleware.
//!
//! Authentication happens upstream of this service. The front door forwards
//! the authenticated principal in a trusted header, which this middleware lifts
//! into a [`CallerIdentity`] request extension for the rate limiter. Requests
//! without the header fall back to the peer IP when the server was started with
//! connect info; otherwise they are rejected.

use std::fmt;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Stable identity of the caller, used as the rate-limit key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn principal(name: &str) -> Self {
        Self(format!("user:{}", name))
    }

    pub fn peer(addr: SocketAddr) -> Self {
        Self(format!("ip:{}", addr.ip()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State required for identity extraction.
#[derive(Clone, Debug)]
pub struct IdentityState {
    pub header: HeaderName,
}

/// Resolve the caller identity of a request, if any.
pub fn identify(header: &HeaderName, req: &Request<Body>) -> Option<CallerIdentity> {
    let from_header = req
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CallerIdentity::principal);

    from_header.or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| CallerIdentity::peer(*addr))
    })
}

pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match identify(&state.header, &req) {
        Some(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        None => {
            tracing::debug!(header = %state.header, "Request without caller identity");
            (StatusCode::UNAUTHORIZED, "Missing caller identity").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> HeaderName {
        HeaderName::from_static("x-user-id")
    }

    #[test]
    fn test_header_identity_wins() {
        let mut req = Request::builder()
            .header("x-user-id", " user1 ")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.1.2.3:5555".parse::<SocketAddr>().unwrap()));

        assert_eq!(identify(&header(), &req), Some(CallerIdentity::principal("user1")));
    }

    #[test]
    fn test_falls_back_to_peer_ip() {
        let mut req = Request::builder()
            .header("x-user-id", "")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.1.2.3:5555".parse::<SocketAddr>().unwrap()));

        let caller = identify(&header(), &req).unwrap();
        assert_eq!(caller.as_str(), "ip:10.1.2.3");
    }

    #[test]
    fn test_anonymous_request_has_no_identity() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(identify(&header(), &req), None);
    }

    #[test]
    fn test_principal_and_ip_keys_do_not_collide() {
        assert_ne!(
            CallerIdentity::principal("10.1.2.3"),
            CallerIdentity::peer("10.1.2.3:1".parse().unwrap())
        );
    }
}
