//! Outbound URL guard (SSRF defense).
//!
//! A URL supplied by a client is only fetched once it passes, in order:
//! 1. parsing as an absolute URL with a host
//! 2. the scheme allow-list (`http`/`https` by default)
//! 3. an exact, lower-cased host allow-list (no suffix or wildcard matching,
//!    so `trusted.com.attacker.net` never matches `trusted.com`)
//! 4. resolution of the host, where every address must be publicly routable
//!
//! Every error along the way means "unsafe". The resolution step is a point in
//! time check: DNS may answer differently when the transport connects a moment
//! later, so rebinding within that window is not prevented here.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::OutboundConfig;
use crate::observability::metrics;

/// Why a URL was refused.
///
/// The variants carry enough detail for logs. None of it is meant for clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlRejection {
    #[error("not an absolute URL: {0}")]
    Malformed(String),

    #[error("protocol not allowed: {0}")]
    Protocol(String),

    #[error("host not in allow-list: {0}")]
    HostNotAllowed(String),

    #[error("could not resolve {host}: {detail}")]
    Unresolvable { host: String, detail: String },

    #[error("{host} resolves to non-public address {addr}")]
    NonPublicAddress { host: String, addr: IpAddr },
}

impl UrlRejection {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UrlRejection::Malformed(_) => "malformed",
            UrlRejection::Protocol(_) => "protocol",
            UrlRejection::HostNotAllowed(_) => "host",
            UrlRejection::Unresolvable { .. } => "resolution",
            UrlRejection::NonPublicAddress { .. } => "address",
        }
    }
}

/// Transient verdict for a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlValidationResult {
    pub safe: bool,
    pub reason: Option<String>,
}

impl From<&Result<Url, UrlRejection>> for UrlValidationResult {
    fn from(result: &Result<Url, UrlRejection>) -> Self {
        match result {
            Ok(_) => Self { safe: true, reason: None },
            Err(rejection) => Self {
                safe: false,
                reason: Some(rejection.to_string()),
            },
        }
    }
}

/// Host name resolution used by the guard.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system resolver through Tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// True for loopback, link-local, private/site-local and unspecified addresses.
pub fn is_non_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_non_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_non_public_v4(v4),
            None => is_non_public_v6(v6),
        },
    }
}

fn is_non_public_v4(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_link_local() || addr.is_private() || addr.is_unspecified()
}

fn is_non_public_v6(addr: Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        || (first & 0xffc0) == 0xfe80 // link-local
        || (first & 0xffc0) == 0xfec0 // site-local (deprecated)
        || (first & 0xfe00) == 0xfc00 // unique local
}

/// Validates URLs before any server-initiated request is made.
#[derive(Clone)]
pub struct OutboundUrlGuard {
    allowed_hosts: Vec<String>,
    allowed_protocols: Vec<String>,
    resolver: Arc<dyn DnsResolver>,
}

impl OutboundUrlGuard {
    pub fn new(
        allowed_hosts: impl IntoIterator<Item = impl Into<String>>,
        allowed_protocols: impl IntoIterator<Item = impl Into<String>>,
        resolver: Arc<dyn DnsResolver>,
    ) -> Self {
        Self {
            allowed_hosts: allowed_hosts.into_iter().map(Into::into).collect(),
            allowed_protocols: allowed_protocols
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase())
                .collect(),
            resolver,
        }
    }

    pub fn from_config(config: &OutboundConfig, resolver: Arc<dyn DnsResolver>) -> Self {
        Self::new(
            config.allowed_hosts.iter().cloned(),
            config.allowed_protocols.iter().cloned(),
            resolver,
        )
    }

    /// Run every check and return the parsed URL when all of them pass.
    pub async fn check(&self, raw: &str) -> Result<Url, UrlRejection> {
        let url = Url::parse(raw).map_err(|e| UrlRejection::Malformed(e.to_string()))?;

        let scheme = url.scheme().to_ascii_lowercase();
        if !self.allowed_protocols.contains(&scheme) {
            return Err(UrlRejection::Protocol(scheme));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(UrlRejection::Malformed("missing host".to_string())),
        };
        if !self.allowed_hosts.iter().any(|allowed| *allowed == host) {
            return Err(UrlRejection::HostNotAllowed(host));
        }

        // IPv6 literals come back bracketed from `host_str`.
        let lookup = host.trim_start_matches('[').trim_end_matches(']');
        let addrs = self
            .resolver
            .resolve(lookup)
            .await
            .map_err(|e| UrlRejection::Unresolvable {
                host: host.clone(),
                detail: e.to_string(),
            })?;
        if addrs.is_empty() {
            return Err(UrlRejection::Unresolvable {
                host,
                detail: "no addresses".to_string(),
            });
        }
        if let Some(addr) = addrs.into_iter().find(|a| is_non_public(*a)) {
            return Err(UrlRejection::NonPublicAddress { host, addr });
        }

        Ok(url)
    }

    /// Check a URL and log/count the rejection, if any.
    pub async fn inspect(&self, raw: &str) -> Result<Url, UrlRejection> {
        let result = self.check(raw).await;
        if let Err(rejection) = &result {
            tracing::warn!(reason = %rejection, "SSRF defense: outbound URL rejected");
            metrics::record_url_rejected(rejection.kind());
        }
        result
    }

    pub async fn validate(&self, raw: &str) -> UrlValidationResult {
        UrlValidationResult::from(&self.inspect(raw).await)
    }

    /// Fail-closed boolean verdict.
    pub async fn is_safe(&self, raw: &str) -> bool {
        self.inspect(raw).await.is_ok()
    }
}
