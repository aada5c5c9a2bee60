//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (identity, rate limit, timeout, tracing, request ID)
//! - Build the fetch pipeline from configuration
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::HeaderName,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ShieldConfig;
use crate::fetch::{
    HttpTransport, ReqwestTransport, ResilientFetchPipeline, TodoRecord, TransportError,
};
use crate::http::request::make_request_span;
use crate::resilience::CircuitBreaker;
use crate::security::{
    identity_middleware, rate_limit_middleware, CallerIdentity, DnsResolver, IdentityState,
    OutboundUrlGuard, SystemResolver, TokenBucketLimiter,
};

/// Name of the external dependency guarded by the breaker.
const DEPENDENCY: &str = "external-api";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResilientFetchPipeline>,
    pub limiter: Arc<TokenBucketLimiter>,
}

/// HTTP server for the API shield.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ShieldConfig,
}

impl HttpServer {
    /// Create a server using the real transport and system DNS.
    pub fn new(config: ShieldConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(
            config.timeouts.outbound_request(),
            config.outbound.max_response_bytes,
        )?;
        Ok(Self::with_components(config, Arc::new(transport), Arc::new(SystemResolver)))
    }

    /// Create a server with explicit outbound collaborators.
    pub fn with_components(
        config: ShieldConfig,
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<dyn DnsResolver>,
    ) -> Self {
        let guard = OutboundUrlGuard::from_config(&config.outbound, resolver);
        let breaker = CircuitBreaker::from_config(DEPENDENCY, &config.circuit_breaker);
        let pipeline = ResilientFetchPipeline::new(
            guard,
            breaker,
            transport,
            config.timeouts.outbound_request(),
        );

        let state = AppState {
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(TokenBucketLimiter::from_config(&config.rate_limit)),
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ShieldConfig, state: AppState) -> Router {
        let identity = IdentityState {
            header: HeaderName::from_bytes(config.identity.header.as_bytes()).unwrap_or_else(|_| {
                tracing::warn!(header = %config.identity.header, "Invalid identity header, using x-user-id");
                HeaderName::from_static("x-user-id")
            }),
        };

        let mut api = Router::new()
            .route("/api/v1/fetch-external", get(fetch_external))
            .with_state(state.clone());
        if config.rate_limit.enabled {
            api = api.layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                rate_limit_middleware,
            ));
        }
        let api = api.layer(middleware::from_fn_with_state(identity, identity_middleware));

        Router::new()
            .route("/health", get(health))
            .merge(api)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
                    .layer(TimeoutLayer::new(config.timeouts.inbound_request())),
            )
    }

    /// The fully layered router, e.g. for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit_capacity = self.config.rate_limit.capacity,
            allowed_hosts = ?self.config.outbound.allowed_hosts,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub url: String,
}

/// Fetch and validate a record from an allow-listed external host.
async fn fetch_external(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(params): Query<FetchParams>,
) -> Response {
    tracing::debug!(caller = %caller, "Fetching external content");
    state
        .pipeline
        .fetch::<TodoRecord>(&params.url)
        .await
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}
