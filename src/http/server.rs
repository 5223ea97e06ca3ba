//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the ingest and health routes
//! - Wire up middleware (tracing, timeout, body limit)
//! - Share the caches, allowlists, and collaborators via state
//! - Spawn the background cache sweeper
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::audit::AuditSink;
use crate::config::schema::GatewayConfig;
use crate::http::handler::ingest_handler;
use crate::idempotency::IdempotencyCache;
use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::store::DataStore;
use crate::validate::AllowlistRegistry;

/// Application state injected into handlers.
///
/// The caches live here, owned by the server and shared across
/// concurrently-executing requests; the handler receives them as
/// injected dependencies rather than reaching for globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiter: Arc<RateLimiter>,
    pub idempotency: Arc<IdempotencyCache>,
    pub allowlists: Arc<AllowlistRegistry>,
    pub store: Arc<dyn DataStore>,
    pub audit: Arc<dyn AuditSink>,
}

/// HTTP server for the ingestion gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    limiter: Arc<RateLimiter>,
    idempotency: Arc<IdempotencyCache>,
}

impl GatewayServer {
    /// Create a new server around the given collaborators.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn DataStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let idempotency = Arc::new(IdempotencyCache::new(config.idempotency.clone()));

        let state = AppState {
            config: Arc::new(config.clone()),
            limiter: limiter.clone(),
            idempotency: idempotency.clone(),
            allowlists: Arc::new(AllowlistRegistry::builtin()),
            store,
            audit,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            limiter,
            idempotency,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/ingest", post(ingest_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            api_enabled = self.config.api.enabled,
            "Gateway server starting"
        );

        let sweeper = spawn_sweeper(
            self.limiter.clone(),
            self.idempotency.clone(),
            Duration::from_secs(self.config.idempotency.sweep_interval_secs),
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        tracing::info!("Gateway server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Periodically reclaim idle rate-limit buckets and expired idempotency
/// records. Racing an in-flight check on the same key is benign: the
/// entry is recreated fresh on next use.
fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    idempotency: Arc<IdempotencyCache>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let buckets = limiter.sweep();
            let records = idempotency.sweep();
            if buckets > 0 || records > 0 {
                tracing::debug!(buckets, records, "Swept expired cache entries");
            }
            metrics::record_cache_sizes(limiter.len(), idempotency.len());
        }
    })
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
