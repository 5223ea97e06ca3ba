//! Third-Party Ingestion Gateway binary.
//!
//! Loads configuration (TOML file via `INGEST_CONFIG`, or defaults plus
//! environment overrides), initializes logging and metrics, and serves
//! the ingestion endpoint.

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use ingest_gateway::audit::TracingAuditSink;
use ingest_gateway::config::loader;
use ingest_gateway::observability::{logging, metrics};
use ingest_gateway::store::MemoryStore;
use ingest_gateway::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("INGEST_CONFIG") {
        Ok(path) => loader::load_config(Path::new(&path))?,
        Err(_) => loader::load_from_env()?,
    };

    logging::init(&format!(
        "ingest_gateway={},tower_http=warn",
        config.observability.log_level
    ));

    tracing::info!("ingest-gateway v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_enabled = config.api.enabled,
        rotation_in_progress = config.api.next_secret.is_some(),
        rate_limit_capacity = config.rate_limit.capacity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(TracingAuditSink);
    let server = GatewayServer::new(config, store, audit);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
