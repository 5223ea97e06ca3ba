//! Shared utilities for integration testing.

use std::sync::Arc;

use tokio::net::TcpListener;

use ingest_gateway::audit::MemoryAuditSink;
use ingest_gateway::config::schema::GatewayConfig;
use ingest_gateway::security::signature;
use ingest_gateway::store::MemoryStore;
use ingest_gateway::GatewayServer;

pub const ACTIVE_SECRET: &str = "active-secret-for-tests";
pub const NEXT_SECRET: &str = "next-secret-for-tests";

/// A gateway listening on an ephemeral port, with handles to its
/// in-memory collaborators.
pub struct TestGateway {
    pub url: String,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
}

/// Enabled gateway config with the test secret.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.api.enabled = true;
    config.api.active_secret = ACTIVE_SECRET.to_string();
    config
}

/// Start a gateway on an ephemeral port and return its endpoint URL
/// plus the store and audit sink for assertions.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let server = GatewayServer::new(config, store.clone(), audit.clone());

    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    TestGateway {
        url: format!("http://{addr}/api/ingest"),
        store,
        audit,
    }
}

/// Sign a body the way an external consumer would.
pub fn sign(body: &str, secret: &str) -> String {
    signature::sign(body.as_bytes(), secret)
}

/// POST a signed JSON body.
pub async fn post_signed(
    client: &reqwest::Client,
    url: &str,
    body: &str,
    secret: &str,
) -> reqwest::Response {
    client
        .post(url)
        .header("content-type", "application/json")
        .header("x-signature", sign(body, secret))
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}
