//! Token Relay Service - Main Entry Point
//!
//! Sits between a relying party and the upstream IDP and re-issues the
//! IDP's identity tokens under the relay's own key.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use token_relay::observability::{TracingConfig, init_tracing};
use token_relay::shutdown::{ShutdownCoordinator, run_with_graceful_shutdown};
use token_relay::{AppState, Config, TokenExchange, jwks::PublishedKeySets, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    let tracing_config = TracingConfig::from(config.as_ref());
    init_tracing(&tracing_config)?;

    info!(service = %tracing_config.service_name, "Starting Token Relay Service");

    let exchange = Arc::new(TokenExchange::new(Arc::clone(&config))?);
    let key_sets = PublishedKeySets::load(&config)?;
    let app = router(AppState::new(exchange, key_sets, Arc::clone(&config)));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        idp = %config.idp.domain,
        issuer = %config.intermediary.issuer(),
        "Token Relay Service listening"
    );

    let coordinator = ShutdownCoordinator::new();
    let server = axum::serve(listener, app).with_graceful_shutdown(coordinator.subscribe().recv());

    run_with_graceful_shutdown(server, coordinator, config.shutdown_timeout).await?;

    info!("Token Relay Service stopped");
    Ok(())
}
