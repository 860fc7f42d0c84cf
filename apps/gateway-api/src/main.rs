//! SmartEquiz gateway API server.

mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use smartequiz_gateway::services::DeliveryService;
use smartequiz_gateway::{
    build_router, DeliveryWorker, EventDispatcher, GatewayState, GatewayStore,
};

use crate::config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    logging::init(config.environment);

    let store = Arc::new(GatewayStore::new());
    let mut state = GatewayState::new(
        store.clone(),
        config.api_key_secret.clone(),
        config.webhook_encryption_key.clone(),
    )?;
    if config.allow_http_webhooks {
        tracing::warn!("Plain-HTTP webhook URLs enabled");
        state.webhooks = state.webhooks.with_allow_http(true);
    }

    let delivery = DeliveryService::new(store.clone(), config.webhook_encryption_key.clone())?;

    // Event fan-out and scheduled retries run for the process lifetime.
    let dispatcher = EventDispatcher::new(store.clone(), delivery.clone());
    tokio::spawn(dispatcher.run(state.publisher.subscribe()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = DeliveryWorker::new(store, delivery);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Gateway API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    tracing::info!("Gateway API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
