pub mod metrics;
pub mod rest;
pub mod scheduler;
pub mod state;
pub mod ws;

use std::sync::Arc;

use tempo_core::{TempoError, TempoResult};
use tempo_engine::config::EngineConfig;
use tempo_engine::engine::TaskEngine;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub rest_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub engine_config: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            rest_port: 8080,
            cors_allowed_origins: Vec::new(),
            engine_config: EngineConfig::default(),
        }
    }
}

/// Initialize the engine, spawn the notification scheduler, and serve the
/// REST API until ctrl-c.
pub async fn start_server(config: ServerConfig) -> TempoResult<()> {
    metrics::init_metrics();

    let engine = Arc::new(TaskEngine::init(config.engine_config.clone())?);
    let state = Arc::new(AppState::new(engine));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    scheduler::spawn_notifier(Arc::clone(&state), shutdown_tx.subscribe());

    let router = rest::create_router_with_cors(Arc::clone(&state), &config.cors_allowed_origins);

    let addr = format!("{}:{}", config.bind_host, config.rest_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TempoError::Internal(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "REST server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(());
        })
        .await
        .map_err(|e| TempoError::Internal(format!("server error: {e}")))?;

    Ok(())
}
