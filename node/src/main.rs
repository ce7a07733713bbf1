// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;
use std::time::Duration;

use pulse_node::config::EngineConfig;
use pulse_node::engine::PulseEngine;
use pulse_node::server::build_router;
use pulse_node::telemetry::init_telemetry;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry();

    let cfg = EngineConfig::from_env()?;
    tracing::info!("Initializing Pulse node with config: {:?}", cfg);

    let engine = Arc::new(PulseEngine::new(cfg.clone())?);

    // Load ledger snapshot if present. A broken chain is kept as-is and reported.
    match engine.load_state().await {
        Ok(Some(verdict)) if !verdict.is_valid() => {
            tracing::error!(fault = ?verdict.fault(), "Restored ledger fails verification");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Failed to restore ledger snapshot: {}", e);
            return Err(e.into());
        }
    }

    if cfg.heartbeat_enabled {
        engine.start_heartbeat(cfg.heartbeat_interval());
    }

    // Spawn persistence task
    if let Some(secs) = cfg.auto_persist_interval_secs {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::debug!("Auto-persisting...");
                if let Err(e) = engine.persist_state().await {
                    tracing::error!("Auto-persist failed: {}", e);
                }
            }
        });
    }

    let app = build_router(engine.clone(), cfg.auth_token.clone());

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    engine.shutdown();
    engine.persist_state().await?;
    Ok(())
}
