//! Arbor API Server Entry Point
//!
//! Loads configuration, builds the document service, starts the cache
//! sweeper and serves the HTTP API until Ctrl-C.

use arbor_api::telemetry::{init_tracing, TelemetryConfig};
use arbor_api::{build_state, create_api_router, load_config, ApiConfig, ApiError, ApiResult};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = load_config()?;
    let api_config = ApiConfig::from_env()?;
    tracing::info!(
        nesting_level = config.nesting_level,
        ttl_secs = config.cache.ttl_secs,
        sweep_interval_secs = config.cache.sweep_interval_secs,
        collection = %config.store.collection,
        "configuration loaded"
    );

    let state = build_state(config)?;
    let sweeper = state.spawn_sweeper();
    if sweeper.is_none() {
        tracing::info!("cache sweeper disabled");
    }

    let app = create_api_router(state);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Arbor API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}
