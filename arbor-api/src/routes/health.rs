//! Health Check Endpoint
//!
//! `GET /health` reports liveness together with store and cache figures.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub version: String,
    pub uptime_seconds: u64,
    pub documents: usize,
    pub cache: CacheHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub service: AppState,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(service: AppState) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let stats = state.service.cache().stats();
    let cache = CacheHealth {
        entries: stats.entry_count,
        hits: stats.hits,
        misses: stats.misses,
        evictions: stats.evictions,
        hit_rate: stats.hit_rate(),
    };

    match state.service.store().len() {
        Ok(documents) => {
            let response = HealthResponse {
                status: HealthStatus::Healthy,
                message: None,
                details: Some(HealthDetails {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_seconds: state.start_time.elapsed().as_secs(),
                    documents,
                    cache,
                }),
            };
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            tracing::error!(error = %e, "store health check failed");
            let response = HealthResponse {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Store check failed: {}", e)),
                details: None,
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(response))
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(service: AppState) -> Router {
    let state = Arc::new(HealthState::new(service));
    Router::new().route("/", get(health)).with_state(state)
}
