//! REST API Routes Module
//!
//! - `/docs` flat document CRUD
//! - `/big-docs` expanded trees
//! - `/health` liveness and cache figures

pub mod big_docs;
pub mod docs;
pub mod health;

use axum::{
    http::{header, Method, Uri},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete router over a shared document service.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/docs", docs::create_router(state.clone()))
        .nest("/big-docs", big_docs::create_router(state.clone()))
        .nest("/health", health::create_router(state))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer()),
        )
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
