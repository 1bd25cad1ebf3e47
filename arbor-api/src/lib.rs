//! Arbor API - HTTP Layer
//!
//! A thin axum surface over [`arbor_tree::DocumentService`]: JSON routes for
//! documents and expanded trees, configuration loading, and logging setup
//! for the server binary.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{load_config, ApiConfig, ConfigLoadError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::{build_state, AppState};
