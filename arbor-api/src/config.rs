//! API Configuration Module
//!
//! Server settings and the core [`ArborConfig`] are read from environment
//! variables with development defaults. A YAML file named by
//! `ARBOR_CONFIG_PATH` replaces the environment-derived core config.

use std::net::SocketAddr;
use std::path::PathBuf;

use arbor_core::{ArborConfig, ConfigError};
use thiserror::Error;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_VAR: &str = "ARBOR_CONFIG_PATH";

/// Errors raised while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Bind settings for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ARBOR_API_HOST`: Bind host (default: 0.0.0.0)
    /// - `ARBOR_API_PORT`: Bind port (default: 8080)
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("ARBOR_API_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "ARBOR_API_PORT", defaults.port)?,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigLoadError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigLoadError::InvalidEnv {
            var: "ARBOR_API_HOST".to_string(),
            value: self.host.clone(),
        })
    }
}

// ============================================================================
// CORE CONFIGURATION
// ============================================================================

/// Load the core config from the process environment.
pub fn load_config() -> Result<ArborConfig, ConfigLoadError> {
    load_config_from(|var| std::env::var(var).ok())
}

/// Load the core config from an arbitrary variable lookup.
///
/// Environment variables:
/// - `ARBOR_NESTING_LEVEL` (default: 5)
/// - `ARBOR_CACHE_TTL_SECS` (default: 300)
/// - `ARBOR_CACHE_SWEEP_SECS` (default: 60, 0 disables the sweeper)
/// - `ARBOR_STORE_TARGET` (default: memory://)
/// - `ARBOR_COLLECTION` (default: documents)
/// - `ARBOR_CONFIG_PATH`: YAML file used instead of the variables above
pub fn load_config_from<F>(lookup: F) -> Result<ArborConfig, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match lookup(CONFIG_PATH_VAR) {
        Some(path) if !path.trim().is_empty() => read_yaml(PathBuf::from(path))?,
        _ => from_vars(&lookup)?,
    };
    config.validate()?;
    Ok(config)
}

fn from_vars<F>(lookup: &F) -> Result<ArborConfig, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ArborConfig::default();
    config.nesting_level = parse_var(lookup, "ARBOR_NESTING_LEVEL", config.nesting_level)?;
    config.cache.ttl_secs = parse_var(lookup, "ARBOR_CACHE_TTL_SECS", config.cache.ttl_secs)?;
    config.cache.sweep_interval_secs = parse_var(
        lookup,
        "ARBOR_CACHE_SWEEP_SECS",
        config.cache.sweep_interval_secs,
    )?;
    if let Some(target) = lookup("ARBOR_STORE_TARGET") {
        config.store.target = target;
    }
    if let Some(collection) = lookup("ARBOR_COLLECTION") {
        config.store.collection = collection;
    }
    Ok(config)
}

fn read_yaml(path: PathBuf) -> Result<ArborConfig, ConfigLoadError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigLoadError::Read {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigLoadError::Parse { path, source })
}

fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigLoadError::InvalidEnv {
            var: var.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
