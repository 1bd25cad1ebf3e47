//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::Depth;

/// TTL cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Lifetime of an entry since its last access, in seconds.
    pub ttl_secs: u64,
    /// Period of the expiry sweep, in seconds. 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

/// Backing store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Connection target, e.g. `memory://`.
    pub target: String,
    /// Collection holding the documents.
    pub collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            target: "memory://".to_string(),
            collection: "documents".to_string(),
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArborConfig {
    /// Maximum permitted `height + Depth` for any node.
    pub nesting_level: Depth,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl Default for ArborConfig {
    fn default() -> Self {
        Self {
            nesting_level: 5,
            cache: CacheSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl ArborConfig {
    pub fn with_nesting_level(mut self, nesting_level: Depth) -> Self {
        self.nesting_level = nesting_level;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nesting_level == 0 {
            return Err(ConfigError::InvalidValue {
                field: "nesting_level".to_string(),
                value: self.nesting_level.to_string(),
                reason: "must allow at least one level of nesting".to_string(),
            });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs".to_string(),
                value: "0".to_string(),
                reason: "entries would expire immediately".to_string(),
            });
        }
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store.collection".to_string(),
            });
        }
        Ok(())
    }
}
