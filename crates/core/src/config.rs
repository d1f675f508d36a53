//! Tunables for the upload orchestrator and provenance index.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest accepted `fetch_concurrency`.
pub const MAX_FETCH_CONCURRENCY: usize = 256;

/// Core configuration. Every field has a default so partial config files
/// deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Upper bound on the ledger confirmation wait.
    pub confirmation_timeout_secs: u64,
    /// Maximum record fetches in flight during one listing.
    pub fetch_concurrency: usize,
    /// How long a listing is served from cache.
    pub cache_ttl_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 60,
            fetch_concurrency: 8,
            cache_ttl_secs: 30,
        }
    }
}

impl CoreConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Fan-out width, never below one.
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::ZeroConfirmationTimeout);
        }
        if self.fetch_concurrency > MAX_FETCH_CONCURRENCY {
            return Err(ConfigError::FetchConcurrencyTooHigh {
                max: MAX_FETCH_CONCURRENCY,
                actual: self.fetch_concurrency,
            });
        }
        Ok(())
    }
}
