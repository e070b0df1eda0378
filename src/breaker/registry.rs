//! Process-wide registry of named circuit breakers

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::circuit::{BreakerSnapshot, CircuitBreaker};
use crate::Result;
use crate::config::CircuitBreakerConfig;

/// Named collection of independent breakers, one per logical downstream
/// dependency. Breakers are created lazily on first use and persist for the
/// life of the process; there is no deletion.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    /// Per-dependency configs staged before first use
    overrides: DashMap<String, CircuitBreakerConfig>,
    default_config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    /// Create a registry with a default configuration for new breakers
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            overrides: DashMap::new(),
            default_config,
        }
    }

    /// Return the breaker for `name`, creating it on first use.
    ///
    /// Creation is idempotent under concurrent callers: the entry lock
    /// serializes first callers per key, so at most one instance ever exists
    /// per name.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(name) {
            return Arc::clone(&breaker);
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            let config = self
                .overrides
                .remove(name)
                .map_or_else(|| self.default_config.clone(), |(_, config)| config);
            debug!(dependency = name, "Creating circuit breaker");
            Arc::new(CircuitBreaker::new(name, config))
        });
        Arc::clone(&entry)
    }

    /// Stage a per-dependency configuration to be used when the breaker is
    /// first created. A no-op once the breaker exists
    /// (last-writer-before-first-use only).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn configure(&self, name: &str, config: CircuitBreakerConfig) -> Result<()> {
        config.validate()?;

        if self.breakers.contains_key(name) {
            debug!(dependency = name, "Breaker already created, configure ignored");
            return Ok(());
        }

        self.overrides.insert(name.to_string(), config);
        Ok(())
    }

    /// Snapshots of all breakers, for observability
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
