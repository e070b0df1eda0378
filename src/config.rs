//! Configuration management

use std::{collections::HashMap, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct GatewayConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Downstream orders service configuration
    pub orders: OrdersConfig,
    /// Default circuit breaker configuration for all dependencies
    pub breaker: CircuitBreakerConfig,
    /// Per-dependency breaker overrides, applied before first use
    pub dependencies: HashMap<String, CircuitBreakerConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Downstream orders service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// Base URL of the orders service
    pub base_url: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8070/orders".to_string(),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio at or above which the breaker opens, in (0, 1]
    pub failure_rate_threshold: f64,
    /// Minimum recorded calls before the ratio is evaluated
    pub minimum_calls: u32,
    /// Number of most recent call outcomes retained
    pub window_size: u32,
    /// Time to wait in the open state before probing recovery
    #[serde(with = "humantime_serde")]
    pub open_cooldown: Duration,
    /// Trial calls permitted while half-open
    pub half_open_trials: u32,
    /// Per-call timeout enforced on the wrapped operation
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_calls: 10,
            window_size: 20,
            open_cooldown: Duration::from_secs(30),
            half_open_trials: 3,
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "failure_rate_threshold must be in (0, 1], got {}",
                self.failure_rate_threshold
            )));
        }
        if self.minimum_calls == 0 {
            return Err(Error::Config("minimum_calls must be >= 1".to_string()));
        }
        if self.window_size < self.minimum_calls {
            return Err(Error::Config(format!(
                "window_size ({}) must be >= minimum_calls ({})",
                self.window_size, self.minimum_calls
            )));
        }
        if self.open_cooldown.is_zero() {
            return Err(Error::Config("open_cooldown must be > 0".to_string()));
        }
        if self.half_open_trials == 0 {
            return Err(Error::Config("half_open_trials must be >= 1".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::Config("call_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or contains an invalid breaker configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (ORDERS_GATEWAY_ prefix)
        figment = figment.merge(Env::prefixed("ORDERS_GATEWAY_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.breaker.validate()?;
        for (name, breaker) in &config.dependencies {
            breaker
                .validate()
                .map_err(|e| Error::Config(format!("dependency '{name}': {e}")))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_breaker_config_is_valid() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let config = CircuitBreakerConfig {
            failure_rate_threshold: 1.5,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            failure_rate_threshold: 0.0,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_window_smaller_than_minimum() {
        let config = CircuitBreakerConfig {
            minimum_calls: 10,
            window_size: 5,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_durations_and_counts() {
        let config = CircuitBreakerConfig {
            open_cooldown: Duration::ZERO,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            half_open_trials: 0,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            call_timeout: Duration::ZERO,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = GatewayConfig::load(Some(Path::new("/nonexistent/gateway.yaml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn defaults_when_no_file_given() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.orders.base_url, "http://localhost:8070/orders");
        assert_eq!(config.breaker.minimum_calls, 10);
    }
}
