//! Orders Gateway Library
//!
//! A resilient outbound-call gateway: each downstream call is wrapped in a
//! named circuit breaker with a deterministic fallback, so an outage in the
//! orders service degrades to a canned catalog instead of an error on the
//! request path.
//!
//! # Features
//!
//! - **Circuit breakers**: sliding-window failure ratio, lazy cooldown,
//!   bounded half-open trial calls
//! - **Fallbacks**: per-call fallback substitution with no double fallback
//! - **Registry**: one independent breaker per logical dependency,
//!   created on first use
//! - **Observability**: per-breaker snapshots, structured logging

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod cli;
pub mod config;
pub mod error;
pub mod orders;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
