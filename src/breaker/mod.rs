//! Failure handling: circuit breaker state machine, sliding outcome window,
//! named breaker registry, and the call executor that ties them together

mod circuit;
mod executor;
mod registry;
mod window;

pub use circuit::{BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use executor::CallExecutor;
pub use registry::BreakerRegistry;
pub use window::Outcome;
