//! Call executor: wraps a downstream invocation with breaker bookkeeping
//! and fallback substitution

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::circuit::Permit;
use super::registry::BreakerRegistry;
use super::window::Outcome;
use crate::{Error, Result};

/// Sole entry point used by request-handling code to call a downstream
/// dependency under circuit-breaker protection.
pub struct CallExecutor {
    registry: Arc<BreakerRegistry>,
}

impl CallExecutor {
    /// Create an executor over a breaker registry
    #[must_use]
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry, for configuration and observability
    #[must_use]
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Execute `operation` against the dependency named `dependency`,
    /// substituting `fallback` when the call is denied or fails.
    ///
    /// Exactly one outcome is recorded per call: success, failure, timeout,
    /// or short-circuit. The breaker lock is only held for bookkeeping, never
    /// across the operation's I/O. On timeout the operation future is
    /// dropped, so a late completion can never overwrite the recorded
    /// outcome. If the caller abandons this future mid-call, the drop guard
    /// records a failure so the trial budget and window stay consistent.
    ///
    /// # Errors
    ///
    /// Denials, operation failures and timeouts are converted into a fallback
    /// invocation and never escape. Only an error from the fallback itself is
    /// returned, unmodified.
    pub async fn execute<T, Op, OpFut, Fb, FbFut>(
        &self,
        dependency: &str,
        operation: Op,
        fallback: Fb,
    ) -> Result<T>
    where
        Op: FnOnce() -> OpFut,
        OpFut: Future<Output = Result<T>>,
        Fb: FnOnce(Error) -> FbFut,
        FbFut: Future<Output = Result<T>>,
    {
        let breaker = self.registry.get(dependency);

        if breaker.permit() == Permit::Denied {
            breaker.record(Outcome::ShortCircuited);
            warn!(dependency, "Circuit open, serving fallback");
            return fallback(Error::CircuitOpen(dependency.to_string())).await;
        }

        let timeout = breaker.call_timeout();
        let start = Instant::now();
        let mut guard = OutcomeGuard::new(&breaker);

        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => {
                guard.resolve(Outcome::Success);
                debug!(
                    dependency,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Call succeeded"
                );
                Ok(value)
            }
            Ok(Err(err)) => {
                guard.resolve(Outcome::Failure);
                warn!(dependency, error = %err, "Call failed, serving fallback");
                fallback(err).await
            }
            Err(_elapsed) => {
                guard.resolve(Outcome::Timeout);
                warn!(
                    dependency,
                    timeout_ms = timeout.as_millis() as u64,
                    "Call timed out, serving fallback"
                );
                fallback(Error::Timeout {
                    dependency: dependency.to_string(),
                    timeout,
                })
                .await
            }
        }
    }
}

/// Records a failure if the caller abandons the call between being granted a
/// permit and the outcome being recorded. Caller-side cancellation is a
/// failure, not an unrecorded call.
struct OutcomeGuard<'a> {
    breaker: &'a super::circuit::CircuitBreaker,
    recorded: bool,
}

impl<'a> OutcomeGuard<'a> {
    fn new(breaker: &'a super::circuit::CircuitBreaker) -> Self {
        Self {
            breaker,
            recorded: false,
        }
    }

    fn resolve(&mut self, outcome: Outcome) {
        self.recorded = true;
        self.breaker.record(outcome);
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            warn!(dependency = %self.breaker.name(), "Call abandoned, recording failure");
            self.breaker.record(Outcome::Failure);
        }
    }
}
