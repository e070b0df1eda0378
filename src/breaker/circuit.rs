//! Circuit breaker state machine

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::window::{MetricsWindow, Outcome};
use crate::config::CircuitBreakerConfig;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed (calls pass through)
    Closed,
    /// Circuit is open (calls are short-circuited to the fallback)
    Open,
    /// Circuit is half-open (a bounded number of trial calls probe recovery)
    HalfOpen,
}

/// Result of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// The call may proceed; the executor must record exactly one outcome
    Allowed,
    /// The call must be short-circuited to the fallback
    Denied,
}

/// Serializable view of a breaker for observability endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Dependency name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Outcomes currently held in the sliding window
    pub window_total: u32,
    /// Failures (including timeouts) currently held in the window
    pub window_failures: u32,
    /// Rolling failure ratio over the window
    pub failure_ratio: f64,
    /// Calls denied without a downstream attempt, since creation
    pub short_circuited: u64,
}

/// Fault-detection state machine for one named downstream dependency.
///
/// All bookkeeping (state, window, trial counters) lives behind one mutex so
/// that a permission check or an outcome record is an atomic unit, and a
/// transition triggered by one caller is visible to the very next `permit`
/// from any caller. The lock is never held across downstream I/O.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    short_circuits: AtomicU64,
}

struct Inner {
    state: CircuitState,
    entered_at: Instant,
    window: MetricsWindow,
    /// Trial permits issued in the current half-open phase
    trial_permits: u32,
    /// Successes recorded in the current half-open phase
    trial_successes: u32,
}

impl CircuitBreaker {
    /// Create a new breaker in the closed state
    #[must_use]
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        let window = MetricsWindow::new(config.window_size);
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                entered_at: Instant::now(),
                window,
                trial_permits: 0,
                trial_successes: 0,
            }),
            short_circuits: AtomicU64::new(0),
        }
    }

    /// Ask whether a call may proceed.
    ///
    /// Closed always allows. Open denies until the cooldown has elapsed since
    /// entering the state, then flips to half-open and consumes the first
    /// trial permit. Half-open allows until the trial budget is exhausted;
    /// the budget is never over-granted under concurrent callers.
    pub fn permit(&self) -> Permit {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Permit::Allowed,
            CircuitState::Open => {
                if inner.entered_at.elapsed() >= self.config.open_cooldown {
                    debug!(dependency = %self.name, "Cooldown elapsed, probing recovery");
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_permits = 1;
                    Permit::Allowed
                } else {
                    trace!(dependency = %self.name, "Circuit open, denying call");
                    Permit::Denied
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_permits < self.config.half_open_trials {
                    inner.trial_permits += 1;
                    Permit::Allowed
                } else {
                    trace!(dependency = %self.name, "Trial budget exhausted, denying call");
                    Permit::Denied
                }
            }
        }
    }

    /// Record the outcome of a call and re-evaluate transitions.
    ///
    /// Short-circuited outcomes only bump the observability counter; they
    /// never enter the ratio window.
    pub fn record(&self, outcome: Outcome) {
        if outcome == Outcome::ShortCircuited {
            self.short_circuits.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.window.record(outcome);
                if inner.window.total() >= self.config.minimum_calls
                    && inner.window.failure_ratio() >= self.config.failure_rate_threshold
                {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.window.record(outcome);
                if outcome.is_failure() {
                    // First failure during the trial phase discards all
                    // trial progress.
                    self.transition(&mut inner, CircuitState::Open);
                } else {
                    inner.trial_successes += 1;
                    if inner.trial_successes >= self.config.half_open_trials {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
            }
            CircuitState::Open => {
                // A call permitted in half-open may still be in flight when a
                // sibling failure reopens the circuit; its late outcome is
                // ignored.
                trace!(dependency = %self.name, ?outcome, "Outcome ignored in open state");
            }
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Per-call timeout from this breaker's configuration
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.config.call_timeout
    }

    /// Dependency name this breaker guards
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observability snapshot
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            window_total: inner.window.total(),
            window_failures: inner.window.failures(),
            failure_ratio: inner.window.failure_ratio(),
            short_circuited: self.short_circuits.load(Ordering::Relaxed),
        }
    }

    /// Transition to a new state; caller holds the lock
    fn transition(&self, inner: &mut Inner, new_state: CircuitState) {
        if inner.state == new_state {
            return;
        }

        inner.state = new_state;
        inner.entered_at = Instant::now();

        match new_state {
            CircuitState::Closed => {
                inner.window.reset();
                inner.trial_permits = 0;
                inner.trial_successes = 0;
                info!(dependency = %self.name, "Circuit breaker closed");
            }
            CircuitState::Open => {
                warn!(
                    dependency = %self.name,
                    failures = inner.window.failures(),
                    total = inner.window.total(),
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.trial_permits = 0;
                inner.trial_successes = 0;
                debug!(dependency = %self.name, "Circuit breaker half-open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 0.5,
            minimum_calls: 4,
            window_size: 4,
            open_cooldown: Duration::from_millis(50),
            half_open_trials: 2,
            call_timeout: Duration::from_millis(100),
        }
    }

    fn open_breaker() -> CircuitBreaker {
        let cb = CircuitBreaker::new("test", test_config());
        cb.record(Outcome::Success);
        cb.record(Outcome::Failure);
        cb.record(Outcome::Failure);
        cb.record(Outcome::Failure);
        assert_eq!(cb.state(), CircuitState::Open);
        cb
    }

    #[test]
    fn starts_closed_and_allows() {
        let cb = CircuitBreaker::new("test", test_config());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.permit(), Permit::Allowed);
    }

    #[test]
    fn opens_on_the_call_that_crosses_the_threshold() {
        let cb = CircuitBreaker::new("test", test_config());

        cb.record(Outcome::Success);
        cb.record(Outcome::Failure);
        cb.record(Outcome::Failure);
        // 2/3 failures but below minimum_calls, must stay closed
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record(Outcome::Failure);
        // 3/4 >= 0.5
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.permit(), Permit::Denied);
    }

    #[test]
    fn stays_closed_below_minimum_calls() {
        let cb = CircuitBreaker::new("test", test_config());
        cb.record(Outcome::Failure);
        cb.record(Outcome::Failure);
        cb.record(Outcome::Failure);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn denies_until_cooldown_then_goes_half_open() {
        let cb = open_breaker();

        assert_eq!(cb.permit(), Permit::Denied);
        assert_eq!(cb.permit(), Permit::Denied);

        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cb.permit(), Permit::Allowed);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_caps_trial_permits() {
        let cb = open_breaker();
        std::thread::sleep(Duration::from_millis(60));

        // First permit flips to half-open and takes the first trial slot
        assert_eq!(cb.permit(), Permit::Allowed);
        assert_eq!(cb.permit(), Permit::Allowed);
        assert_eq!(cb.permit(), Permit::Denied);
        assert_eq!(cb.permit(), Permit::Denied);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = open_breaker();
        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cb.permit(), Permit::Allowed);
        cb.record(Outcome::Success);
        assert_eq!(cb.permit(), Permit::Allowed);
        cb.record(Outcome::Failure);

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.permit(), Permit::Denied);
    }

    #[test]
    fn half_open_timeout_counts_as_failure() {
        let cb = open_breaker();
        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cb.permit(), Permit::Allowed);
        cb.record(Outcome::Timeout);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn trial_successes_close_and_reset_the_window() {
        let cb = open_breaker();
        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cb.permit(), Permit::Allowed);
        cb.record(Outcome::Success);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert_eq!(cb.permit(), Permit::Allowed);
        cb.record(Outcome::Success);
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.window_total, 0);
        assert_eq!(snapshot.window_failures, 0);

        // A single failure right after the reset must not reopen
        cb.record(Outcome::Failure);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn short_circuits_only_bump_the_counter() {
        let cb = open_breaker();
        let before = cb.snapshot();

        cb.record(Outcome::ShortCircuited);
        cb.record(Outcome::ShortCircuited);

        let after = cb.snapshot();
        assert_eq!(after.short_circuited, before.short_circuited + 2);
        assert_eq!(after.window_total, before.window_total);
        assert_eq!(after.state, CircuitState::Open);
    }

    #[test]
    fn no_over_grant_under_concurrent_permits() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let cb = Arc::new(open_breaker());
        std::thread::sleep(Duration::from_millis(60));

        let granted = Arc::new(AtomicU32::new(0));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let cb = Arc::clone(&cb);
                let granted = Arc::clone(&granted);
                s.spawn(move || {
                    if cb.permit() == Permit::Allowed {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(granted.load(Ordering::Relaxed), 2);
    }
}
