//! Sliding window of recent call outcomes

use std::collections::VecDeque;

/// Outcome of a single wrapped call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Operation returned normally
    Success,
    /// Operation completed with an error (includes caller-side cancellation)
    Failure,
    /// Operation exceeded the per-call deadline
    Timeout,
    /// Permission was denied; the operation never ran
    ShortCircuited,
}

impl Outcome {
    /// Timeouts count as failures for ratio purposes
    pub(crate) fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::Timeout)
    }
}

/// Fixed-capacity ring of the most recent outcomes, oldest evicted on
/// overflow. Failure count is maintained incrementally so the ratio is O(1).
///
/// Short-circuited denials never enter the window; they are tracked on a
/// separate counter by the breaker.
#[derive(Debug)]
pub(crate) struct MetricsWindow {
    outcomes: VecDeque<Outcome>,
    capacity: usize,
    failures: u32,
}

impl MetricsWindow {
    pub(crate) fn new(capacity: u32) -> Self {
        let capacity = capacity as usize;
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    /// Append an outcome, evicting the oldest entry when full
    pub(crate) fn record(&mut self, outcome: Outcome) {
        if self.outcomes.len() == self.capacity
            && let Some(evicted) = self.outcomes.pop_front()
            && evicted.is_failure()
        {
            self.failures -= 1;
        }
        if outcome.is_failure() {
            self.failures += 1;
        }
        self.outcomes.push_back(outcome);
    }

    pub(crate) fn total(&self) -> u32 {
        self.outcomes.len() as u32
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    /// Rolling failure ratio; 0.0 while the window is empty. Callers gate on
    /// `total()` against their minimum-calls threshold before acting on this.
    pub(crate) fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        f64::from(self.failures) / self.outcomes.len() as f64
    }

    pub(crate) fn reset(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tracks_failures_and_ratio() {
        let mut window = MetricsWindow::new(4);
        assert_eq!(window.failure_ratio(), 0.0);

        window.record(Outcome::Success);
        window.record(Outcome::Failure);
        window.record(Outcome::Timeout);

        assert_eq!(window.total(), 3);
        assert_eq!(window.failures(), 2);
        assert!((window.failure_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn eviction_adjusts_failure_count() {
        let mut window = MetricsWindow::new(2);
        window.record(Outcome::Failure);
        window.record(Outcome::Failure);
        // Oldest failure falls out
        window.record(Outcome::Success);

        assert_eq!(window.total(), 2);
        assert_eq!(window.failures(), 1);
        assert_eq!(window.failure_ratio(), 0.5);
    }

    #[test]
    fn timeout_counts_as_failure() {
        let mut window = MetricsWindow::new(4);
        window.record(Outcome::Timeout);
        assert_eq!(window.failures(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = MetricsWindow::new(4);
        window.record(Outcome::Failure);
        window.record(Outcome::Success);
        window.reset();

        assert_eq!(window.total(), 0);
        assert_eq!(window.failures(), 0);
        assert_eq!(window.failure_ratio(), 0.0);
    }
}
