//! # Retry policy module
//!
//! This module provides [`RetryPolicy`], parameterizing the bounded
//! exponential backoff applied by [`crate::controller::Controller`] between
//! failed reconciliation attempts.

use std::time::Duration;

// -----------------------------------------------------------------------------
// RetryPolicy structure

/// `{maxAttempts, initialDelayMs, delayMultiplier}`. Defaults match the
/// configuration surface: at most one attempt, no delay, multiplier 2 — i.e.
/// retrying is opt-in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    delay_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(0),
            delay_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Builds a new policy. `max_attempts` is clamped to at least 1 and
    /// `delay_multiplier` to at least 1.0, matching the invariants in the
    /// data model (`maxAttempts: int >= 1`, `delayMultiplier: number >= 1`).
    pub fn new(max_attempts: u32, initial_delay: Duration, delay_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            delay_multiplier: delay_multiplier.max(1.0),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn delay_multiplier(&self) -> f64 {
        self.delay_multiplier
    }

    /// Returns a [`Backoff`] iterator-like cursor starting at
    /// `initial_delay`, doubling (or whatever multiplier is configured) on
    /// every call to [`Backoff::next_delay`].
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay,
            multiplier: self.delay_multiplier,
        }
    }
}

// -----------------------------------------------------------------------------
// Backoff cursor

/// A cursor over successive backoff delays. Not a [`std::iter::Iterator`]
/// since it never ends and the caller (the controller's attempt loop) always
/// knows exactly how many delays it needs.
pub struct Backoff {
    next: Duration,
    multiplier: f64,
}

impl Backoff {
    /// Returns the delay to sleep before the next attempt, and advances the
    /// cursor by `delay_multiplier`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.mul_f64(self.multiplier);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_a_single_attempt_with_no_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.initial_delay(), Duration::from_millis(0));
    }

    #[test]
    fn max_attempts_is_clamped_to_at_least_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), 2.0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn delay_multiplier_is_clamped_to_at_least_one() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 0.5);
        assert_eq!(policy.delay_multiplier(), 1.0);
    }

    #[test]
    fn backoff_grows_by_the_configured_multiplier() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), 2.0);
        let mut backoff = policy.backoff();

        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
    }
}
