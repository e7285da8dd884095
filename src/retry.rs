//! Reconnect backoff with jitter

use std::time::Duration;

use rand::Rng;

/// Backoff parameters for broker reconnects
///
/// The delay after the `n`th failed attempt (0-based) is
/// `min(base_interval * 2^n, max_interval) + uniform(0, jitter_span)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry (doubles each attempt)
    pub base_interval: Duration,
    /// Cap applied before jitter is added
    pub max_interval: Duration,
    /// Upper bound of the uniform jitter
    pub jitter_span: Duration,
    /// Failed attempts allowed before giving up
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
            jitter_span: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Compute the delay that follows failed attempt `attempt`
    pub fn next_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponential = self
            .base_interval
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = exponential.min(self.max_interval);

        let jitter_ms = u64::try_from(self.jitter_span.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return capped;
        }

        capped + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }

    /// Largest delay this policy can produce
    pub fn saturated_delay(&self) -> Duration {
        self.max_interval + self.jitter_span
    }
}

/// Attempt counter owned by a single reconnect loop
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Failed attempts recorded since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Record a failed attempt
    ///
    /// Returns the delay to wait before trying again, or `None` once the
    /// attempt budget is spent.
    pub fn fail<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Duration> {
        let failed = self.attempt;
        self.attempt = self.attempt.saturating_add(1).min(self.policy.max_attempts);

        if self.exhausted() {
            return None;
        }

        Some(self.policy.next_delay(failed, rng))
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
