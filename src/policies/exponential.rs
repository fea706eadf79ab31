//! # Exponential backoff retry strategy.
//!
//! The delay for retry `n` (0-indexed, counted since the last reset) is
//! `initial × multiplier^n`, clamped to `max`, then jittered and clamped again.
//! Because the base delay is derived purely from the attempt number, jitter output
//! never feeds back into subsequent calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{ExponentialBackoff, JitterPolicy, RetryStrategy};
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10))
//!     .with_jitter(JitterPolicy::None);
//!
//! assert_eq!(backoff.next().delay(), Some(Duration::from_millis(100)));
//! assert_eq!(backoff.next().delay(), Some(Duration::from_millis(200)));
//! assert_eq!(backoff.next().delay(), Some(Duration::from_millis(400)));
//! ```

use std::time::Duration;

use super::jitter::JitterPolicy;
use super::linear::{DEFAULT_MAX_INTERVAL, DEFAULT_RETRY_INTERVAL, DEFAULT_RETRY_JITTER};
use super::retry::{step, RetryDecision, RetryState, RetryStrategy};

/// Default multiplicative growth factor.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Exponential backoff with optional jitter, cap and limit.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub multiplier: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
    /// Maximum number of retries (`None` = unlimited, `Some(0)` = never retry).
    pub limit: Option<u32>,
    state: RetryState,
}

impl Default for ExponentialBackoff {
    /// Returns a strategy with:
    /// - `initial = 3s`, `multiplier = 2.0`, `max = 60s`;
    /// - up to 1s of additive jitter;
    /// - no retry limit.
    fn default() -> Self {
        Self {
            initial: DEFAULT_RETRY_INTERVAL,
            max: DEFAULT_MAX_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: JitterPolicy::Additive(DEFAULT_RETRY_JITTER),
            limit: None,
            state: RetryState::fresh(),
        }
    }
}

impl ExponentialBackoff {
    /// Creates a doubling backoff between `initial` and `max`, without jitter or limit.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            jitter: JitterPolicy::None,
            ..Self::default()
        }
    }

    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter policy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Caps the number of retries.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Computes the delay for the given state.
    ///
    /// # Notes
    /// - If `multiplier` is less than 1.0, delays decrease with higher attempts (not typical).
    /// - If `multiplier` equals 1.0, delay remains constant at `initial` (up to `max`).
    /// - Non-finite or negative intermediate values clamp to `max`.
    fn delay_for(&self, state: &RetryState) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = state.attempt_count.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.initial.as_secs_f64() * self.multiplier.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        let jittered = match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.initial.min(self.max), state.last_delay, self.max)
            }
            _ => self.jitter.apply(base),
        };
        jittered.min(self.max)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next(&mut self) -> RetryDecision {
        let mut state = self.state;
        let decision = step(&mut state, self.limit, |s| self.delay_for(s));
        self.state = state;
        decision
    }

    fn reset(&mut self) {
        self.state = RetryState::fresh();
    }

    fn copy(&self) -> Box<dyn RetryStrategy> {
        Box::new(Self {
            state: RetryState::fresh(),
            ..self.clone()
        })
    }

    fn state(&self) -> RetryState {
        self.state
    }

    fn limit(&self) -> Option<u32> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_until_cap() {
        let mut strategy = ExponentialBackoff::new(Duration::from_secs(3), Duration::from_secs(30));
        let delays: Vec<_> = (0..6).filter_map(|_| strategy.next().delay()).collect();
        assert_eq!(
            delays,
            [3, 6, 12, 24, 30, 30].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_first_exceeds_max() {
        let mut strategy = ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(strategy.next().delay(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_limit_and_reset() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10)).with_limit(2);
        assert_eq!(strategy.next().delay(), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next().delay(), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next(), RetryDecision::GiveUp);

        strategy.reset();
        assert_eq!(strategy.next().delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_huge_attempt_clamps_to_max() {
        let mut strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(60));
        let last = (0..200).filter_map(|_| strategy.next().delay()).last();
        assert_eq!(last, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_jitter_never_exceeds_max() {
        let mut strategy: Box<dyn RetryStrategy> =
            Box::new(ExponentialBackoff::default().with_limit(20));
        for delay in strategy.intervals() {
            assert!(delay <= Duration::from_secs(60));
        }
    }

    #[test]
    fn test_decorrelated_grows_from_initial() {
        let mut strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_jitter(JitterPolicy::Decorrelated);
        assert_eq!(strategy.next().delay(), Some(Duration::from_millis(100)));
        for _ in 0..20 {
            let delay = strategy.next().delay().unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(30));
        }
    }
}
