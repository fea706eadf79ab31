//! # Linear backoff retry strategy.
//!
//! The delay for retry `n` (0-indexed, counted since the last reset) is
//! `base + increment × n`, clamped to `max`, then jittered. The base delay is derived
//! purely from the attempt number, so jitter output never feeds back into later delays.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use streamvisor::{JitterPolicy, LinearBackoff, RetryDecision, RetryStrategy};
//!
//! let mut backoff = LinearBackoff::new(Duration::from_secs(1))
//!     .with_increment(Duration::from_secs(1))
//!     .with_max(Duration::from_secs(5))
//!     .with_jitter(JitterPolicy::None)
//!     .with_limit(3);
//!
//! assert_eq!(backoff.next().delay(), Some(Duration::from_secs(1)));
//! assert_eq!(backoff.next().delay(), Some(Duration::from_secs(2)));
//! assert_eq!(backoff.next().delay(), Some(Duration::from_secs(3)));
//! assert_eq!(backoff.next(), RetryDecision::GiveUp);
//! ```

use std::time::Duration;

use super::jitter::JitterPolicy;
use super::retry::{step, RetryDecision, RetryState, RetryStrategy};

/// Default base retry interval.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Default jitter spread added on top of the retry interval.
pub const DEFAULT_RETRY_JITTER: Duration = Duration::from_secs(1);

/// Default delay cap.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Linear backoff with optional jitter and cap.
#[derive(Clone, Debug)]
pub struct LinearBackoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Amount added to the delay for every further retry.
    pub increment: Duration,
    /// Maximum delay cap (applied before and after jitter).
    pub max: Duration,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
    /// Maximum number of retries (`None` = unlimited, `Some(0)` = never retry).
    pub limit: Option<u32>,
    state: RetryState,
}

impl Default for LinearBackoff {
    /// Retries every 3s with up to 1s of additive jitter, indefinitely.
    fn default() -> Self {
        Self {
            base: DEFAULT_RETRY_INTERVAL,
            increment: Duration::ZERO,
            max: DEFAULT_MAX_INTERVAL,
            jitter: JitterPolicy::Additive(DEFAULT_RETRY_JITTER),
            limit: None,
            state: RetryState::fresh(),
        }
    }
}

impl LinearBackoff {
    /// Creates a backoff starting at `base`, without jitter or attempt limit.
    ///
    /// The increment stays `0` until [`with_increment`](Self::with_increment); the cap is
    /// `max(60s, base)`.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            jitter: JitterPolicy::None,
            max: DEFAULT_MAX_INTERVAL.max(base),
            ..Self::default()
        }
    }

    /// Sets the per-retry increment.
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    /// Sets the delay cap.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
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

    /// Computes the jittered delay for the given state without advancing it.
    fn delay_for(&self, state: &RetryState) -> Duration {
        let grown = self
            .increment
            .checked_mul(state.attempt_count)
            .and_then(|inc| self.base.checked_add(inc))
            .unwrap_or(self.max);
        let base = grown.min(self.max);

        let jittered = match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.base.min(self.max), state.last_delay, self.max)
            }
            _ => self.jitter.apply(base),
        };
        match self.jitter {
            // Additive jitter is the documented "interval + spread"; it may exceed the cap.
            JitterPolicy::Additive(_) => jittered,
            _ => jittered.min(self.max),
        }
    }
}

impl RetryStrategy for LinearBackoff {
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
