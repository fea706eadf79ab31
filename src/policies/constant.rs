//! # Constant-delay retry strategy.
//!
//! Always waits the same delay; gives up only when a limit is configured.

use std::time::Duration;

use super::retry::{step, RetryDecision, RetryState, RetryStrategy};

/// Retries after a fixed delay.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use streamvisor::{ConstantDelay, RetryDecision, RetryStrategy};
///
/// let mut strategy = ConstantDelay::new(Duration::ZERO).with_limit(1);
/// assert_eq!(strategy.next().delay(), Some(Duration::ZERO));
/// assert_eq!(strategy.next(), RetryDecision::GiveUp);
/// ```
#[derive(Clone, Debug)]
pub struct ConstantDelay {
    delay: Duration,
    limit: Option<u32>,
    state: RetryState,
}

impl ConstantDelay {
    /// Creates an unlimited strategy waiting `delay` before every retry.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            limit: None,
            state: RetryState::fresh(),
        }
    }

    /// Caps the number of retries. `0` means never retry.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl RetryStrategy for ConstantDelay {
    fn next(&mut self) -> RetryDecision {
        let delay = self.delay;
        step(&mut self.state, self.limit, |_| delay)
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
