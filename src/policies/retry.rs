//! # Retry strategy contract.
//!
//! A [`RetryStrategy`] decides, after each failed or ended upstream attempt, whether the
//! broadcaster should try again and how long to wait first. It is a pure policy object:
//! no I/O, no clocks, only a [`RetryState`] it mutates through [`next`](RetryStrategy::next)
//! and [`reset`](RetryStrategy::reset).
//!
//! ```text
//! next() ──► RetryDecision::Retry { delay, state }   attempt_count += 1
//!        └─► RetryDecision::GiveUp                    limit reached, state unchanged
//! reset() ──► attempt_count = 0, last_delay = None
//! copy()  ──► same configuration, fresh state
//! ```

use std::fmt;
use std::time::Duration;

/// Progress of one retry sequence.
///
/// Snapshots are plain values; holding one never aliases the strategy's live counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Number of retries handed out since the last reset.
    pub attempt_count: u32,
    /// Delay returned by the most recent retry, if any.
    pub last_delay: Option<Duration>,
}

impl RetryState {
    /// Returns the initial state (`attempt_count = 0`, no previous delay).
    pub const fn fresh() -> Self {
        Self {
            attempt_count: 0,
            last_delay: None,
        }
    }

    /// Returns the state after handing out `delay`.
    pub(crate) fn advanced(self, delay: Duration) -> Self {
        Self {
            attempt_count: self.attempt_count.saturating_add(1),
            last_delay: Some(delay),
        }
    }
}

/// Outcome of [`RetryStrategy::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay` before the next attempt; `state` is the strategy state after this decision.
    ///
    /// A zero delay is a valid immediate retry.
    Retry { delay: Duration, state: RetryState },
    /// The strategy is exhausted; no more attempts.
    GiveUp,
}

impl RetryDecision {
    /// Returns the delay for `Retry`, `None` for `GiveUp`.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::Retry { delay, .. } => Some(*delay),
            RetryDecision::GiveUp => None,
        }
    }
}

/// Pluggable policy computing retry delays and give-up decisions.
///
/// Implementors keep their own [`RetryState`]. The broadcaster owns its strategy exclusively
/// and works on a [`copy`](RetryStrategy::copy) of whatever the caller passed in, so callers
/// never share a live counter with a running loop.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    /// Returns the next decision and advances the internal state on `Retry`.
    fn next(&mut self) -> RetryDecision;

    /// Resets the state to [`RetryState::fresh`].
    ///
    /// Called by the broadcaster once a session has delivered its first value.
    fn reset(&mut self);

    /// Returns a new instance with identical configuration and a fresh state.
    fn copy(&self) -> Box<dyn RetryStrategy>;

    /// Returns a snapshot of the current state.
    fn state(&self) -> RetryState;

    /// Returns the maximum number of retries (`None` = unlimited).
    fn limit(&self) -> Option<u32>;

    /// Returns a string denoting the retry progress, `"(count/limit)"` or `"(count/∞)"`.
    fn progress(&self) -> String {
        let count = self.state().attempt_count;
        match self.limit() {
            Some(limit) => format!("({count}/{limit})"),
            None => format!("({count}/∞)"),
        }
    }
}

impl<'s> dyn RetryStrategy + 's {
    /// Returns an iterator over successive retry delays, ending at [`RetryDecision::GiveUp`].
    ///
    /// The iterator advances the strategy itself; an unlimited strategy yields forever.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use streamvisor::{ConstantDelay, RetryStrategy};
    ///
    /// let mut strategy: Box<dyn RetryStrategy> =
    ///     Box::new(ConstantDelay::new(Duration::from_secs(1)).with_limit(3));
    /// let delays: Vec<_> = strategy.intervals().collect();
    /// assert_eq!(delays, vec![Duration::from_secs(1); 3]);
    /// ```
    pub fn intervals(&mut self) -> Intervals<'_> {
        Intervals { strategy: self }
    }
}

/// Iterator returned by `intervals()` on a `dyn RetryStrategy`.
pub struct Intervals<'a> {
    strategy: &'a mut (dyn RetryStrategy + 'a),
}

impl Iterator for Intervals<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.strategy.next().delay()
    }
}

/// Shared `next()` skeleton: checks the limit, computes the delay, advances the state.
pub(crate) fn step(
    state: &mut RetryState,
    limit: Option<u32>,
    delay_for: impl FnOnce(&RetryState) -> Duration,
) -> RetryDecision {
    if limit.is_some_and(|limit| state.attempt_count >= limit) {
        return RetryDecision::GiveUp;
    }
    let delay = delay_for(state);
    *state = state.advanced(delay);
    RetryDecision::Retry {
        delay,
        state: *state,
    }
}
