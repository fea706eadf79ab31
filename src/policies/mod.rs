//! Retry strategies.
//!
//! This module groups the knobs that control **whether** a broadcaster reconnects
//! after its upstream stream fails or ends, and **how long** it waits first.
//!
//! ## Contents
//! - [`RetryStrategy`] the policy contract (`next` / `reset` / `copy`)
//! - [`ConstantDelay`] same delay every time
//! - [`LinearBackoff`] `base + increment × n`, capped, optional jitter
//! - [`ExponentialBackoff`] `initial × multiplier^n`, capped, optional jitter
//! - [`JitterPolicy`] randomization strategy to avoid thundering herd
//! - [`RetryConfig`] explicit configuration constructor selecting one of the above
//!
//! ## Quick wiring
//! ```text
//! BroadcasterBuilder::with_retry(strategy)
//!      └─► strategy.copy()  (fresh state, owned by the background loop)
//!           └─► core::actor::StreamActor uses:
//!                - next()  after every failed/ended attempt
//!                - reset() once a session delivers its first value
//! ```
//!
//! ## Defaults
//! - `LinearBackoff::default()` → every 3s, up to 1s additive jitter, unlimited.
//! - `ExponentialBackoff::default()` → 3s doubling up to 60s, up to 1s additive jitter, unlimited.
//! - `JitterPolicy::None` when built through `new(..)` constructors.

mod constant;
mod exponential;
mod jitter;
mod linear;
mod retry;

use std::time::Duration;

pub use constant::ConstantDelay;
pub use exponential::ExponentialBackoff;
pub use jitter::JitterPolicy;
pub use linear::LinearBackoff;
pub use retry::{Intervals, RetryDecision, RetryState, RetryStrategy};

/// Declarative selection of a retry strategy.
///
/// Useful when the strategy comes from configuration rather than code.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use streamvisor::{JitterPolicy, RetryConfig};
///
/// let mut strategy = RetryConfig::Linear {
///     base: Duration::from_secs(1),
///     increment: Duration::from_secs(1),
///     max: Duration::from_secs(5),
///     jitter: JitterPolicy::None,
///     limit: Some(3),
/// }
/// .build();
///
/// assert_eq!(strategy.next().delay(), Some(Duration::from_secs(1)));
/// assert_eq!(strategy.progress(), "(1/3)");
/// ```
#[derive(Clone, Debug)]
pub enum RetryConfig {
    /// See [`ConstantDelay`].
    Constant {
        delay: Duration,
        limit: Option<u32>,
    },
    /// See [`LinearBackoff`].
    Linear {
        base: Duration,
        increment: Duration,
        max: Duration,
        jitter: JitterPolicy,
        limit: Option<u32>,
    },
    /// See [`ExponentialBackoff`].
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
        jitter: JitterPolicy,
        limit: Option<u32>,
    },
}

impl Default for RetryConfig {
    /// Same as [`LinearBackoff::default`].
    fn default() -> Self {
        let d = LinearBackoff::default();
        RetryConfig::Linear {
            base: d.base,
            increment: d.increment,
            max: d.max,
            jitter: d.jitter,
            limit: d.limit,
        }
    }
}

impl RetryConfig {
    /// Builds a strategy with a fresh state.
    pub fn build(&self) -> Box<dyn RetryStrategy> {
        match *self {
            RetryConfig::Constant { delay, limit } => {
                let strategy = ConstantDelay::new(delay);
                Box::new(match limit {
                    Some(n) => strategy.with_limit(n),
                    None => strategy,
                })
            }
            RetryConfig::Linear {
                base,
                increment,
                max,
                jitter,
                limit,
            } => {
                let mut strategy = LinearBackoff::new(base)
                    .with_increment(increment)
                    .with_max(max)
                    .with_jitter(jitter);
                strategy.limit = limit;
                Box::new(strategy)
            }
            RetryConfig::Exponential {
                initial,
                max,
                multiplier,
                jitter,
                limit,
            } => {
                let mut strategy = ExponentialBackoff::new(initial, max)
                    .with_multiplier(multiplier)
                    .with_jitter(jitter);
                strategy.limit = limit;
                Box::new(strategy)
            }
        }
    }
}
