//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many broadcasters
//! reconnecting to the same upstream do not retry in lockstep.
//!
//! - [`JitterPolicy::None`]: no randomization, predictable delays
//! - [`JitterPolicy::Full`]: random delay in [0, delay] (most aggressive)
//! - [`JitterPolicy::Equal`]: delay/2 + random[0, delay/2] (balanced)
//! - [`JitterPolicy::Proportional`]: delay × random[1-j, 1+j]
//! - [`JitterPolicy::Additive`]: delay + random[0, d]
//! - [`JitterPolicy::Decorrelated`]: random[base, prev × 3], capped (needs the previous delay)

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
///
/// ## Trade-offs
/// - **None**: Predictable, but risks thundering herd
/// - **Full**: Maximum randomness, can shrink the delay to zero
/// - **Equal**: Balanced, never below half of the base delay
/// - **Proportional**: Symmetric spread around the base delay
/// - **Additive**: Never below the base delay; the spread does not grow with it
/// - **Decorrelated**: Stateful, grows independently of the attempt number
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    #[default]
    None,

    /// Full jitter: random delay in [0, delay].
    Full,

    /// Equal jitter: delay/2 + random[0, delay/2].
    Equal,

    /// Proportional jitter: delay multiplied by a uniform factor in `[1 - j, 1 + j]`.
    ///
    /// `j` is clamped to `[0.0, 1.0]`.
    Proportional(f64),

    /// Additive jitter: delay plus a uniform amount in `[0, d]`.
    Additive(Duration),

    /// Decorrelated jitter: random[base, prev_delay × 3], capped at max.
    ///
    /// Requires context (base, prev, max) via [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    ///
    /// ### Note
    /// For `Decorrelated`, this method returns the input unchanged.
    /// Use [`apply_decorrelated`](Self::apply_decorrelated) instead,
    /// as it requires additional context (previous delay, base, max).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
            JitterPolicy::Proportional(j) => proportional_jitter(delay, *j),
            JitterPolicy::Additive(spread) => additive_jitter(delay, *spread),
            JitterPolicy::Decorrelated => delay,
        }
    }

    /// Applies decorrelated jitter with full context.
    ///
    /// `prev` is the last delay handed out; without one (first retry) the base is returned.
    ///
    /// ### Note
    /// If called on non-Decorrelated policy, falls back to `apply(base)`.
    pub fn apply_decorrelated(
        &self,
        base: Duration,
        prev: Option<Duration>,
        max: Duration,
    ) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(base);
        }
        let Some(prev) = prev else {
            return base.min(max);
        };

        let base_ms = base.as_millis() as u64;
        let prev_ms = prev.as_millis() as u64;
        let max_ms = max.as_millis() as u64;

        let upper_bound = (prev_ms.saturating_mul(3)).min(max_ms);
        let clamped_upper = upper_bound.max(base_ms);

        if base_ms >= clamped_upper {
            return base.min(max);
        }

        let jittered_ms = rand::rng().random_range(base_ms..=clamped_upper);
        Duration::from_millis(jittered_ms)
    }
}

/// Full jitter: random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// Equal jitter: delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}

/// Proportional jitter: delay × random[1-j, 1+j]
fn proportional_jitter(delay: Duration, j: f64) -> Duration {
    let j = if j.is_finite() { j.clamp(0.0, 1.0) } else { 0.0 };
    if j == 0.0 || delay.is_zero() {
        return delay;
    }
    let factor = rand::rng().random_range((1.0 - j)..=(1.0 + j));
    delay.mul_f64(factor)
}

/// Additive jitter: delay + random[0, spread]
fn additive_jitter(delay: Duration, spread: Duration) -> Duration {
    let ms = spread.as_millis() as u64;
    if ms == 0 {
        return delay;
    }
    delay.saturating_add(Duration::from_millis(rand::rng().random_range(0..=ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        for policy in [
            JitterPolicy::Full,
            JitterPolicy::Equal,
            JitterPolicy::Proportional(0.5),
        ] {
            assert_eq!(policy.apply(Duration::ZERO), Duration::ZERO);
        }
    }

    #[test]
    fn test_proportional_bounds() {
        let policy = JitterPolicy::Proportional(0.25);
        for _ in 0..100 {
            let delay = policy.apply(Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(750), "{delay:?} below range");
            assert!(delay <= Duration::from_millis(1250), "{delay:?} above range");
        }
    }

    #[test]
    fn test_additive_bounds() {
        let policy = JitterPolicy::Additive(Duration::from_millis(100));
        for _ in 0..100 {
            let delay = policy.apply(Duration::from_millis(300));
            assert!(delay >= Duration::from_millis(300));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_decorrelated_without_prev_returns_base() {
        let delay = JitterPolicy::Decorrelated.apply_decorrelated(
            Duration::from_millis(100),
            None,
            Duration::from_secs(5),
        );
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn test_decorrelated_bounds() {
        for _ in 0..100 {
            let delay = JitterPolicy::Decorrelated.apply_decorrelated(
                Duration::from_millis(100),
                Some(Duration::from_millis(400)),
                Duration::from_secs(1),
            );
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(1));
        }
    }
}
