//! # Broadcaster configuration.
//!
//! Provides [`BroadcasterConfig`] centralized settings for one broadcaster, plus the
//! [`OverflowPolicy`] and [`EndOfStreamPolicy`] knobs it carries.
//!
//! ## Sentinel values
//! - `receiver_capacity = 0` → unbounded receiver buffers
//! - `grace = 0s` → `stop()` does not wait for the background loop; the loop still closes
//!   its session after `stop()` returns

use std::time::Duration;

/// Default per-receiver buffer size.
pub const DEFAULT_RECEIVER_CAPACITY: usize = 50;

/// What a bounded receiver buffer does when a new value arrives and it is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest buffered value (protects the producer; default).
    #[default]
    DropOldest,
    /// Discard the incoming value.
    DropNewest,
    /// Wait up to `timeout` for the receiver to make room, then discard the oldest value.
    ///
    /// While waiting, dispatch to the remaining receivers is delayed.
    Block { timeout: Duration },
}

/// What the broadcaster does when a session reaches end-of-stream without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EndOfStreamPolicy {
    /// Treat it like a failure: consult the retry strategy and reconnect (default).
    #[default]
    Reconnect,
    /// Treat it as terminal success: deliver [`Finished`](crate::BroadcastError::Finished)
    /// after buffered values and stop.
    Complete,
}

/// Configuration for one broadcaster.
///
/// ## Field semantics
/// - `receiver_capacity`: default buffer size for new receivers (`0` = unbounded)
/// - `overflow`: what full buffers do with new values
/// - `end_of_stream`: reconnect or complete on natural end-of-stream
/// - `bus_capacity`: lifecycle event ring buffer size (min 1; clamped by Bus)
/// - `grace`: how long `stop()` waits for the loop before aborting it (`0s` = do not wait)
/// - `auto_start`: whether `build()` immediately starts connecting
#[derive(Clone, Debug)]
pub struct BroadcasterConfig {
    /// Default buffer size for receivers created with `new_receiver()`.
    pub receiver_capacity: usize,

    /// Overflow policy applied to every bounded receiver.
    pub overflow: OverflowPolicy,

    /// End-of-stream handling.
    pub end_of_stream: EndOfStreamPolicy,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// Maximum time `stop()` waits for the background loop to exit.
    ///
    /// The loop exits at its next suspension point once cancelled, so this only matters
    /// when a session's `close()` or a blocking dispatch takes long. A loop still running
    /// past the grace period is aborted and its session is dropped without `close()`.
    ///
    /// `0s` never aborts: `stop()` delivers `Cancelled` and returns while the loop
    /// finishes closing its session in the background.
    pub grace: Duration,

    /// Start connecting as soon as the broadcaster is built.
    pub auto_start: bool,
}

impl BroadcasterConfig {
    /// Returns the receiver buffer bound as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` buffered values per receiver
    #[inline]
    pub fn receiver_capacity_limit(&self) -> Option<usize> {
        capacity_limit(self.receiver_capacity)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the stop grace period as an `Option`.
    ///
    /// - `None` → do not wait for the background loop
    /// - `Some(d)` → wait up to `d`, then abort
    #[inline]
    pub fn stop_grace(&self) -> Option<Duration> {
        if self.grace.is_zero() {
            None
        } else {
            Some(self.grace)
        }
    }
}

impl Default for BroadcasterConfig {
    /// Default configuration:
    ///
    /// - `receiver_capacity = 50`
    /// - `overflow = DropOldest`
    /// - `end_of_stream = Reconnect`
    /// - `bus_capacity = 1024`
    /// - `grace = 5s`
    /// - `auto_start = true`
    fn default() -> Self {
        Self {
            receiver_capacity: DEFAULT_RECEIVER_CAPACITY,
            overflow: OverflowPolicy::default(),
            end_of_stream: EndOfStreamPolicy::default(),
            bus_capacity: 1024,
            grace: Duration::from_secs(5),
            auto_start: true,
        }
    }
}

/// Maps the `0 = unbounded` sentinel.
#[inline]
pub(crate) fn capacity_limit(capacity: usize) -> Option<usize> {
    if capacity == 0 {
        None
    } else {
        Some(capacity)
    }
}
