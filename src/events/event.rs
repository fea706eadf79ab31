//! # Lifecycle events emitted by a broadcaster.
//!
//! [`EventKind`] groups what a broadcaster reports into upstream events (connects,
//! sessions, backoff), receiver events (added, closed, overflow) and terminal events
//! (exhausted, completed, stopped). [`Event`] adds the metadata: stream name, attempt,
//! delay, reason and receiver id.
//!
//! Events are ordered by `seq`, a process-wide counter.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_stream("prices")
//!     .with_reason("stream: reset")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.stream.as_deref(), Some("prices"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of broadcaster events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Upstream events ===
    /// The factory is being invoked.
    ///
    /// Sets:
    /// - `stream`, `attempt` (1-based factory invocation count)
    Connecting,

    /// The factory failed to produce a session.
    ///
    /// Sets:
    /// - `stream`, `attempt`, `reason`
    ConnectFailed,

    /// A session delivered its first value; the retry counter was reset.
    ///
    /// Sets:
    /// - `stream`, `attempt`
    Streaming,

    /// A session reached end-of-stream.
    ///
    /// Sets:
    /// - `stream`, `attempt`
    SessionEnded,

    /// A session failed mid-stream.
    ///
    /// Sets:
    /// - `stream`, `attempt`, `reason`
    SessionFailed,

    /// Next attempt scheduled.
    ///
    /// Sets:
    /// - `stream`, `attempt`, `delay_ms`, `reason` (last error)
    BackoffScheduled,

    // === Receiver events ===
    /// A receiver was registered.
    ///
    /// Sets:
    /// - `stream`, `receiver`
    ReceiverAdded,

    /// A receiver was closed by its owner.
    ///
    /// Sets:
    /// - `stream`, `receiver`
    ReceiverClosed,

    /// A value was dropped for one receiver because its buffer was full.
    ///
    /// Sets:
    /// - `stream`, `receiver`, `reason` (`"drop_oldest"` or `"drop_newest"`)
    ReceiverOverflow,

    // === Terminal events ===
    /// The retry strategy gave up; `Exhausted` was delivered to every receiver.
    ///
    /// Sets:
    /// - `stream`, `attempt`, `reason`
    Exhausted,

    /// The upstream ended and the broadcaster treats that as completion.
    ///
    /// Sets:
    /// - `stream`, `attempt`, `reason`
    Completed,

    /// The broadcaster was stopped by a caller, or the upstream cancelled its session.
    ///
    /// Sets:
    /// - `stream`, `reason`; `attempt` when the upstream cancelled
    Stopped,
}

/// One lifecycle event.
///
/// Which optional fields are filled depends on [`EventKind`]; see the "Sets:" list of each kind.
/// `stream` is always set once the event leaves the broadcaster's bus.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide ordering key; later events have larger values.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Broadcaster stream name.
    pub stream: Option<Arc<str>>,
    /// Factory invocation count at the time of the event.
    pub attempt: Option<u64>,
    /// Scheduled backoff in milliseconds, saturating at `u32::MAX`.
    pub delay_ms: Option<u32>,
    /// Error text, terminal message or overflow label.
    pub reason: Option<Arc<str>>,
    /// Id of the receiver concerned.
    pub receiver: Option<u64>,
}

impl Event {
    /// Creates an event of `kind`, taking the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            stream: None,
            attempt: None,
            delay_ms: None,
            reason: None,
            receiver: None,
        }
    }

    #[inline]
    pub fn with_stream(mut self, stream: impl Into<Arc<str>>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, attempt: u64) -> Self {
        self.attempt = Some(attempt);
        self
    }

    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(u32::try_from(delay.as_millis()).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn with_receiver(mut self, id: u64) -> Self {
        self.receiver = Some(id);
        self
    }

    /// Scheduled backoff, if any.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Returns `true` for the last event a broadcaster publishes
    /// (`Exhausted`, `Completed` or `Stopped`).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Exhausted | EventKind::Completed | EventKind::Stopped
        )
    }
}
