//! # Broadcaster phase and status snapshots.
//!
//! ```text
//! Idle ──► Connecting ──► Streaming ──┐
//!              ▲    │                 │ failure / end-of-stream
//!              │    └──► Backoff ◄────┘
//!              └──────────┘
//! any ──► Stopped   (stop(), strategy gave up, or completion)
//! ```
//!
//! The background loop is the only writer; callers read snapshots through
//! [`Broadcaster::status`](crate::Broadcaster::status).

use crate::policies::RetryState;

/// Lifecycle phase of a broadcaster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Built but not started.
    Idle,
    /// Invoking the factory.
    Connecting,
    /// A session is open and being read.
    Streaming,
    /// Waiting before the next connect attempt.
    Backoff,
    /// Terminal.
    Stopped,
}

/// Point-in-time view of a broadcaster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// Current phase.
    pub phase: Phase,
    /// Retry strategy state (copied, never live).
    pub retry: RetryState,
    /// Most recent session error or end-of-stream reason.
    pub last_error: Option<String>,
    /// Factory invocations so far.
    pub attempts: u64,
    /// Sessions successfully opened so far.
    pub sessions_opened: u64,
    /// Values observed from the upstream (and dispatched) so far.
    pub values_observed: u64,
}

impl Status {
    pub(crate) fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            retry: RetryState::fresh(),
            last_error: None,
            attempts: 0,
            sessions_opened: 0,
            values_observed: 0,
        }
    }
}
