//! Error types used by the broadcaster and its stream sessions.
//!
//! This module defines two main error enums:
//!
//! - [`SessionError`]: failures of the upstream stream, already classified by the
//!   collaborator that owns the transport (connect vs. mid-stream vs. cancelled).
//! - [`BroadcastError`]: errors observed by callers of the [`Broadcaster`](crate::Broadcaster)
//!   and its [`Receiver`](crate::Receiver)s.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Session errors never reach callers directly: the retry loop absorbs them until the
//! retry strategy gives up, at which point [`BroadcastError::Exhausted`] is fanned out.

use thiserror::Error;

/// # Classified failures of one upstream stream attempt.
///
/// Produced by a [`StreamFactory`](crate::StreamFactory) or a
/// [`StreamSession`](crate::StreamSession). The broadcaster only reasons about this
/// normalized taxonomy; mapping transport-specific errors into it is the job of the
/// collaborator that builds the stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The factory could not produce a session.
    #[error("connect failed: {reason}")]
    Connect {
        /// The underlying error message.
        reason: String,
    },

    /// The session failed after it was established.
    #[error("stream failed: {reason}")]
    Stream {
        /// The underlying error message.
        reason: String,
    },

    /// The session was cancelled by the transport or the caller.
    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Shorthand for [`SessionError::Connect`].
    pub fn connect(reason: impl Into<String>) -> Self {
        SessionError::Connect {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SessionError::Stream`].
    pub fn stream(reason: impl Into<String>) -> Self {
        SessionError::Stream {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::SessionError;
    ///
    /// let err = SessionError::connect("refused");
    /// assert_eq!(err.as_label(), "session_connect");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Connect { .. } => "session_connect",
            SessionError::Stream { .. } => "session_stream",
            SessionError::Cancelled => "session_cancelled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::Connect { reason } => format!("connect: {reason}"),
            SessionError::Stream { reason } => format!("stream: {reason}"),
            SessionError::Cancelled => "session cancelled".to_string(),
        }
    }

    /// Indicates whether the retry loop should consult its strategy for this error.
    ///
    /// Returns `true` for [`SessionError::Connect`] and [`SessionError::Stream`].
    ///
    /// # Example
    /// ```
    /// use streamvisor::SessionError;
    ///
    /// assert!(SessionError::stream("reset by peer").is_retryable());
    /// assert!(!SessionError::Cancelled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Connect { .. } | SessionError::Stream { .. }
        )
    }
}

/// # Errors observed by broadcaster callers.
///
/// Terminal variants (`Cancelled`, `Exhausted`, `Finished`) are fanned out once to every
/// live receiver; `AlreadyStopped` and `Closed` are returned only to the offending call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The broadcaster was stopped by a caller.
    #[error("broadcaster cancelled")]
    Cancelled,

    /// The retry strategy gave up reconnecting.
    #[error("retry limit exceeded after {attempts} attempts")]
    Exhausted {
        /// Number of upstream attempts made (factory invocations).
        attempts: u64,
        /// Last session error observed before giving up.
        last_error: Option<String>,
    },

    /// The upstream stream ended and the broadcaster was configured to treat that as completion.
    #[error("stream finished")]
    Finished,

    /// The broadcaster is already stopped; no new receivers can be created.
    #[error("broadcaster already stopped")]
    AlreadyStopped,

    /// The receiver was closed.
    #[error("receiver closed")]
    Closed,
}

impl BroadcastError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::BroadcastError;
    ///
    /// assert_eq!(BroadcastError::AlreadyStopped.as_label(), "broadcast_already_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BroadcastError::Cancelled => "broadcast_cancelled",
            BroadcastError::Exhausted { .. } => "broadcast_exhausted",
            BroadcastError::Finished => "broadcast_finished",
            BroadcastError::AlreadyStopped => "broadcast_already_stopped",
            BroadcastError::Closed => "receiver_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BroadcastError::Cancelled => "cancelled by caller".to_string(),
            BroadcastError::Exhausted {
                attempts,
                last_error: Some(err),
            } => format!("exhausted after {attempts} attempts; last error: {err}"),
            BroadcastError::Exhausted {
                attempts,
                last_error: None,
            } => format!("exhausted after {attempts} attempts"),
            BroadcastError::Finished => "upstream finished".to_string(),
            BroadcastError::AlreadyStopped => "already stopped".to_string(),
            BroadcastError::Closed => "receiver closed".to_string(),
        }
    }

    /// Indicates whether this error ends a receiver's feed (as opposed to a local misuse error).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BroadcastError::Cancelled | BroadcastError::Exhausted { .. } | BroadcastError::Finished
        )
    }
}
