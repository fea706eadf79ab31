//! # StreamActor: the broadcaster's background loop.
//!
//! Owns the retry strategy and drives one upstream at a time:
//! opens a session, fans its values out through the [`Registry`], and on failure
//! consults the [`RetryStrategy`] before reconnecting.
//!
//! ## Event flow
//! ```text
//! Connecting → ConnectFailed ─────────────┐
//!            → Streaming → SessionEnded ──┤
//!                        → SessionFailed ─┤
//!                                         ▼
//!                          strategy.next() ├─► BackoffScheduled → [sleep] → Connecting
//!                                          └─► Exhausted (terminal)
//!
//! SessionEnded + EndOfStreamPolicy::Complete → Completed (terminal)
//! ```
//!
//! ## Architecture
//! ```text
//! Broadcaster::launch() ──► tokio::spawn(StreamActor::run())
//!
//! loop {
//!   ├─► attempts += 1, phase = Connecting
//!   ├─► open_session()  ───► factory.open()
//!   ├─► loop next_item() ──► session.advance()
//!   │       ├─► first value: strategy.reset(), publish Streaming
//!   │       └─► registry.dispatch(value)
//!   ├─► session.close()
//!   └─► strategy.next()
//!         ├─► Retry  → phase = Backoff, sleep(delay)
//!         └─► GiveUp → registry.terminate(Exhausted), phase = Stopped
//! }
//! ```
//!
//! ## Rules
//! - Sessions run **sequentially**; the actor never holds two sessions at once
//! - The strategy counter resets when a session delivers its **first value**
//! - Cancellation is observed at every suspension point; the open session is closed and
//!   `Cancelled` is delivered before the loop returns
//! - Every exit delivers its terminal item itself, so receivers never depend on
//!   `stop()` running to completion
//! - Only the first terminal delivery of a broadcaster counts; `stop()` and `Drop` may
//!   race the loop for it

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::EndOfStreamPolicy,
        registry::Registry,
        runner::{backoff, next_item, open_session, Opened, Step},
        status::{Phase, Status},
    },
    error::{BroadcastError, SessionError},
    events::{Bus, Event, EventKind},
    policies::{RetryDecision, RetryStrategy},
    session::{BoxSession, FactoryRef},
};

/// How one session ended.
enum SessionEnd {
    Ended,
    Failed(SessionError),
    Cancelled,
}

/// Background loop of one broadcaster.
pub(crate) struct StreamActor<T> {
    pub(crate) name: Arc<str>,
    pub(crate) factory: FactoryRef<T>,
    pub(crate) strategy: Box<dyn RetryStrategy>,
    pub(crate) registry: Arc<Registry<T>>,
    pub(crate) bus: Bus,
    pub(crate) status: Arc<watch::Sender<Status>>,
    pub(crate) end_of_stream: EndOfStreamPolicy,
}

impl<T: Clone + Send + 'static> StreamActor<T> {
    /// Runs until the token is cancelled, the strategy gives up, or the upstream completes.
    ///
    /// Returns the terminal item the loop ended with.
    pub(crate) async fn run(mut self, token: CancellationToken) -> BroadcastError {
        let mut attempts: u64 = 0;

        loop {
            if token.is_cancelled() {
                return self.cancelled(attempts);
            }

            attempts += 1;
            self.status.send_modify(|s| {
                s.phase = Phase::Connecting;
                s.attempts = attempts;
            });
            tracing::debug!(stream = %self.name, attempt = attempts, "making call to streaming method");
            self.publish(EventKind::Connecting, attempts);

            let error = match open_session(self.factory.as_ref(), &token).await {
                Opened::Cancelled => return self.cancelled(attempts),
                Opened::Failed(err) => {
                    self.bus.publish(
                        self.event(EventKind::ConnectFailed, attempts)
                            .with_reason(err.as_message()),
                    );
                    err
                }
                Opened::Session(session) => {
                    self.status.send_modify(|s| {
                        s.phase = Phase::Streaming;
                        s.sessions_opened += 1;
                    });
                    tracing::info!(stream = %self.name, attempt = attempts, "starting to stream");

                    match self.stream(session, attempts, &token).await {
                        SessionEnd::Cancelled => return self.cancelled(attempts),
                        SessionEnd::Ended => {
                            self.publish(EventKind::SessionEnded, attempts);
                            if self.end_of_stream == EndOfStreamPolicy::Complete {
                                return self.complete(attempts);
                            }
                            SessionError::stream("end of stream")
                        }
                        SessionEnd::Failed(err) => {
                            self.bus.publish(
                                self.event(EventKind::SessionFailed, attempts)
                                    .with_reason(err.as_message()),
                            );
                            err
                        }
                    }
                }
            };

            if !error.is_retryable() {
                tracing::info!(stream = %self.name, error = %error, "upstream cancelled the session, stopping");
                return self.terminate(BroadcastError::Cancelled, EventKind::Stopped, attempts);
            }

            match self.strategy.next() {
                RetryDecision::Retry { delay, state } => {
                    tracing::warn!(
                        stream = %self.name,
                        progress = %self.strategy.progress(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "connection ended, retrying {} in {:.3} seconds",
                        self.strategy.progress(),
                        delay.as_secs_f64()
                    );
                    self.status.send_modify(|s| {
                        s.phase = Phase::Backoff;
                        s.retry = state;
                        s.last_error = Some(error.to_string());
                    });
                    self.bus.publish(
                        self.event(EventKind::BackoffScheduled, attempts)
                            .with_delay(delay)
                            .with_reason(error.as_message()),
                    );

                    if !backoff(delay, &token).await {
                        return self.cancelled(attempts);
                    }
                }
                RetryDecision::GiveUp => {
                    tracing::error!(
                        stream = %self.name,
                        progress = %self.strategy.progress(),
                        error = %error,
                        "connection ended, retry limit exceeded {}, giving up",
                        self.strategy.progress()
                    );
                    self.status
                        .send_modify(|s| s.last_error = Some(error.to_string()));
                    let terminal = BroadcastError::Exhausted {
                        attempts,
                        last_error: Some(error.to_string()),
                    };
                    return self.terminate(terminal, EventKind::Exhausted, attempts);
                }
            }
        }
    }

    /// Drains one session, always closing it before returning.
    async fn stream(
        &mut self,
        mut session: BoxSession<T>,
        attempt: u64,
        token: &CancellationToken,
    ) -> SessionEnd {
        let mut first = true;
        let end = loop {
            match next_item(&mut session, token).await {
                Step::Value(value) => {
                    if first {
                        first = false;
                        self.strategy.reset();
                        self.status.send_modify(|s| s.retry = self.strategy.state());
                        self.publish(EventKind::Streaming, attempt);
                    }
                    self.status.send_if_modified(|s| {
                        s.values_observed += 1;
                        false
                    });
                    self.registry.dispatch(value, token).await;
                }
                Step::Ended => break SessionEnd::Ended,
                Step::Failed(err) => break SessionEnd::Failed(err),
                Step::Cancelled => break SessionEnd::Cancelled,
            }
        };
        session.close().await;
        end
    }

    fn complete(&self, attempts: u64) -> BroadcastError {
        tracing::info!(stream = %self.name, "stream completed");
        self.terminate(BroadcastError::Finished, EventKind::Completed, attempts)
    }

    fn cancelled(&self, attempts: u64) -> BroadcastError {
        self.terminate(BroadcastError::Cancelled, EventKind::Stopped, attempts)
    }

    /// Delivers `terminal` and publishes `kind`, unless another terminal got there first.
    fn terminate(&self, terminal: BroadcastError, kind: EventKind, attempts: u64) -> BroadcastError {
        let delivered = self.registry.terminate(terminal.clone());
        self.status.send_modify(|s| s.phase = Phase::Stopped);
        if let Some(receivers) = delivered {
            tracing::info!(
                stream = %self.name,
                receivers,
                terminal = terminal.as_label(),
                "broadcaster stopped"
            );
            self.bus.publish(
                self.event(kind, attempts)
                    .with_reason(terminal.as_message()),
            );
        }
        terminal
    }

    fn event(&self, kind: EventKind, attempt: u64) -> Event {
        Event::new(kind).with_attempt(attempt)
    }

    fn publish(&self, kind: EventKind, attempt: u64) {
        self.bus.publish(self.event(kind, attempt));
    }
}
