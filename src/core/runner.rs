//! # Single-step helpers for one upstream session.
//!
//! Every call into user code (`StreamFactory::open`, `StreamSession::advance`) is raced
//! against the broadcaster's [`CancellationToken`], so `stop()` never waits on a hung
//! upstream.
//!
//! ```text
//! open_session()  ──► factory.open()   ─┬─► Opened(session)
//!                                       ├─► Failed(err)
//!                   token.cancelled() ──┴─► Cancelled
//!
//! next_item()     ──► session.advance() ─┬─► Value(v)
//!                                        ├─► Ended
//!                                        ├─► Failed(err)
//!                   token.cancelled() ───┴─► Cancelled
//! ```
//!
//! ## Rules
//! - Cancellation wins ties (`biased` select), so no value is dispatched after `stop()`
//! - The helpers publish nothing; the actor decides what each outcome means

use std::time::Duration;

use tokio::{select, task, time};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::session::{BoxSession, StreamFactory};

/// Outcome of one factory invocation.
pub(crate) enum Opened<T> {
    Session(BoxSession<T>),
    Failed(SessionError),
    Cancelled,
}

/// Outcome of one `advance()` call.
pub(crate) enum Step<T> {
    Value(T),
    Ended,
    Failed(SessionError),
    Cancelled,
}

/// Invokes the factory once, unless `token` fires first.
pub(crate) async fn open_session<T: 'static>(
    factory: &dyn StreamFactory<T>,
    token: &CancellationToken,
) -> Opened<T> {
    select! {
        biased;
        _ = token.cancelled() => Opened::Cancelled,
        res = factory.open() => match res {
            Ok(session) => Opened::Session(session),
            Err(e) => Opened::Failed(e),
        },
    }
}

/// Pulls the next item from `session`, unless `token` fires first.
pub(crate) async fn next_item<T: 'static>(
    session: &mut BoxSession<T>,
    token: &CancellationToken,
) -> Step<T> {
    select! {
        biased;
        _ = token.cancelled() => Step::Cancelled,
        res = session.advance() => match res {
            Ok(Some(value)) => Step::Value(value),
            Ok(None) => Step::Ended,
            Err(e) => Step::Failed(e),
        },
    }
}

/// Waits `delay` before the next attempt. Returns `false` if `token` fired first.
///
/// A zero delay still yields once, so an always-failing factory cannot starve the runtime.
pub(crate) async fn backoff(delay: Duration, token: &CancellationToken) -> bool {
    if delay.is_zero() {
        task::yield_now().await;
        return !token.is_cancelled();
    }
    select! {
        biased;
        _ = token.cancelled() => false,
        _ = time::sleep(delay) => true,
    }
}
