//! # Stream session and factory abstractions.
//!
//! A [`StreamSession`] is one attempt at consuming the upstream stream. It is single-use:
//! once [`advance`](StreamSession::advance) reports end-of-stream or an error, the
//! broadcaster calls [`close`](StreamSession::close) and discards it.
//!
//! A [`StreamFactory`] produces sessions. The broadcaster calls it once per attempt,
//! so every reconnect starts a brand-new session. The common handle type is
//! [`FactoryRef`], an `Arc<dyn StreamFactory<T>>` suitable for sharing across the runtime.
//!
//! Any `futures::Stream<Item = Result<T, SessionError>>` boxed as a [`BoxStream`] is a session.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::SessionError;

/// # One attempt at consuming the upstream stream.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use streamvisor::{SessionError, StreamSession};
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl StreamSession<u32> for Countdown {
///     async fn advance(&mut self) -> Result<Option<u32>, SessionError> {
///         if self.0 == 0 {
///             return Ok(None);
///         }
///         self.0 -= 1;
///         Ok(Some(self.0))
///     }
/// }
/// ```
#[async_trait]
pub trait StreamSession<T>: Send {
    /// Pulls the next value.
    ///
    /// - `Ok(Some(v))`: a value
    /// - `Ok(None)`: end of stream
    /// - `Err(e)`: the session failed; it will not be polled again
    async fn advance(&mut self) -> Result<Option<T>, SessionError>;

    /// Releases underlying resources.
    ///
    /// Called exactly once on every exit path (end, failure, cancellation) before the
    /// session is dropped. The one exception is a loop aborted by `stop()` after its
    /// grace period ran out.
    async fn close(&mut self) {}
}

/// Boxed session as produced by a [`StreamFactory`].
pub type BoxSession<T> = Box<dyn StreamSession<T>>;

#[async_trait]
impl<T: Send + 'static> StreamSession<T> for BoxStream<'static, Result<T, SessionError>> {
    async fn advance(&mut self) -> Result<Option<T>, SessionError> {
        self.next().await.transpose()
    }
}

/// # Producer of stream sessions.
///
/// Called every time the broadcaster (re)connects. Failing with
/// [`SessionError::Connect`] sends the broadcaster into backoff.
#[async_trait]
pub trait StreamFactory<T>: Send + Sync + 'static {
    /// Opens a new session.
    async fn open(&self) -> Result<BoxSession<T>, SessionError>;
}

/// Shared handle to a factory.
pub type FactoryRef<T> = Arc<dyn StreamFactory<T>>;
