//! # Function-backed stream factory (`StreamFn`)
//!
//! [`StreamFn`] wraps a closure `F: Fn() -> Fut`, where `Fut` resolves to a
//! `futures::Stream` of `Result<T, SessionError>`. A fresh stream is created per
//! connect attempt, so no state leaks between sessions; if shared state is needed,
//! capture an `Arc<...>` in the closure explicitly.
//!
//! ## Example
//! ```rust
//! use futures::stream;
//! use streamvisor::{FactoryRef, SessionError, StreamFn};
//!
//! let factory: FactoryRef<u32> = StreamFn::arc(|| async {
//!     Ok::<_, SessionError>(stream::iter(vec![Ok(1), Ok(2), Ok(3)]))
//! });
//! # let _ = factory;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::SessionError;
use crate::session::session::{BoxSession, StreamFactory};

/// Function-backed factory implementation.
///
/// Wraps a closure that *creates* a new stream per connect attempt.
pub struct StreamFn<F> {
    f: F,
}

impl<F> StreamFn<F> {
    /// Creates a new function-backed factory.
    ///
    /// Prefer [`StreamFn::arc`] when you immediately need a [`FactoryRef`](crate::FactoryRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut, S> StreamFactory<T> for StreamFn<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, SessionError>> + Send + 'static,
    S: Stream<Item = Result<T, SessionError>> + Send + 'static,
{
    async fn open(&self) -> Result<BoxSession<T>, SessionError> {
        let stream = (self.f)().await?;
        let session: BoxSession<T> = Box::new(stream.boxed());
        Ok(session)
    }
}
