//! # Item-mapping factory (`Transformed`)
//!
//! Wraps a factory and passes every value through a transform before it reaches the
//! broadcaster, e.g. to convert wire messages into domain types.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::session::session::{BoxSession, FactoryRef, StreamFactory, StreamSession};

type TransformFn<I, O> = Arc<dyn Fn(I) -> O + Send + Sync>;

/// Factory whose sessions yield `transform(value)` for every upstream value.
///
/// # Example
/// ```rust
/// use futures::stream;
/// use streamvisor::{FactoryRef, SessionError, StreamFn, Transformed};
///
/// let raw: FactoryRef<u32> = StreamFn::arc(|| async {
///     Ok::<_, SessionError>(stream::iter(vec![Ok(1), Ok(2)]))
/// });
/// let named: FactoryRef<String> = Transformed::arc(raw, |x| format!("transformed_{x}"));
/// # let _ = named;
/// ```
pub struct Transformed<I, O> {
    inner: FactoryRef<I>,
    transform: TransformFn<I, O>,
}

impl<I, O> Transformed<I, O> {
    /// Wraps `inner`, applying `transform` to each value.
    pub fn new(inner: FactoryRef<I>, transform: impl Fn(I) -> O + Send + Sync + 'static) -> Self {
        Self {
            inner,
            transform: Arc::new(transform),
        }
    }

    /// Same as [`Transformed::new`], returned as a shared handle.
    pub fn arc(
        inner: FactoryRef<I>,
        transform: impl Fn(I) -> O + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::new(inner, transform))
    }
}

#[async_trait]
impl<I, O> StreamFactory<O> for Transformed<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn open(&self) -> Result<BoxSession<O>, SessionError> {
        let session = self.inner.open().await?;
        let mapped: BoxSession<O> = Box::new(TransformedSession {
            session,
            transform: Arc::clone(&self.transform),
        });
        Ok(mapped)
    }
}

struct TransformedSession<I, O> {
    session: BoxSession<I>,
    transform: TransformFn<I, O>,
}

#[async_trait]
impl<I, O> StreamSession<O> for TransformedSession<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn advance(&mut self) -> Result<Option<O>, SessionError> {
        Ok(self.session.advance().await?.map(|v| (self.transform)(v)))
    }

    async fn close(&mut self) {
        self.session.close().await;
    }
}
