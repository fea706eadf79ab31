//! # Consumer handle.
//!
//! A [`Receiver`] reads the values fanned out by one [`Broadcaster`](crate::Broadcaster).
//! Every receiver owns its own buffer, so a slow receiver never delays or drops values
//! for another one (see [`OverflowPolicy`](crate::OverflowPolicy) for what happens to its own buffer).
//!
//! ```text
//! receive() ──► Ok(value) ... Ok(value) ──► Err(terminal) ──► Err(Closed) ...
//!                                           (Cancelled / Exhausted / Finished, once)
//! close()   ──► deregisters; every later receive() ──► Err(Closed)
//! ```

use std::sync::Arc;

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::core::registry::Registry;
use crate::core::subscription::Subscription;
use crate::error::BroadcastError;

/// Consumer handle returned by [`Broadcaster::new_receiver`](crate::Broadcaster::new_receiver).
///
/// Dropping the receiver closes it.
pub struct Receiver<T: Clone + Send + 'static> {
    sub: Arc<Subscription<T>>,
    registry: Arc<Registry<T>>,
    termination: Option<BroadcastError>,
}

impl<T: Clone + Send + 'static> Receiver<T> {
    pub(crate) fn new(sub: Arc<Subscription<T>>, registry: Arc<Registry<T>>) -> Self {
        Self {
            sub,
            registry,
            termination: None,
        }
    }

    /// Waits for the next value.
    ///
    /// Suspends until a value is available, the broadcaster reaches a terminal state,
    /// or this receiver is closed. The terminal error is returned exactly once; after
    /// that, and after [`close`](Self::close), every call returns [`BroadcastError::Closed`].
    pub async fn receive(&mut self) -> Result<T, BroadcastError> {
        let res = self.sub.recv().await;
        if let Err(err) = &res {
            if err.is_terminal() {
                self.termination = Some(err.clone());
            }
        }
        res
    }

    /// Deregisters this receiver and discards its buffer. Idempotent.
    pub fn close(&mut self) {
        if self.sub.is_closed() {
            return;
        }
        self.sub.close();
        self.registry.deregister(self.sub.id());
    }

    /// Returns the terminal error this receiver observed, if any.
    pub fn termination(&self) -> Option<&BroadcastError> {
        self.termination.as_ref()
    }

    /// Unique id of this receiver within its broadcaster.
    pub fn id(&self) -> u64 {
        self.sub.id()
    }

    /// Number of values discarded by the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.sub.dropped()
    }

    /// Borrows the receiver as a stream of values.
    ///
    /// The stream ends at the first error; check [`termination`](Self::termination)
    /// afterwards to tell completion from cancellation or exhaustion.
    pub fn stream(&mut self) -> impl Stream<Item = T> + Send + '_ {
        stream::unfold(self, |rx| async move {
            match rx.receive().await {
                Ok(value) => Some((value, rx)),
                Err(_) => None,
            }
        })
    }

    /// Converts the receiver into an owned stream of values.
    pub fn into_stream(self) -> BoxStream<'static, T> {
        stream::unfold(self, |mut rx| async move {
            match rx.receive().await {
                Ok(value) => Some((value, rx)),
                Err(_) => None,
            }
        })
        .boxed()
    }
}

impl<T: Clone + Send + 'static> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("id", &self.sub.id())
            .field("buffered", &self.sub.len())
            .field("termination", &self.termination)
            .finish()
    }
}
