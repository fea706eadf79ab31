//! # Subscription registry.
//!
//! Registry owns every live [`Subscription`] of one broadcaster and fans values out to them.
//!
//! ## Architecture
//! ```text
//! Broadcaster::new_receiver() ──► register()   ─┐
//! Receiver::close() / drop    ──► deregister() ─┼──► Mutex<{ subs: id → Arc<Subscription>, stopped }>
//! StreamActor                 ──► dispatch()   ─┤        (snapshot taken under the lock,
//! stop() / give up / complete ──► terminate()  ─┘         pushes happen outside it)
//! ```
//!
//! ## Rules
//! - Registration and removal are the only mutations, both under one lock
//! - The `stopped` flag lives under the same lock: once `terminate()` ran, `register()`
//!   fails with `AlreadyStopped`, so no receiver can miss the terminal item
//! - Dispatch iterates a snapshot, so a blocking push never holds the lock

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::config::OverflowPolicy;
use crate::core::subscription::{Push, Subscription};
use crate::error::BroadcastError;
use crate::events::{Bus, Event, EventKind};

struct Inner<T> {
    subs: HashMap<u64, Arc<Subscription<T>>>,
    stopped: bool,
}

/// Registry of active subscriptions for one broadcaster.
pub(crate) struct Registry<T> {
    inner: Mutex<Inner<T>>,
    next_id: AtomicU64,
    bus: Bus,
}

impl<T: Clone + Send + 'static> Registry<T> {
    pub(crate) fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                subs: HashMap::new(),
                stopped: false,
            }),
            next_id: AtomicU64::new(1),
            bus,
        })
    }

    /// Registers a new subscription.
    pub(crate) fn register(
        &self,
        capacity: Option<usize>,
        overflow: OverflowPolicy,
    ) -> Result<Arc<Subscription<T>>, BroadcastError> {
        let sub = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Err(BroadcastError::AlreadyStopped);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let sub = Arc::new(Subscription::new(id, capacity, overflow));
            inner.subs.insert(id, Arc::clone(&sub));
            sub
        };

        tracing::debug!(stream = %self.bus.stream(), receiver = sub.id(), ?capacity, "receiver added");
        self.bus
            .publish(Event::new(EventKind::ReceiverAdded).with_receiver(sub.id()));
        Ok(sub)
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub(crate) fn deregister(&self, id: u64) -> bool {
        let removed = self.inner.lock().subs.remove(&id);
        match removed {
            Some(_) => {
                tracing::debug!(stream = %self.bus.stream(), receiver = id, "receiver closed");
                self.bus
                    .publish(Event::new(EventKind::ReceiverClosed).with_receiver(id));
                true
            }
            None => false,
        }
    }

    /// Returns the currently registered subscriptions.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscription<T>>> {
        self.inner.lock().subs.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().subs.len()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Pushes `value` to every subscription registered at call time.
    pub(crate) async fn dispatch(&self, value: T, token: &CancellationToken) {
        for sub in self.snapshot() {
            if let Push::Dropped(reason) = sub.push(value.clone(), token).await {
                tracing::debug!(stream = %self.bus.stream(), receiver = sub.id(), reason, "receiver overflow");
                self.bus.publish(
                    Event::new(EventKind::ReceiverOverflow)
                        .with_receiver(sub.id())
                        .with_reason(reason),
                );
            }
        }
    }

    /// Marks the registry stopped, removes every subscription and delivers `terminal` to each.
    ///
    /// Only the first call delivers anything; later calls return `None`. Otherwise returns
    /// the number of subscriptions that received the terminal item.
    pub(crate) fn terminate(&self, terminal: BroadcastError) -> Option<usize> {
        let drained: Vec<Arc<Subscription<T>>> = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return None;
            }
            inner.stopped = true;
            inner.subs.drain().map(|(_, sub)| sub).collect()
        };

        let delivered = drained
            .iter()
            .filter(|sub| sub.finish(terminal.clone()))
            .count();
        tracing::debug!(
            stream = %self.bus.stream(),
            receivers = delivered,
            terminal = terminal.as_label(),
            "receivers terminated"
        );
        Some(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<Registry<u32>> {
        Registry::new(Bus::new(Arc::from("test"), 16))
    }

    #[tokio::test]
    async fn test_dispatch_reaches_only_registered() {
        let reg = registry();
        let token = CancellationToken::new();
        let early = reg.register(None, OverflowPolicy::DropOldest).unwrap();
        reg.dispatch(1, &token).await;
        let late = reg.register(None, OverflowPolicy::DropOldest).unwrap();
        reg.dispatch(2, &token).await;

        assert_eq!(early.recv().await, Ok(1));
        assert_eq!(early.recv().await, Ok(2));
        assert_eq!(late.recv().await, Ok(2));
        assert_eq!(late.len(), 0);
    }

    #[tokio::test]
    async fn test_deregistered_receives_nothing() {
        let reg = registry();
        let token = CancellationToken::new();
        let sub = reg.register(None, OverflowPolicy::DropOldest).unwrap();
        assert!(reg.deregister(sub.id()));
        assert!(!reg.deregister(sub.id()));
        reg.dispatch(1, &token).await;
        assert_eq!(sub.len(), 0);
        assert_eq!(reg.len(), 0);
    }

    #[tokio::test]
    async fn test_terminate_is_once_and_blocks_registration() {
        let reg = registry();
        let a = reg.register(None, OverflowPolicy::DropOldest).unwrap();
        let b = reg.register(None, OverflowPolicy::DropOldest).unwrap();

        let exhausted = BroadcastError::Exhausted {
            attempts: 1,
            last_error: None,
        };
        assert_eq!(reg.terminate(exhausted.clone()), Some(2));
        assert_eq!(reg.terminate(BroadcastError::Cancelled), None);
        assert!(reg.is_stopped());

        assert_eq!(a.recv().await, Err(exhausted.clone()));
        assert_eq!(b.recv().await, Err(exhausted));
        assert_eq!(
            reg.register(None, OverflowPolicy::DropOldest).err(),
            Some(BroadcastError::AlreadyStopped)
        );
    }

    #[tokio::test]
    async fn test_overflow_publishes_event() {
        let reg = registry();
        let mut events = reg.bus.subscribe();
        let token = CancellationToken::new();
        let sub = reg.register(Some(1), OverflowPolicy::DropOldest).unwrap();
        reg.dispatch(1, &token).await;
        reg.dispatch(2, &token).await;

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(kinds, vec![EventKind::ReceiverAdded, EventKind::ReceiverOverflow]);
        assert_eq!(sub.recv().await, Ok(2));
    }
}
