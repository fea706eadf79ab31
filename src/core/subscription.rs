//! # Per-receiver buffer.
//!
//! A [`Subscription`] is the queue behind one [`Receiver`](crate::Receiver). The background
//! loop is its only producer; the receiver is its only consumer.
//!
//! ## Rules
//! - **Per-subscription FIFO**: values come out in the order they were pushed
//! - **Isolation**: a full buffer only affects its own receiver (see [`OverflowPolicy`])
//! - **One terminal item**: at most one terminal error is stored; it is handed out once,
//!   after which the subscription reports `Closed`
//! - **Cancellation discards**: a `Cancelled` terminal clears buffered values; other
//!   terminals are delivered after them

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::config::OverflowPolicy;
use crate::error::BroadcastError;

/// Result of pushing one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Push {
    /// The value was buffered.
    Delivered,
    /// The buffer was full; one value was discarded (reason label attached).
    Dropped(&'static str),
    /// The subscription is closed or terminated; the value was discarded.
    Closed,
}

struct Slot<T> {
    queue: VecDeque<T>,
    terminal: Option<BroadcastError>,
    closed: bool,
    dropped: u64,
}

impl<T> Slot<T> {
    fn is_full(&self, capacity: Option<usize>) -> bool {
        capacity.is_some_and(|cap| self.queue.len() >= cap)
    }

    fn accepts(&self) -> bool {
        !self.closed && self.terminal.is_none()
    }
}

pub(crate) struct Subscription<T> {
    id: u64,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
    slot: Mutex<Slot<T>>,
    readable: Notify,
    writable: Notify,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: u64, capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            id,
            capacity: capacity.map(|c| c.max(1)),
            overflow,
            slot: Mutex::new(Slot {
                queue: VecDeque::new(),
                terminal: None,
                closed: false,
                dropped: 0,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Number of values discarded by the overflow policy so far.
    pub(crate) fn dropped(&self) -> u64 {
        self.slot.lock().dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.slot.lock().queue.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Buffers `value` according to the overflow policy.
    ///
    /// Only `OverflowPolicy::Block` can suspend; the wait ends early when `token` is cancelled.
    pub(crate) async fn push(&self, value: T, token: &CancellationToken) -> Push {
        let timeout = match self.overflow {
            OverflowPolicy::Block { timeout } => timeout,
            OverflowPolicy::DropOldest | OverflowPolicy::DropNewest => {
                return self.push_now(value, self.overflow)
            }
        };

        let deadline = Instant::now() + timeout;
        let mut value = value;
        loop {
            match self.try_push(value) {
                Ok(outcome) => return outcome,
                Err(rejected) => value = rejected,
            }
            tokio::select! {
                _ = self.writable.notified() => {}
                _ = time::sleep_until(deadline) => {
                    return self.push_now(value, OverflowPolicy::DropOldest);
                }
                _ = token.cancelled() => return Push::Closed,
            }
        }
    }

    /// Pushes without waiting; hands the value back when the buffer is full.
    fn try_push(&self, value: T) -> Result<Push, T> {
        let mut slot = self.slot.lock();
        if !slot.accepts() {
            return Ok(Push::Closed);
        }
        if slot.is_full(self.capacity) {
            return Err(value);
        }
        slot.queue.push_back(value);
        drop(slot);
        self.readable.notify_one();
        Ok(Push::Delivered)
    }

    fn push_now(&self, value: T, overflow: OverflowPolicy) -> Push {
        let mut slot = self.slot.lock();
        if !slot.accepts() {
            return Push::Closed;
        }
        let mut outcome = Push::Delivered;
        if slot.is_full(self.capacity) {
            slot.dropped += 1;
            if overflow == OverflowPolicy::DropNewest {
                return Push::Dropped("drop_newest");
            }
            slot.queue.pop_front();
            outcome = Push::Dropped("drop_oldest");
        }
        slot.queue.push_back(value);
        drop(slot);
        self.readable.notify_one();
        outcome
    }

    /// Waits for the next value, the terminal item, or closure.
    pub(crate) async fn recv(&self) -> Result<T, BroadcastError> {
        loop {
            {
                let mut slot = self.slot.lock();
                if slot.closed {
                    return Err(BroadcastError::Closed);
                }
                if let Some(value) = slot.queue.pop_front() {
                    drop(slot);
                    self.writable.notify_one();
                    return Ok(value);
                }
                if let Some(terminal) = slot.terminal.take() {
                    slot.closed = true;
                    return Err(terminal);
                }
            }
            // notify_one stores a permit when nobody waits, so a push between the
            // check above and this await is not lost.
            self.readable.notified().await;
        }
    }

    /// Stores the terminal item. Returns `false` if one was already stored or the
    /// subscription is closed.
    pub(crate) fn finish(&self, terminal: BroadcastError) -> bool {
        let mut slot = self.slot.lock();
        if !slot.accepts() {
            return false;
        }
        if terminal == BroadcastError::Cancelled {
            slot.queue.clear();
        }
        slot.terminal = Some(terminal);
        drop(slot);
        self.readable.notify_one();
        self.writable.notify_one();
        true
    }

    /// Closes the subscription and releases its buffer.
    pub(crate) fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.terminal = None;
        slot.queue = VecDeque::new();
        drop(slot);
        self.readable.notify_one();
        self.writable.notify_one();
    }
}
