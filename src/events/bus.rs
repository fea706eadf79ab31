//! # Per-broadcaster event bus.
//!
//! [`Bus`] is the lifecycle channel of one broadcaster. It is shared by the background
//! loop, the subscription registry and [`Broadcaster::stop`](crate::Broadcaster::stop), and
//! stamps every event with the broadcaster's stream name on the way out.
//!
//! ## Rules
//! - Publishing never waits; with nobody listening the event is discarded
//! - Listeners that fall behind by more than the capacity see `RecvError::Lagged(n)`
//! - Only observability data travels here; stream values use the per-receiver
//!   buffers in `core::subscription`

use std::sync::Arc;

use tokio::sync::broadcast;

use super::event::Event;

/// Lifecycle channel of one broadcaster.
#[derive(Clone, Debug)]
pub struct Bus {
    stream: Arc<str>,
    sender: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus for `stream` holding up to `capacity` undelivered events (min 1).
    pub fn new(stream: Arc<str>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { stream, sender }
    }

    /// Stamps `ev` with the stream name (unless already set) and sends it.
    pub fn publish(&self, mut ev: Event) {
        if ev.stream.is_none() {
            ev.stream = Some(Arc::clone(&self.stream));
        }
        // An error only means nobody is listening.
        let _ = self.sender.send(ev);
    }

    /// Returns a listener for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Stream name stamped on published events.
    pub fn stream(&self) -> &Arc<str> {
        &self.stream
    }
}
