//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] per-broadcaster `tokio::sync::broadcast` channel that stamps the stream name
//!
//! ## Quick reference
//! - **Publishers**: `core::actor::StreamActor` (upstream and terminal events),
//!   `core::registry::Registry` (receiver events), `Broadcaster::stop` and `Drop`
//!   (`Stopped`, when the loop was not first).
//! - **Consumers**: anything holding [`Broadcaster::events`](crate::Broadcaster::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
