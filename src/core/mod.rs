//! Broadcaster core: background loop, fan-out and lifecycle.
//!
//! The public API from this module is [`Broadcaster`] (with its [`BroadcasterBuilder`]
//! and [`BroadcasterConfig`]) and the [`Receiver`] consumer handle.
//!
//! Internal modules:
//! - [`actor`]: the connect / stream / backoff loop;
//! - [`runner`]: cancellable single steps (open a session, pull one item, wait);
//! - [`registry`]: the set of live subscriptions, fan-out and terminal delivery;
//! - [`subscription`]: the per-receiver buffer and its overflow handling.

mod actor;
mod broadcaster;
mod builder;
mod config;
mod receiver;
mod registry;
mod runner;
mod status;
mod subscription;

pub use broadcaster::Broadcaster;
pub use builder::BroadcasterBuilder;
pub use config::{BroadcasterConfig, EndOfStreamPolicy, OverflowPolicy, DEFAULT_RECEIVER_CAPACITY};
pub use receiver::Receiver;
pub use status::{Phase, Status};
