//! # streamvisor
//!
//! **Streamvisor** keeps one long-lived upstream stream connected and fans every value
//! out to any number of independent consumers.
//!
//! The upstream is described by a [`StreamFactory`] that opens a fresh session per attempt.
//! When a session fails or ends, a pluggable [`RetryStrategy`] decides how long to wait
//! before reconnecting, or whether to give up.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                   ┌──────────────────────────────┐
//!                   │   StreamFactory (user code)  │
//!                   │   open() ──► StreamSession   │
//!                   └──────────────┬───────────────┘
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broadcaster                                                      │
//! │  - StreamActor (connect / stream / backoff loop, owns strategy)   │
//! │  - Registry (live subscriptions, one lock, stopped flag)          │
//! │  - Bus (lifecycle events)                                         │
//! │  - watch::Sender<Status> (phase / retry snapshots)                │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ Subscription │   │ Subscription │   │ Subscription │   │
//!     │  (buffer)    │   │  (buffer)    │   │  (buffer)    │   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘   │
//!            ▼                  ▼                  ▼           ▼
//!        Receiver 1         Receiver 2         Receiver N   events()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──► Connecting ──► Streaming ──┐
//!              ▲    │                 │ failure / end-of-stream
//!              │    └──► Backoff ◄────┘
//!              └──────────┘
//!
//! loop {
//!   ├─► publish Connecting{ stream, attempt }
//!   ├─► factory.open()
//!   │       ├─ Err ──► publish ConnectFailed
//!   │       └─ Ok  ──► session.advance() until end / error
//!   │                  ├─ first value ─► strategy.reset(), publish Streaming
//!   │                  ├─ each value  ─► dispatch to every live receiver
//!   │                  └─ end / error ─► session.close(), publish SessionEnded / SessionFailed
//!   └─► strategy.next()
//!        ├─ Retry  ─► publish BackoffScheduled, sleep(delay) (cancellable)
//!        └─ GiveUp ─► Exhausted delivered to every receiver, Stopped
//! }
//!
//! stop() ─► cancel ─► Cancelled delivered to every receiver, Stopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                                   |
//! |-------------------|------------------------------------------------------------------|------------------------------------------------------|
//! | **Broadcasting**  | One upstream, many independent bounded receivers.                | [`Broadcaster`], [`Receiver`]                        |
//! | **Policies**      | Constant, linear and exponential retry with jitter and limits.   | [`RetryStrategy`], [`LinearBackoff`], [`RetryConfig`]|
//! | **Sessions**      | Any `futures::Stream` or custom session type as the upstream.    | [`StreamFactory`], [`StreamSession`], [`StreamFn`]   |
//! | **Events**        | Lifecycle events for logging, metrics and tests.                 | [`Event`], [`EventKind`]                             |
//! | **Errors**        | Classified upstream errors and caller-facing errors.             | [`SessionError`], [`BroadcastError`]                 |
//! | **Configuration** | Buffer sizes, overflow, end-of-stream handling, stop grace.      | [`BroadcasterConfig`]                                |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use futures::stream;
//! use streamvisor::{Broadcaster, FactoryRef, LinearBackoff, SessionError, StreamFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // A fresh upstream per attempt; here a finite stream that keeps reconnecting.
//!     let factory: FactoryRef<String> = StreamFn::arc(|| async {
//!         Ok::<_, SessionError>(stream::iter(vec![Ok("tick".to_string())]))
//!     });
//!
//!     let broadcaster = Broadcaster::start(
//!         "ticks",
//!         factory,
//!         LinearBackoff::new(Duration::from_millis(10)),
//!     );
//!
//!     let mut rx = broadcaster.new_receiver().unwrap();
//!     assert_eq!(rx.receive().await.unwrap(), "tick");
//!
//!     broadcaster.stop().await;
//!     assert!(rx.receive().await.is_err());
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod session;

// ---- Public re-exports ----

pub use core::{
    Broadcaster, BroadcasterBuilder, BroadcasterConfig, EndOfStreamPolicy, OverflowPolicy, Phase,
    Receiver, Status, DEFAULT_RECEIVER_CAPACITY,
};
pub use error::{BroadcastError, SessionError};
pub use events::{Event, EventKind};
pub use policies::{
    ConstantDelay, ExponentialBackoff, Intervals, JitterPolicy, LinearBackoff, RetryConfig,
    RetryDecision, RetryState, RetryStrategy,
};
pub use session::{BoxSession, FactoryRef, StreamFactory, StreamFn, StreamSession, Transformed};
