//! # Broadcaster: one upstream stream, many independent receivers.
//!
//! The [`Broadcaster`] owns the subscription registry, the lifecycle event [`Bus`],
//! and the background [`StreamActor`] that keeps the upstream connected.
//!
//! ## High-level architecture
//! ```text
//! Inputs:
//!   name + FactoryRef<T> + RetryStrategy + BroadcasterConfig
//!        └──► Broadcaster::builder(..).build()   (or Broadcaster::start(..))
//!
//! Background loop (one per broadcaster):
//!   tokio::spawn(StreamActor::run(token))
//!        ├─► factory.open() ──► session.advance() ──► Registry::dispatch(value)
//!        │                                              ┌──────────┼──────────┐
//!        │                                              ▼          ▼          ▼
//!        │                                         [buffer R1] [buffer R2] [buffer RN]
//!        │                                              │          │          │
//!        │                                         Receiver 1  Receiver 2  Receiver N
//!        └─► on failure: RetryStrategy::next() ──► sleep ──► reconnect
//!
//! Shutdown path:
//!   stop()
//!     └─► token.cancel()                     → interrupts open/advance/backoff/blocked push
//!     └─► loop: session.close()              → Registry::terminate(Cancelled), phase = Stopped
//!     └─► join actor within cfg.grace        → abort past grace (grace = 0: do not wait)
//!     └─► Registry::terminate(Cancelled)     → no-op unless the loop was aborted or detached
//!
//! Whichever side terminates the registry first delivers `Cancelled` to every live
//! receiver and publishes `Stopped`; the other side finds it already stopped.
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use futures::stream;
//! use streamvisor::{Broadcaster, ConstantDelay, FactoryRef, SessionError, StreamFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let factory: FactoryRef<u32> = StreamFn::arc(|| async {
//!         Ok::<_, SessionError>(stream::iter(vec![Ok(1u32), Ok(2), Ok(3)]))
//!     });
//!
//!     let broadcaster = Broadcaster::builder("numbers", factory)
//!         .with_retry(ConstantDelay::new(Duration::from_millis(10)))
//!         .with_config(streamvisor::BroadcasterConfig {
//!             auto_start: false,
//!             ..Default::default()
//!         })
//!         .build();
//!
//!     let mut rx = broadcaster.new_receiver().unwrap();
//!     broadcaster.launch().unwrap();
//!
//!     assert_eq!(rx.receive().await, Ok(1));
//!     broadcaster.stop().await;
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        actor::StreamActor,
        builder::BroadcasterBuilder,
        config::{capacity_limit, BroadcasterConfig},
        receiver::Receiver,
        registry::Registry,
        status::{Phase, Status},
    },
    error::BroadcastError,
    events::{Bus, Event, EventKind},
    policies::RetryStrategy,
    session::FactoryRef,
};

enum Lifecycle<T> {
    Idle(StreamActor<T>),
    Running(JoinHandle<BroadcastError>),
    Stopped,
}

/// Resilient fan-out of one upstream stream to any number of [`Receiver`]s.
///
/// ### Responsibilities
/// - **Connection**: keeps the upstream open, reconnecting per the retry strategy
/// - **Fan-out**: delivers every observed value to each receiver registered at that time
/// - **Termination**: delivers exactly one terminal item to every live receiver
///
/// ### Rules
/// - Receivers created later never see earlier values (no replay)
/// - `new_receiver()` fails with `AlreadyStopped` once the broadcaster is stopped
/// - `stop()` is idempotent and safe to call from any task
/// - Dropping the broadcaster cancels it; live receivers get `Cancelled`
pub struct Broadcaster<T: Clone + Send + 'static> {
    name: Arc<str>,
    config: BroadcasterConfig,
    registry: Arc<Registry<T>>,
    bus: Bus,
    status: Arc<watch::Sender<Status>>,
    token: CancellationToken,
    lifecycle: Mutex<Lifecycle<T>>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    /// Creates a broadcaster with the default configuration and starts connecting.
    ///
    /// The broadcaster works on `strategy.copy()`, so the caller's instance is never advanced.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        name: impl Into<Arc<str>>,
        factory: FactoryRef<T>,
        strategy: impl RetryStrategy + 'static,
    ) -> Self {
        Self::builder(name, factory).with_retry(strategy).build()
    }

    /// Returns a builder for fine-grained configuration.
    pub fn builder(name: impl Into<Arc<str>>, factory: FactoryRef<T>) -> BroadcasterBuilder<T> {
        BroadcasterBuilder::new(name.into(), factory)
    }

    pub(crate) fn from_parts(
        name: Arc<str>,
        factory: FactoryRef<T>,
        strategy: Box<dyn RetryStrategy>,
        config: BroadcasterConfig,
    ) -> Self {
        let bus = Bus::new(Arc::clone(&name), config.bus_capacity_clamped());
        let registry = Registry::new(bus.clone());
        let (status, _rx) = watch::channel(Status::idle());
        let status = Arc::new(status);

        let actor = StreamActor {
            name: Arc::clone(&name),
            factory,
            strategy,
            registry: Arc::clone(&registry),
            bus: bus.clone(),
            status: Arc::clone(&status),
            end_of_stream: config.end_of_stream,
        };

        Self {
            name,
            config,
            registry,
            bus,
            status,
            token: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Idle(actor)),
        }
    }

    /// Starts the background loop of an idle broadcaster.
    ///
    /// Returns `Ok(())` if it is already running and `AlreadyStopped` after `stop()`.
    pub fn launch(&self) -> Result<(), BroadcastError> {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(actor) => {
                tracing::debug!(stream = %self.name, "launching broadcaster");
                *lifecycle = Lifecycle::Running(tokio::spawn(actor.run(self.token.clone())));
                Ok(())
            }
            running @ Lifecycle::Running(_) => {
                *lifecycle = running;
                Ok(())
            }
            Lifecycle::Stopped => Err(BroadcastError::AlreadyStopped),
        }
    }

    /// Creates a receiver using the configured default capacity.
    ///
    /// Never waits for a connection; the receiver sees values observed from now on.
    pub fn new_receiver(&self) -> Result<Receiver<T>, BroadcastError> {
        self.new_receiver_with_capacity(self.config.receiver_capacity)
    }

    /// Creates a receiver buffering at most `capacity` values (`0` = unbounded).
    pub fn new_receiver_with_capacity(&self, capacity: usize) -> Result<Receiver<T>, BroadcastError> {
        let sub = self
            .registry
            .register(capacity_limit(capacity), self.config.overflow)?;
        Ok(Receiver::new(sub, Arc::clone(&self.registry)))
    }

    /// Stops the broadcaster.
    ///
    /// Cancels any in-flight connect, read or backoff wait, waits up to the configured
    /// grace period for the background loop to close its session, then makes sure every
    /// live receiver got `Cancelled`. Calling it again, concurrently or later, waits until
    /// the broadcaster is stopped.
    ///
    /// Dropping the returned future early is safe: the loop observes the cancellation on
    /// its own and still delivers `Cancelled`.
    pub async fn stop(&self) {
        let prev = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        self.token.cancel();

        match prev {
            Lifecycle::Running(handle) => self.join(handle).await,
            Lifecycle::Idle(_) => {}
            Lifecycle::Stopped => {
                self.wait_for(Phase::Stopped).await;
                return;
            }
        }
        self.shut_down();
    }

    /// Waits for the background loop within the grace period; aborts it past that.
    ///
    /// With a zero grace the loop is left to finish closing its session on its own.
    async fn join(&self, mut handle: JoinHandle<BroadcastError>) {
        let Some(grace) = self.config.stop_grace() else {
            return;
        };

        match time::timeout(grace, &mut handle).await {
            Ok(Ok(terminal)) => {
                tracing::debug!(
                    stream = %self.name,
                    terminal = terminal.as_label(),
                    "background loop exited"
                );
            }
            Ok(Err(err)) => {
                tracing::error!(stream = %self.name, error = %err, "background loop failed");
            }
            Err(_elapsed) => {
                tracing::warn!(
                    stream = %self.name,
                    grace_ms = grace.as_millis() as u64,
                    "background loop exceeded grace period, aborting"
                );
                handle.abort();
            }
        }
    }

    /// Delivers `Cancelled` unless a terminal item was already delivered.
    fn shut_down(&self) {
        let delivered = self.registry.terminate(BroadcastError::Cancelled);
        self.status.send_modify(|s| s.phase = Phase::Stopped);
        if let Some(receivers) = delivered {
            tracing::info!(stream = %self.name, receivers, "broadcaster stopped");
            self.bus.publish(
                Event::new(EventKind::Stopped).with_reason(BroadcastError::Cancelled.as_message()),
            );
        }
    }

    /// Returns a snapshot of the current status.
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.status.borrow().phase
    }

    /// Waits until the broadcaster reaches `phase` (or `Stopped`, which is final) and
    /// returns the status observed at that moment.
    pub async fn wait_for(&self, phase: Phase) -> Status {
        let mut rx = self.status.subscribe();
        let observed = match rx
            .wait_for(|s| s.phase == phase || s.phase == Phase::Stopped)
            .await
        {
            Ok(status) => status.clone(),
            Err(_closed) => self.status(),
        };
        observed
    }

    /// Subscribes to lifecycle events published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Number of currently registered receivers.
    pub fn receiver_count(&self) -> usize {
        self.registry.len()
    }

    /// Stream name used in logs and events.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Clone + Send + 'static> Drop for Broadcaster<T> {
    fn drop(&mut self) {
        self.token.cancel();
        if !self.registry.is_stopped() {
            tracing::debug!(stream = %self.name, "broadcaster dropped without stop()");
            self.shut_down();
        }
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("name", &self.name)
            .field("phase", &self.phase())
            .field("receivers", &self.receiver_count())
            .finish()
    }
}
