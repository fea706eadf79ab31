//! # Builder for [`Broadcaster`].
//!
//! Collects the retry strategy and [`BroadcasterConfig`] before the broadcaster exists.
//! `build()` falls back to [`LinearBackoff::default`] and launches the background loop
//! when `auto_start` is set.

use std::sync::Arc;

use crate::{
    core::{broadcaster::Broadcaster, config::BroadcasterConfig},
    policies::{LinearBackoff, RetryConfig, RetryStrategy},
    session::FactoryRef,
};

/// Builder for constructing a [`Broadcaster`] with optional settings.
pub struct BroadcasterBuilder<T: Clone + Send + 'static> {
    name: Arc<str>,
    factory: FactoryRef<T>,
    strategy: Option<Box<dyn RetryStrategy>>,
    config: BroadcasterConfig,
}

impl<T: Clone + Send + 'static> BroadcasterBuilder<T> {
    pub(crate) fn new(name: Arc<str>, factory: FactoryRef<T>) -> Self {
        Self {
            name,
            factory,
            strategy: None,
            config: BroadcasterConfig::default(),
        }
    }

    /// Sets the retry strategy.
    ///
    /// The broadcaster keeps an independent copy with a fresh state.
    /// Defaults to [`LinearBackoff::default`] (every 3s, up to 1s jitter, forever).
    pub fn with_retry(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.strategy = Some(strategy.copy());
        self
    }

    /// Sets the retry strategy from a declarative [`RetryConfig`].
    pub fn with_retry_config(mut self, retry: &RetryConfig) -> Self {
        self.strategy = Some(retry.build());
        self
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: BroadcasterConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the broadcaster and, when `auto_start` is set, starts connecting.
    ///
    /// Must be called from within a Tokio runtime when `auto_start` is set.
    pub fn build(self) -> Broadcaster<T> {
        let strategy = self
            .strategy
            .unwrap_or_else(|| Box::new(LinearBackoff::default()));
        let auto_start = self.config.auto_start;

        let broadcaster = Broadcaster::from_parts(self.name, self.factory, strategy, self.config);
        if auto_start {
            // A freshly built broadcaster is idle, so this cannot fail.
            let _ = broadcaster.launch();
        }
        broadcaster
    }
}
