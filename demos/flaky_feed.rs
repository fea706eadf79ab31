//! # Example: flaky_feed
//!
//! Demonstrates how a [`Broadcaster`] keeps a flaky upstream connected and fans its
//! values out to independent receivers.
//!
//! The upstream refuses the first two connections, then streams a few ticks and breaks
//! mid-stream. The retry counter resets once ticks flow, so the feed recovers forever
//! until `stop()` is called.
//!
//! ## Flow
//! ```text
//! StreamActor::run()
//!   ├─► Connecting(attempt=1) → ConnectFailed → BackoffScheduled(200ms)
//!   ├─► Connecting(attempt=2) → ConnectFailed → BackoffScheduled(400ms)
//!   ├─► Connecting(attempt=3) → Streaming → tick 0..4 → SessionFailed
//!   ├─► BackoffScheduled(200ms)  (counter was reset by the first tick)
//!   └─► ...
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example flaky_feed
//! ```

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use futures::{stream, StreamExt};
use streamvisor::{
    Broadcaster, BroadcasterConfig, FactoryRef, JitterPolicy, LinearBackoff, SessionError,
    StreamFn, Transformed,
};
use tracing_subscriber::EnvFilter;

static CONNECTS: AtomicU64 = AtomicU64::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Upstream: refuse twice, then stream ticks and break after five.
    let ticks: FactoryRef<u64> = StreamFn::arc(|| async {
        let connect = CONNECTS.fetch_add(1, Ordering::Relaxed) + 1;
        if connect <= 2 {
            return Err(SessionError::connect(format!("connection refused (#{connect})")));
        }
        let upstream = stream::unfold(0u64, |n| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if n == 5 {
                return Some((Err(SessionError::stream("connection reset by peer")), n + 1));
            }
            Some((Ok(n), n + 1))
        })
        .take(6);
        Ok(upstream)
    });
    let labels: FactoryRef<String> = Transformed::arc(ticks, |n| format!("tick #{n}"));

    // 2. Retry: 200ms + 200ms per consecutive failure, capped at 2s, ±10% jitter.
    let retry = LinearBackoff::new(Duration::from_millis(200))
        .with_increment(Duration::from_millis(200))
        .with_max(Duration::from_secs(2))
        .with_jitter(JitterPolicy::Proportional(0.1));

    // 3. Broadcaster with small receiver buffers.
    let broadcaster = Broadcaster::builder("ticks", labels)
        .with_retry(retry)
        .with_config(BroadcasterConfig {
            receiver_capacity: 8,
            ..Default::default()
        })
        .build();

    // 4. Two independent consumers.
    let mut fast = broadcaster.new_receiver()?;
    let slow = broadcaster.new_receiver_with_capacity(2)?;

    let slow_task = tokio::spawn(async move {
        let mut slow = slow.into_stream();
        while let Some(label) = slow.next().await {
            println!("[slow] {label}");
            tokio::time::sleep(Duration::from_millis(350)).await;
        }
    });

    let mut events = broadcaster.events();
    let event_task = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            println!(
                "[event] seq={} kind={:?} attempt={:?} delay_ms={:?} reason={:?}",
                ev.seq, ev.kind, ev.attempt, ev.delay_ms, ev.reason
            );
            if ev.is_terminal() {
                break;
            }
        }
    });

    for _ in 0..12 {
        let label = fast.receive().await?;
        println!("[fast] {label}");
    }

    // 5. Shut down; both consumers observe `Cancelled`.
    broadcaster.stop().await;
    println!("[fast] after stop: {:?}", fast.receive().await);
    println!("status: {:?}", broadcaster.status());

    slow_task.await?;
    event_task.await?;
    Ok(())
}
