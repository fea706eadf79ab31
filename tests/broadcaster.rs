use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use streamvisor::{
    BoxSession, BroadcastError, Broadcaster, BroadcasterConfig, ConstantDelay, EndOfStreamPolicy,
    EventKind, FactoryRef, LinearBackoff, OverflowPolicy, Phase, RetryConfig, SessionError,
    StreamFactory, StreamFn, StreamSession, Transformed,
};

type Upstream = BoxStream<'static, Result<u32, SessionError>>;

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

fn manual() -> BroadcasterConfig {
    BroadcasterConfig {
        auto_start: false,
        ..Default::default()
    }
}

/// First session reads from the returned sender; later attempts fail to connect.
fn channel_factory() -> (mpsc::UnboundedSender<u32>, FactoryRef<u32>) {
    let (tx, rx) = mpsc::unbounded_channel::<u32>();
    let slot = Arc::new(Mutex::new(Some(rx)));
    let factory: FactoryRef<u32> = StreamFn::arc(move || {
        let rx = slot.lock().take();
        async move {
            match rx {
                Some(rx) => {
                    let upstream: Upstream = stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|v| (Ok(v), rx))
                    })
                    .boxed();
                    Ok(upstream)
                }
                None => Err(SessionError::connect("upstream gone")),
            }
        }
    });
    (tx, factory)
}

/// Every attempt yields `items` and then ends.
fn finite_factory(items: Vec<u32>, calls: Arc<AtomicU32>) -> FactoryRef<u32> {
    StreamFn::arc(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let items = items.clone();
        async move {
            let upstream: Upstream = stream::iter(items.into_iter().map(Ok)).boxed();
            Ok::<_, SessionError>(upstream)
        }
    })
}

/// Every attempt fails to connect.
fn refusing_factory(calls: Arc<AtomicU32>) -> FactoryRef<u32> {
    StreamFn::arc(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<Upstream, _>(SessionError::connect("refused")) }
    })
}

/// Every attempt connects and then never yields.
fn silent_factory() -> FactoryRef<u32> {
    StreamFn::arc(|| async {
        let upstream: Upstream = stream::pending().boxed();
        Ok::<_, SessionError>(upstream)
    })
}

/// Never yields; `close()` takes `delay` and then sets `closed`.
struct SlowClose {
    delay: Duration,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StreamSession<u32> for SlowClose {
    async fn advance(&mut self) -> Result<Option<u32>, SessionError> {
        futures::future::pending().await
    }

    async fn close(&mut self) {
        tokio::time::sleep(self.delay).await;
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct SlowCloseFactory {
    delay: Duration,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StreamFactory<u32> for SlowCloseFactory {
    async fn open(&self) -> Result<BoxSession<u32>, SessionError> {
        Ok(Box::new(SlowClose {
            delay: self.delay,
            closed: Arc::clone(&self.closed),
        }))
    }
}

fn slow_close_factory(delay: Duration, closed: Arc<AtomicBool>) -> FactoryRef<u32> {
    Arc::new(SlowCloseFactory { delay, closed })
}

#[tokio::test]
async fn test_fan_out_in_order_without_replay() {
    let (tx, factory) = channel_factory();
    let broadcaster = Broadcaster::builder("prices", factory)
        .with_retry(ConstantDelay::new(Duration::from_millis(10)))
        .with_config(manual())
        .build();

    let mut a = broadcaster.new_receiver().unwrap();
    let mut b = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    tx.send(1).unwrap();
    tx.send(2).unwrap();
    for rx in [&mut a, &mut b] {
        assert_eq!(within(rx.receive()).await, Ok(1));
        assert_eq!(within(rx.receive()).await, Ok(2));
    }

    let mut late = broadcaster.new_receiver().unwrap();
    tx.send(3).unwrap();
    assert_eq!(within(late.receive()).await, Ok(3));
    assert_eq!(within(a.receive()).await, Ok(3));
    assert_eq!(within(b.receive()).await, Ok(3));
    assert_eq!(broadcaster.receiver_count(), 3);

    broadcaster.stop().await;
    assert_eq!(within(late.receive()).await, Err(BroadcastError::Cancelled));
}

#[tokio::test]
async fn test_reconnects_after_failures_then_streams() {
    let calls = Arc::new(AtomicU32::new(0));
    let factory: FactoryRef<u32> = {
        let calls = Arc::clone(&calls);
        StreamFn::arc(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 3 {
                    return Err(SessionError::connect(format!("attempt {n} refused")));
                }
                let upstream: Upstream = stream::iter(vec![Ok(7)]).chain(stream::pending()).boxed();
                Ok(upstream)
            }
        })
    };

    let broadcaster = Broadcaster::builder("flaky", factory)
        .with_retry(ConstantDelay::new(Duration::ZERO))
        .with_config(manual())
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    assert_eq!(within(rx.receive()).await, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let status = broadcaster.status();
    assert_eq!(status.phase, Phase::Streaming);
    assert_eq!(status.attempts, 4);
    assert_eq!(status.sessions_opened, 1);
    assert_eq!(status.retry.attempt_count, 0);
    assert_eq!(
        status.last_error.as_deref(),
        Some("connect failed: attempt 3 refused")
    );

    broadcaster.stop().await;
    assert_eq!(broadcaster.phase(), Phase::Stopped);
    assert_eq!(within(rx.receive()).await, Err(BroadcastError::Cancelled));
}

#[tokio::test]
async fn test_gives_up_after_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("doomed", refusing_factory(Arc::clone(&calls)))
        .with_retry(LinearBackoff::new(Duration::from_millis(1)).with_limit(2))
        .with_config(manual())
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    let expected = BroadcastError::Exhausted {
        attempts: 3,
        last_error: Some("connect failed: refused".to_string()),
    };
    assert_eq!(within(rx.receive()).await, Err(expected.clone()));
    assert_eq!(rx.receive().await, Err(BroadcastError::Closed));
    assert_eq!(rx.termination(), Some(&expected));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert_eq!(broadcaster.phase(), Phase::Stopped);
    assert_eq!(
        broadcaster.new_receiver().err(),
        Some(BroadcastError::AlreadyStopped)
    );

    broadcaster.stop().await;
    assert_eq!(rx.receive().await, Err(BroadcastError::Closed));
}

#[tokio::test]
async fn test_stop_is_idempotent_and_cancels_pending_receives() {
    let broadcaster = Broadcaster::start("quiet", silent_factory(), LinearBackoff::default());

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let mut rx = broadcaster.new_receiver().unwrap();
            tokio::spawn(async move {
                let first = rx.receive().await;
                let second = rx.receive().await;
                (first, second)
            })
        })
        .collect();
    broadcaster.wait_for(Phase::Streaming).await;

    tokio::join!(broadcaster.stop(), broadcaster.stop());
    broadcaster.stop().await;

    for waiter in waiters {
        let (first, second) = within(waiter).await.unwrap();
        assert_eq!(first, Err(BroadcastError::Cancelled));
        assert_eq!(second, Err(BroadcastError::Closed));
    }
    assert_eq!(broadcaster.phase(), Phase::Stopped);
    assert_eq!(broadcaster.receiver_count(), 0);
    assert_eq!(
        broadcaster.launch(),
        Err(BroadcastError::AlreadyStopped)
    );
}

#[tokio::test]
async fn test_closed_receiver_does_not_affect_others() {
    let (tx, factory) = channel_factory();
    let broadcaster = Broadcaster::builder("shared", factory)
        .with_config(manual())
        .build();
    let mut kept = broadcaster.new_receiver().unwrap();
    let mut closed = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    closed.close();
    closed.close();
    assert_eq!(broadcaster.receiver_count(), 1);

    tx.send(10).unwrap();
    assert_eq!(within(kept.receive()).await, Ok(10));
    assert_eq!(closed.receive().await, Err(BroadcastError::Closed));

    drop(kept);
    assert_eq!(broadcaster.receiver_count(), 0);
    broadcaster.stop().await;
}

#[tokio::test]
async fn test_complete_policy_finishes_after_buffered_values() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("finite", finite_factory(vec![1, 2, 3], Arc::clone(&calls)))
        .with_retry(ConstantDelay::new(Duration::ZERO))
        .with_config(BroadcasterConfig {
            end_of_stream: EndOfStreamPolicy::Complete,
            ..manual()
        })
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    let values: Vec<u32> = within(rx.stream().collect()).await;
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(rx.termination(), Some(&BroadcastError::Finished));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(broadcaster.phase(), Phase::Stopped);
}

#[tokio::test]
async fn test_end_of_stream_reconnects_by_default() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("repeating", finite_factory(vec![5], Arc::clone(&calls)))
        .with_retry(ConstantDelay::new(Duration::ZERO))
        .with_config(manual())
        .build();
    let rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    let values: Vec<u32> = within(rx.into_stream().take(3).collect()).await;
    assert_eq!(values, vec![5, 5, 5]);
    assert!(calls.load(Ordering::SeqCst) >= 3);
    broadcaster.stop().await;
}

#[tokio::test]
async fn test_slow_receiver_drops_oldest_only_for_itself() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("burst", finite_factory(vec![1, 2, 3], calls))
        .with_config(BroadcasterConfig {
            end_of_stream: EndOfStreamPolicy::Complete,
            ..manual()
        })
        .build();
    let mut slow = broadcaster.new_receiver_with_capacity(1).unwrap();
    let mut unbounded = broadcaster.new_receiver_with_capacity(0).unwrap();
    broadcaster.launch().unwrap();
    within(broadcaster.wait_for(Phase::Stopped)).await;

    assert_eq!(slow.receive().await, Ok(3));
    assert_eq!(slow.receive().await, Err(BroadcastError::Finished));
    assert_eq!(slow.dropped(), 2);

    for expected in 1..=3 {
        assert_eq!(unbounded.receive().await, Ok(expected));
    }
    assert_eq!(unbounded.receive().await, Err(BroadcastError::Finished));
    assert_eq!(unbounded.dropped(), 0);
}

#[tokio::test]
async fn test_transformed_values_reach_receivers() {
    let calls = Arc::new(AtomicU32::new(0));
    let factory: FactoryRef<String> =
        Transformed::arc(finite_factory(vec![1, 2], calls), |x| format!("transformed_{x}"));
    let broadcaster = Broadcaster::builder("named", factory)
        .with_config(BroadcasterConfig {
            end_of_stream: EndOfStreamPolicy::Complete,
            ..manual()
        })
        .build();
    let rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    let values: Vec<String> = within(rx.into_stream().collect()).await;
    assert_eq!(values, vec!["transformed_1", "transformed_2"]);
}

#[tokio::test]
async fn test_lifecycle_events_on_give_up() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("observed", refusing_factory(calls))
        .with_retry_config(&RetryConfig::Constant {
            delay: Duration::from_millis(1),
            limit: Some(1),
        })
        .with_config(manual())
        .build();
    let mut events = broadcaster.events();
    broadcaster.launch().unwrap();

    let mut kinds = Vec::new();
    loop {
        let ev = within(events.recv()).await.unwrap();
        assert_eq!(ev.stream.as_deref(), Some("observed"));
        kinds.push(ev.kind);
        if ev.is_terminal() {
            break;
        }
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::Connecting,
            EventKind::ConnectFailed,
            EventKind::BackoffScheduled,
            EventKind::Connecting,
            EventKind::ConnectFailed,
            EventKind::Exhausted,
        ]
    );
}

#[tokio::test]
async fn test_upstream_cancellation_stops_broadcaster() {
    let factory: FactoryRef<u32> = StreamFn::arc(|| async {
        let upstream: Upstream = stream::iter(vec![Ok(1), Err(SessionError::Cancelled)]).boxed();
        Ok::<_, SessionError>(upstream)
    });
    let broadcaster = Broadcaster::builder("cancelled", factory)
        .with_config(manual())
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    within(broadcaster.wait_for(Phase::Stopped)).await;
    assert_eq!(rx.receive().await, Err(BroadcastError::Cancelled));
    assert_eq!(
        broadcaster.new_receiver().err(),
        Some(BroadcastError::AlreadyStopped)
    );
}

#[tokio::test]
async fn test_dropping_broadcaster_cancels_receivers() {
    let broadcaster = Broadcaster::start("dropped", silent_factory(), LinearBackoff::default());
    let mut rx = broadcaster.new_receiver().unwrap();
    drop(broadcaster);
    assert_eq!(within(rx.receive()).await, Err(BroadcastError::Cancelled));
}

#[tokio::test]
async fn test_stop_before_launch_cancels_receivers() {
    let broadcaster = Broadcaster::builder("idle", silent_factory())
        .with_config(manual())
        .build();
    assert_eq!(broadcaster.phase(), Phase::Idle);
    let mut rx = broadcaster.new_receiver().unwrap();

    broadcaster.stop().await;
    assert_eq!(rx.receive().await, Err(BroadcastError::Cancelled));
    assert_eq!(broadcaster.phase(), Phase::Stopped);
}

#[tokio::test]
async fn test_zero_delay_retry_loop_yields_to_stop() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::start(
        "spinning",
        refusing_factory(Arc::clone(&calls)),
        ConstantDelay::new(Duration::ZERO),
    );
    let mut rx = broadcaster.new_receiver().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    within(broadcaster.stop()).await;

    assert!(calls.load(Ordering::SeqCst) > 1);
    assert_eq!(rx.receive().await, Err(BroadcastError::Cancelled));
    assert_eq!(broadcaster.phase(), Phase::Stopped);
}

#[tokio::test]
async fn test_abandoned_stop_still_cancels_receivers() {
    let closed = Arc::new(AtomicBool::new(false));
    let broadcaster = Broadcaster::start(
        "slow-close",
        slow_close_factory(Duration::from_millis(300), Arc::clone(&closed)),
        LinearBackoff::default(),
    );
    let mut rx = broadcaster.new_receiver().unwrap();
    within(broadcaster.wait_for(Phase::Streaming)).await;

    // The session is still closing when the caller gives up on stop().
    let abandoned = tokio::time::timeout(Duration::from_millis(50), broadcaster.stop()).await;
    assert!(abandoned.is_err());

    assert_eq!(within(rx.receive()).await, Err(BroadcastError::Cancelled));
    assert!(closed.load(Ordering::SeqCst));

    within(broadcaster.stop()).await;
    assert_eq!(broadcaster.phase(), Phase::Stopped);
}

#[tokio::test]
async fn test_zero_grace_still_closes_session() {
    let closed = Arc::new(AtomicBool::new(false));
    let broadcaster = Broadcaster::builder(
        "no-grace",
        slow_close_factory(Duration::from_millis(20), Arc::clone(&closed)),
    )
    .with_config(BroadcasterConfig {
        grace: Duration::ZERO,
        ..Default::default()
    })
    .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    within(broadcaster.wait_for(Phase::Streaming)).await;

    within(broadcaster.stop()).await;
    assert_eq!(rx.receive().await, Err(BroadcastError::Cancelled));
    assert_eq!(broadcaster.phase(), Phase::Stopped);

    within(async {
        while !closed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn test_sessions_without_values_do_not_reset_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let broadcaster = Broadcaster::builder("empty", finite_factory(Vec::new(), Arc::clone(&calls)))
        .with_retry(ConstantDelay::new(Duration::ZERO).with_limit(3))
        .with_config(manual())
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();
    broadcaster.launch().unwrap();

    let expected = BroadcastError::Exhausted {
        attempts: 4,
        last_error: Some("stream failed: end of stream".to_string()),
    };
    assert_eq!(within(rx.receive()).await, Err(expected));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(broadcaster.status().sessions_opened, 4);
}

#[tokio::test]
async fn test_stop_interrupts_blocked_dispatch() {
    let (tx, factory) = channel_factory();
    let broadcaster = Broadcaster::builder("blocked", factory)
        .with_config(BroadcasterConfig {
            receiver_capacity: 1,
            overflow: OverflowPolicy::Block {
                timeout: Duration::from_secs(60),
            },
            ..Default::default()
        })
        .build();
    let mut rx = broadcaster.new_receiver().unwrap();

    tx.send(1).unwrap();
    tx.send(2).unwrap();
    // The second value waits for room that never comes.
    within(async {
        while broadcaster.status().values_observed < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    within(broadcaster.stop()).await;
    assert_eq!(rx.receive().await, Err(BroadcastError::Cancelled));
    assert_eq!(rx.receive().await, Err(BroadcastError::Closed));
    assert_eq!(broadcaster.phase(), Phase::Stopped);
}
