use super::events::FallbackEvent;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Notify};
use tower::{Service, ServiceExt};

type SinkFuture<E> = Pin<Box<dyn std::future::Future<Output = Result<(), E>> + Send>>;

/// Queue depth used by [`FallbackBuilder::with_telemetry`](crate::FallbackBuilder::with_telemetry).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A telemetry sink that consumes fallback events.
pub trait TelemetrySink:
    tower::Service<FallbackEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Logs every event through `tracing` at `info`.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<FallbackEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: FallbackEvent) -> Self::Future {
        match &event {
            FallbackEvent::AttemptFailed { implementation, attempt, .. } => {
                tracing::info!(%event, implementation = %implementation, attempt, "fallback_event")
            }
            FallbackEvent::Succeeded { implementation, attempt, .. } => {
                tracing::info!(%event, implementation = %implementation, attempt, "fallback_event")
            }
            FallbackEvent::Exhausted { attempts, .. } => {
                tracing::info!(%event, attempts, "fallback_event")
            }
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// Keeps the most recent events in memory.
///
/// Once `capacity` events are held, each new event evicts the oldest one. Clones share the
/// same buffer, so a clone handed to the builder can be inspected from the test or caller
/// that kept the original.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<VecDeque<FallbackEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
    recorded: Arc<AtomicU64>,
    notify: Arc<Notify>,
}

impl MemorySink {
    /// A sink holding up to 10 000 events.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// A sink holding up to `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
            evicted: Arc::new(AtomicU64::new(0)),
            recorded: Arc::new(AtomicU64::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    // A panic while holding the lock cannot leave the deque half-written, so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<FallbackEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the retained events, oldest first.
    pub fn events(&self) -> Vec<FallbackEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Retained `Succeeded` and `Exhausted` events, one per finished invocation.
    pub fn outcomes(&self) -> Vec<FallbackEvent> {
        self.lock().iter().filter(|event| event.is_terminal()).cloned().collect()
    }

    /// How many retained `AttemptFailed` events name `implementation`.
    pub fn failures_of(&self, implementation: &str) -> usize {
        self.lock()
            .iter()
            .filter(|event| {
                matches!(event, FallbackEvent::AttemptFailed { implementation: name, .. } if name == implementation)
            })
            .count()
    }

    /// Forget retained events. Eviction and recorded counts are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events pushed out by newer ones.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Wait until at least `count` events have been recorded since creation.
    ///
    /// Evicted and cleared events still count, so this never waits on capacity. Events reach
    /// the sink from the telemetry queue's worker task, which makes this the way to
    /// synchronise with delivery.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.recorded.load(Ordering::Acquire) >= count as u64 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<FallbackEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: FallbackEvent) -> Self::Future {
        {
            let mut events = self.lock();
            if events.len() >= self.capacity {
                events.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            events.push_back(event);
        }
        self.recorded.fetch_add(1, Ordering::Release);
        self.notify.notify_waiters();
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

/// Error from one branch of a [`MulticastSink`].
#[derive(Debug, thiserror::Error)]
#[error("telemetry sink error: {0}")]
pub struct ComposedSinkError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl ComposedSinkError {
    fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }
}

/// Fans every event out to two sinks concurrently.
///
/// Each branch is driven to readiness on its own before it receives the event, so a
/// branch that applies backpressure delays only its own delivery.
#[derive(Clone, Debug)]
pub struct MulticastSink<A, B> {
    sink_a: A,
    sink_b: B,
}

impl<A, B> MulticastSink<A, B> {
    /// Deliver to `sink_a` and `sink_b`.
    pub fn new(sink_a: A, sink_b: B) -> Self {
        Self { sink_a, sink_b }
    }
}

async fn deliver<S>(sink: S, event: FallbackEvent) -> Result<(), ComposedSinkError>
where
    S: Service<FallbackEvent, Response = ()>,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let mut ready = sink.ready_oneshot().await.map_err(ComposedSinkError::new)?;
    ready.call(event).await.map_err(ComposedSinkError::new)
}

impl<A, B> Service<FallbackEvent> for MulticastSink<A, B>
where
    A: tower::Service<FallbackEvent, Response = ()> + Clone + Send + 'static,
    A::Error: std::error::Error + Send + Sync + 'static,
    A::Future: Send + 'static,
    B: tower::Service<FallbackEvent, Response = ()> + Clone + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
    B::Future: Send + 'static,
{
    type Response = ();
    type Error = ComposedSinkError;
    type Future = SinkFuture<Self::Error>;

    // Readiness is checked per branch inside `call`, on the clones that receive the event.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: FallbackEvent) -> Self::Future {
        let sink_a = self.sink_a.clone();
        let sink_b = self.sink_b.clone();
        let copy = event.clone();

        Box::pin(async move {
            let (res_a, res_b) = tokio::join!(deliver(sink_a, event), deliver(sink_b, copy));
            res_a?;
            res_b
        })
    }
}

impl<A, B> TelemetrySink for MulticastSink<A, B>
where
    A: tower::Service<FallbackEvent, Response = ()> + Clone + Send + 'static,
    A::Error: std::error::Error + Send + Sync + 'static,
    A::Future: Send + 'static,
    B: tower::Service<FallbackEvent, Response = ()> + Clone + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
    B::Future: Send + 'static,
{
    type SinkError = ComposedSinkError;
}

/// Decouples event producers from a slow or stalled sink.
///
/// Events go into a bounded queue with `try_send`; a worker task owns the wrapped sink,
/// waits for it to become ready and delivers events in order. When the queue is full the
/// event is dropped and counted, so producers never wait on the sink.
///
/// The worker is spawned on the current tokio runtime. Created outside a runtime, the
/// wrapper has no worker and drops (and counts) every event.
#[derive(Clone, Debug)]
pub struct NonBlockingSink {
    tx: mpsc::Sender<FallbackEvent>,
    dropped: Arc<AtomicU64>,
}

impl NonBlockingSink {
    /// Wrap `sink` behind a queue of `capacity` events (at least one).
    pub fn with_capacity<S>(sink: S, capacity: usize) -> Self
    where
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut sink = sink;
                    while let Some(event) = rx.recv().await {
                        if sink.ready().await.is_err() {
                            tracing::debug!("telemetry sink failed readiness, event discarded");
                            continue;
                        }
                        if sink.call(event).await.is_err() {
                            tracing::debug!("telemetry sink rejected event");
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!("no tokio runtime, fallback telemetry events will be dropped");
                drop(rx);
            }
        }

        Self { tx, dropped }
    }

    /// Queue `event` without waiting. Returns `false` if it was dropped.
    pub fn try_emit(&self, event: FallbackEvent) -> bool {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// How many events were dropped because the queue was full or had no worker.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Service<FallbackEvent> for NonBlockingSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: FallbackEvent) -> Self::Future {
        self.try_emit(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NonBlockingSink {
    type SinkError = Infallible;
}
