//! Sequential fallback over named implementations
//!
//! Semantics:
//! - Implementations are attempted strictly in list order, one at a time, each with a clone
//!   of the caller's input.
//! - The first success short-circuits: the result is tagged with the implementation's name
//!   and nothing after it runs.
//! - A failure is handed to the observer (awaited) and then swallowed.
//! - If nothing succeeds, including when the list is empty, the invocation fails with
//!   [`FallbackError::Exhausted`].
//!
//! Invariants:
//! - At most one attempt is in flight per invocation.
//! - The observer for attempt `k` completes before attempt `k + 1` starts.
//! - The observer is never called for the implementation that succeeds.
//! - Configuration is immutable after construction; invocations share nothing mutable.
//! - Telemetry is queued without waiting; the sink never delays or changes an invocation.
//!
//! Example
//! ```rust
//! use tryfallback::Fallback;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let lookup = Fallback::builder()
//!     .implementation("cache", |_key: u32| async { Err::<u32, _>("cold cache") })
//!     .implementation("origin", |key: u32| async move { Ok(key * 10) })
//!     .on_error(|name: &&str, err: &&str| eprintln!("{name} failed: {err}"))
//!     .build();
//!
//! assert_eq!(lookup.execute(4).await, Ok(("origin", 40)));
//! # });
//! ```

use crate::error::FallbackError;
use crate::implementation::Implementation;
use crate::observer::ErrorObserver;
use crate::telemetry::{NonBlockingSink, Recorder, TelemetrySink, DEFAULT_QUEUE_CAPACITY};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower_service::Service;

/// Shared error observer.
pub type SharedObserver<N, E> = Arc<dyn ErrorObserver<N, E>>;

/// Composed operation trying each implementation in order until one succeeds.
pub struct Fallback<N, I, O, E> {
    pub(crate) implementations: Arc<[Implementation<N, I, O, E>]>,
    pub(crate) observer: Option<SharedObserver<N, E>>,
    pub(crate) telemetry: Option<Recorder<N>>,
}

impl<N, I, O, E> Clone for Fallback<N, I, O, E> {
    fn clone(&self) -> Self {
        Self {
            implementations: self.implementations.clone(),
            observer: self.observer.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

impl<N: fmt::Debug, I, O, E> fmt::Debug for Fallback<N, I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback")
            .field("implementations", &self.implementations)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .field("telemetry", &self.telemetry.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

impl<N, I, O, E> Fallback<N, I, O, E> {
    /// Construct from an ordered list of implementations and an optional observer.
    ///
    /// An empty list is accepted; every invocation of it fails with exhaustion.
    pub fn new<T>(implementations: T, on_error: Option<SharedObserver<N, E>>) -> Self
    where
        T: IntoIterator<Item = Implementation<N, I, O, E>>,
    {
        Self {
            implementations: implementations.into_iter().collect(),
            observer: on_error,
            telemetry: None,
        }
    }

    /// Construct a new builder.
    pub fn builder() -> FallbackBuilder<N, I, O, E> {
        FallbackBuilder::new()
    }

    /// Number of configured implementations.
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    /// `true` when there is nothing to attempt, so every invocation exhausts immediately.
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    /// Implementation names in attempt order.
    pub fn names(&self) -> impl Iterator<Item = &N> + '_ {
        self.implementations.iter().map(Implementation::name)
    }

    /// Telemetry events dropped because the sink's queue was full. Zero without telemetry.
    pub fn telemetry_dropped(&self) -> u64 {
        self.telemetry.as_ref().map_or(0, Recorder::dropped)
    }
}

impl<N, I, O, E> Fallback<N, I, O, E>
where
    N: Clone + fmt::Debug + Send + Sync + 'static,
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Run the implementations in order and return the first success tagged with its name.
    pub async fn execute(&self, input: I) -> Result<(N, O), FallbackError> {
        let started = Instant::now();

        for (index, implementation) in self.implementations.iter().enumerate() {
            let attempt = index + 1;
            let name = implementation.name();
            let attempt_started = Instant::now();

            match implementation.call(input.clone()).await {
                Ok(output) => {
                    tracing::debug!(
                        implementation = ?name,
                        attempt,
                        "fallback implementation succeeded"
                    );
                    if let Some(telemetry) = &self.telemetry {
                        telemetry.succeeded(name, attempt, attempt_started.elapsed());
                    }
                    return Ok((name.clone(), output));
                }
                Err(error) => {
                    tracing::debug!(
                        implementation = ?name,
                        attempt,
                        "fallback implementation failed"
                    );
                    if let Some(observer) = &self.observer {
                        observer.observe(name, &error).await;
                    }
                    if let Some(telemetry) = &self.telemetry {
                        telemetry.attempt_failed(name, attempt, attempt_started.elapsed());
                    }
                }
            }
        }

        let attempts = self.implementations.len();
        tracing::warn!(attempts, "fallback implementations exhausted");
        if let Some(telemetry) = &self.telemetry {
            telemetry.exhausted(attempts, started.elapsed());
        }
        Err(FallbackError::exhausted(attempts))
    }

    /// Convert into a plain async function value.
    pub fn into_fn(
        self,
    ) -> impl Fn(I) -> BoxFuture<'static, Result<(N, O), FallbackError>> + Clone + Send + Sync
    {
        move |input: I| {
            let this = self.clone();
            async move { this.execute(input).await }.boxed()
        }
    }
}

impl<N, I, O, E> Service<I> for Fallback<N, I, O, E>
where
    N: Clone + fmt::Debug + Send + Sync + 'static,
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + Sync + 'static,
{
    type Response = (N, O);
    type Error = FallbackError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, input: I) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.execute(input).await })
    }
}

/// Build a composed fallback operation as a closure.
///
/// ```rust
/// use tryfallback::{try_fallback, Implementation};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let op = try_fallback(
///     vec![
///         Implementation::new("first", |i: u32| async move { Ok::<_, String>(i) }),
///         Implementation::new("second", |i: u32| async move { Ok(i + 1) }),
///     ],
///     None,
/// );
/// assert_eq!(op(1).await, Ok(("first", 1)));
/// # });
/// ```
pub fn try_fallback<N, I, O, E, T>(
    implementations: T,
    on_error: Option<SharedObserver<N, E>>,
) -> impl Fn(I) -> BoxFuture<'static, Result<(N, O), FallbackError>> + Clone + Send + Sync
where
    N: Clone + fmt::Debug + Send + Sync + 'static,
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + Sync + 'static,
    T: IntoIterator<Item = Implementation<N, I, O, E>>,
{
    Fallback::new(implementations, on_error).into_fn()
}

/// Builder for [`Fallback`].
pub struct FallbackBuilder<N, I, O, E> {
    implementations: Vec<Implementation<N, I, O, E>>,
    observer: Option<SharedObserver<N, E>>,
    telemetry: Option<Recorder<N>>,
}

impl<N, I, O, E> FallbackBuilder<N, I, O, E> {
    /// Create an empty builder: no implementations, no observer, no telemetry.
    pub fn new() -> Self {
        Self { implementations: Vec::new(), observer: None, telemetry: None }
    }

    /// Append a closure implementation.
    pub fn implementation<F, Fut>(mut self, name: N, operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        self.implementations.push(Implementation::new(name, operation));
        self
    }

    /// Append a tower service implementation.
    pub fn service<S>(mut self, name: N, service: S) -> Self
    where
        I: Send + 'static,
        S: Service<I, Response = O, Error = E> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        self.implementations.push(Implementation::from_service(name, service));
        self
    }

    /// Append a prepared implementation.
    pub fn push<T>(mut self, implementation: T) -> Self
    where
        T: Into<Implementation<N, I, O, E>>,
    {
        self.implementations.push(implementation.into());
        self
    }

    /// Observe failures with a synchronous closure. Replaces any previous observer.
    pub fn on_error<F>(mut self, observer: F) -> Self
    where
        N: Sync,
        E: Sync,
        F: Fn(&N, &E) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Observe failures with any [`ErrorObserver`]. Replaces any previous observer.
    pub fn observer<Ob>(mut self, observer: Ob) -> Self
    where
        Ob: ErrorObserver<N, E> + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Emit [`FallbackEvent`](crate::telemetry::FallbackEvent)s to a telemetry sink.
    ///
    /// The sink is moved into a [`NonBlockingSink`] with [`DEFAULT_QUEUE_CAPACITY`] slots,
    /// whose worker task is spawned on the current tokio runtime. Implementation names
    /// appear in events through their `Display` rendering.
    pub fn with_telemetry<S>(self, sink: S) -> Self
    where
        N: fmt::Display,
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        self.with_telemetry_capacity(sink, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`with_telemetry`](Self::with_telemetry) with an explicit queue capacity.
    pub fn with_telemetry_capacity<S>(mut self, sink: S, capacity: usize) -> Self
    where
        N: fmt::Display,
        S: TelemetrySink,
        S::Future: Send + 'static,
    {
        self.telemetry = Some(Recorder::new(NonBlockingSink::with_capacity(sink, capacity)));
        self
    }

    /// Finish configuration. Never fails; an empty builder yields a chain that always exhausts.
    pub fn build(self) -> Fallback<N, I, O, E> {
        Fallback {
            implementations: self.implementations.into(),
            observer: self.observer,
            telemetry: self.telemetry,
        }
    }
}

impl<N, I, O, E> Default for FallbackBuilder<N, I, O, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FallbackEvent, MemorySink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn failing(msg: &'static str) -> impl Fn(u32) -> futures::future::Ready<Result<u32, TestError>> {
        move |_| futures::future::ready(Err(TestError(msg.to_string())))
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = second_calls.clone();

        let fallback = Fallback::builder()
            .implementation("first", |i: u32| async move { Ok::<_, TestError>(i) })
            .implementation("second", move |i: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(i + 1) }
            })
            .build();

        assert_eq!(fallback.execute(1).await, Ok(("first", 1)));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0, "second must not run");
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempt_count() {
        let fallback = Fallback::builder()
            .implementation("a", failing("a down"))
            .implementation("b", failing("b down"))
            .build();

        let err = fallback.execute(1).await.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 2);
    }

    #[tokio::test]
    async fn test_observer_sees_failures_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let fallback = Fallback::builder()
            .implementation("a", failing("a down"))
            .implementation("b", failing("b down"))
            .implementation("c", |i: u32| async move { Ok(i) })
            .on_error(move |name: &&'static str, err: &TestError| {
                log.lock().unwrap().push((*name, err.0.clone()));
            })
            .build();

        assert_eq!(fallback.execute(5).await, Ok(("c", 5)));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", "a down".to_string()), ("b", "b down".to_string())]
        );
    }

    #[tokio::test]
    async fn test_new_with_empty_list_exhausts() {
        let fallback: Fallback<&str, u32, u32, TestError> = Fallback::new(Vec::new(), None);
        assert!(fallback.is_empty());
        assert_eq!(fallback.execute(1).await, Err(FallbackError::Exhausted { attempts: 0 }));
    }

    #[tokio::test]
    async fn test_telemetry_records_attempts_and_outcome() {
        let sink = MemorySink::new();
        let fallback = Fallback::builder()
            .implementation("a", failing("a down"))
            .implementation("b", |i: u32| async move { Ok(i * 3) })
            .with_telemetry(sink.clone())
            .build();

        assert_eq!(fallback.execute(2).await, Ok(("b", 6)));

        sink.wait_for(2).await;
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            FallbackEvent::AttemptFailed { implementation, attempt: 1, .. } if implementation == "a"
        ));
        assert!(matches!(
            &events[1],
            FallbackEvent::Succeeded { implementation, attempt: 2, .. } if implementation == "b"
        ));
        assert_eq!(fallback.telemetry_dropped(), 0);
    }

    #[tokio::test]
    async fn test_telemetry_records_exhaustion() {
        let sink = MemorySink::new();
        let fallback = Fallback::builder()
            .implementation("a", failing("a down"))
            .with_telemetry(sink.clone())
            .build();

        let _ = fallback.execute(2).await;

        sink.wait_for(2).await;
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], FallbackEvent::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_service_impl_tags_response() {
        let fallback = Fallback::builder()
            .implementation("a", failing("a down"))
            .implementation("b", |i: u32| async move { Ok(i + 100) })
            .build();

        let response = fallback.oneshot(1).await;
        assert_eq!(response, Ok(("b", 101)));
    }

    #[tokio::test]
    async fn test_into_fn_is_reusable() {
        let op = Fallback::builder()
            .implementation("only", |i: u32| async move { Ok::<_, TestError>(i) })
            .build()
            .into_fn();
        let again = op.clone();

        assert_eq!(op(1).await, Ok(("only", 1)));
        assert_eq!(again(2).await, Ok(("only", 2)));
    }

    #[test]
    fn test_names_and_debug() {
        let fallback = Fallback::builder()
            .implementation("primary", failing("x"))
            .implementation("secondary", failing("y"))
            .on_error(|_: &&str, _: &TestError| {})
            .build();

        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback.names().copied().collect::<Vec<_>>(), vec!["primary", "secondary"]);

        let rendered = format!("{:?}", fallback);
        assert!(rendered.contains("primary"));
        assert!(rendered.contains("<observer>"));
    }

    #[test]
    fn test_fallback_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fallback<&'static str, u32, u32, TestError>>();
    }
}
