//! Named implementations tried by the fallback combinator.
//!
//! An [`Implementation`] pairs an opaque name with an async operation `I -> Result<O, E>`.
//! Operations can be plain closures returning futures or any `tower::Service`.
//!
//! ```rust
//! use tryfallback::Implementation;
//!
//! let primary: Implementation<&str, u32, u32, std::io::Error> =
//!     Implementation::new("primary", |i: u32| async move { Ok(i * 2) });
//! assert_eq!(*primary.name(), "primary");
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tower::ServiceExt;
use tower_service::Service;

/// Shared, type-erased async operation.
pub type Operation<I, O, E> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

/// One named candidate in a fallback list.
pub struct Implementation<N, I, O, E> {
    name: N,
    operation: Operation<I, O, E>,
}

impl<N, I, O, E> Implementation<N, I, O, E> {
    /// Wrap an async closure.
    pub fn new<F, Fut>(name: N, operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        Self { name, operation: Arc::new(move |input: I| operation(input).boxed()) }
    }

    /// Wrap an already type-erased operation.
    pub fn from_operation(name: N, operation: Operation<I, O, E>) -> Self {
        Self { name, operation }
    }

    /// Adapt a tower service.
    ///
    /// Every attempt clones the service and drives the clone to readiness before
    /// calling it, so a readiness error counts as a failure of this implementation.
    pub fn from_service<S>(name: N, service: S) -> Self
    where
        I: Send + 'static,
        S: Service<I, Response = O, Error = E> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        Self {
            name,
            operation: Arc::new(move |input: I| service.clone().oneshot(input).boxed()),
        }
    }

    /// The implementation's name.
    pub fn name(&self) -> &N {
        &self.name
    }

    /// Invoke the operation once.
    pub fn call(&self, input: I) -> BoxFuture<'static, Result<O, E>> {
        (self.operation)(input)
    }
}

impl<N: Clone, I, O, E> Clone for Implementation<N, I, O, E> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), operation: self.operation.clone() }
    }
}

impl<N: fmt::Debug, I, O, E> fmt::Debug for Implementation<N, I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field("operation", &"<operation>")
            .finish()
    }
}

impl<N, I, O, E, F, Fut> From<(N, F)> for Implementation<N, I, O, E>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    fn from((name, operation): (N, F)) -> Self {
        Implementation::new(name, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(&'static str);

    #[tokio::test]
    async fn closure_implementation_forwards_input() {
        let imp: Implementation<&str, u32, u32, TestError> =
            Implementation::new("double", |i: u32| async move { Ok(i * 2) });
        assert_eq!(imp.call(21).await, Ok(42));
    }

    #[tokio::test]
    async fn tuple_conversion_keeps_name() {
        let imp: Implementation<&str, u32, u32, TestError> =
            ("broken", |_i: u32| async { Err(TestError("nope")) }).into();
        assert_eq!(*imp.name(), "broken");
        assert_eq!(imp.call(1).await, Err(TestError("nope")));
    }

    #[tokio::test]
    async fn service_implementation_calls_a_fresh_clone() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = tower::service_fn(move |req: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Infallible>(req + 1) }
        });

        let imp = Implementation::from_service("svc", svc);
        assert_eq!(imp.call(1).await.unwrap(), 2);
        assert_eq!(imp.call(2).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Clone)]
    struct NeverReady;

    impl Service<u32> for NeverReady {
        type Response = u32;
        type Error = TestError;
        type Future = futures::future::Ready<Result<u32, TestError>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err(TestError("not ready")))
        }

        fn call(&mut self, req: u32) -> Self::Future {
            futures::future::ready(Ok(req))
        }
    }

    #[tokio::test]
    async fn readiness_error_is_an_implementation_failure() {
        let imp = Implementation::from_service("never", NeverReady);
        assert_eq!(imp.call(7).await, Err(TestError("not ready")));
    }

    #[test]
    fn debug_hides_operation() {
        let imp: Implementation<&str, (), (), TestError> =
            Implementation::new("quiet", |_: ()| async { Ok(()) });
        let rendered = format!("{:?}", imp);
        assert!(rendered.contains("quiet"));
        assert!(rendered.contains("<operation>"));
    }
}
