//! Observers notified when an implementation fails.
//!
//! Any `Fn(&N, &E)` closure is an observer. Observers that need to await (for example to
//! publish a metric over a channel) implement [`ErrorObserver`] directly:
//!
//! ```rust
//! use async_trait::async_trait;
//! use tryfallback::ErrorObserver;
//!
//! struct Publish(tokio::sync::mpsc::Sender<String>);
//!
//! #[async_trait]
//! impl ErrorObserver<&'static str, std::io::Error> for Publish {
//!     async fn observe(&self, name: &&'static str, error: &std::io::Error) {
//!         let _ = self.0.send(format!("{name}: {error}")).await;
//!     }
//! }
//! ```
//!
//! The combinator awaits `observe` before attempting the next implementation, so observed
//! failures arrive in attempt order.

use async_trait::async_trait;
use std::fmt;

/// Hook receiving `(name, error)` for every failed attempt.
///
/// Observers return nothing and cannot fail. A panicking observer unwinds through the
/// composed operation; the combinator does not catch it.
#[async_trait]
pub trait ErrorObserver<N, E>: Send + Sync {
    async fn observe(&self, name: &N, error: &E);
}

#[async_trait]
impl<N, E, F> ErrorObserver<N, E> for F
where
    N: Sync,
    E: Sync,
    F: Fn(&N, &E) + Send + Sync,
{
    async fn observe(&self, name: &N, error: &E) {
        (self)(name, error)
    }
}

/// Observer logging each failure through `tracing` at `WARN`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[async_trait]
impl<N, E> ErrorObserver<N, E> for TracingObserver
where
    N: fmt::Debug + Sync,
    E: fmt::Display + Sync,
{
    async fn observe(&self, name: &N, error: &E) {
        tracing::warn!(implementation = ?name, error = %error, "fallback implementation failed");
    }
}
