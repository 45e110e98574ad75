//! Telemetry for fallback execution.
//!
//! When a sink is configured through [`FallbackBuilder::with_telemetry`](crate::FallbackBuilder::with_telemetry),
//! the combinator emits a [`FallbackEvent`] for every failed attempt and one terminal
//! event (`Succeeded` or `Exhausted`) per invocation.
//!
//! Events are handed to a [`NonBlockingSink`]: a bounded queue drained by a worker task
//! that owns the configured sink. The combinator only ever does a `try_send`, so a slow,
//! failing or never-ready sink cannot delay or change an invocation. Events that do not
//! fit in the queue are dropped and counted ([`Fallback::telemetry_dropped`](crate::Fallback::telemetry_dropped)).
//!
//! The `TelemetrySink` trait is a `tower::Service<FallbackEvent>`, so sinks compose with
//! standard tower combinators.
//!
//! ```rust
//! use tryfallback::telemetry::FallbackEvent;
//! use std::time::Duration;
//!
//! let failed = FallbackEvent::AttemptFailed {
//!     implementation: "primary".to_string(),
//!     attempt: 1,
//!     duration: Duration::from_millis(12),
//! };
//! assert!(!failed.is_terminal());
//! assert_eq!(failed.to_string(), "AttemptFailed(primary, #1, 12ms)");
//! ```

pub mod events;
pub mod sinks;

#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use events::FallbackEvent;
pub use sinks::{
    ComposedSinkError, LogSink, MemorySink, MulticastSink, NonBlockingSink, TelemetrySink,
    DEFAULT_QUEUE_CAPACITY,
};

use std::fmt;
use std::time::Duration;

/// Turns combinator progress into queued events, rendering names with `Display`.
pub(crate) struct Recorder<N> {
    queue: NonBlockingSink,
    render: fn(&N) -> String,
}

fn display_name<N: fmt::Display>(name: &N) -> String {
    name.to_string()
}

impl<N: fmt::Display> Recorder<N> {
    pub(crate) fn new(queue: NonBlockingSink) -> Self {
        Self { queue, render: display_name::<N> }
    }
}

impl<N> Recorder<N> {
    pub(crate) fn attempt_failed(&self, name: &N, attempt: usize, duration: Duration) {
        self.queue.try_emit(FallbackEvent::AttemptFailed {
            implementation: (self.render)(name),
            attempt,
            duration,
        });
    }

    pub(crate) fn succeeded(&self, name: &N, attempt: usize, duration: Duration) {
        self.queue.try_emit(FallbackEvent::Succeeded {
            implementation: (self.render)(name),
            attempt,
            duration,
        });
    }

    pub(crate) fn exhausted(&self, attempts: usize, duration: Duration) {
        self.queue.try_emit(FallbackEvent::Exhausted { attempts, duration });
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.queue.dropped()
    }
}

impl<N> Clone for Recorder<N> {
    fn clone(&self) -> Self {
        Self { queue: self.queue.clone(), render: self.render }
    }
}
