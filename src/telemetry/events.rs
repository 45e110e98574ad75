use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Events emitted while a composed fallback operation runs.
///
/// Implementation names are carried as their `Display` rendering so events stay
/// independent of the caller's name type. Attempt numbers are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackEvent {
    /// An implementation failed and the combinator is moving on.
    ///
    /// Emitted after the error observer (if any) has been awaited.
    AttemptFailed {
        /// Name of the failed implementation
        implementation: String,
        /// Position of the attempt in the list (1-indexed)
        attempt: usize,
        /// Time spent in this attempt
        duration: Duration,
    },
    /// An implementation succeeded; no further implementations will run.
    Succeeded {
        /// Name of the implementation that answered
        implementation: String,
        /// Position of the attempt in the list (1-indexed)
        attempt: usize,
        /// Time spent in this attempt
        duration: Duration,
    },
    /// Every implementation failed, or the list was empty.
    Exhausted {
        /// Number of implementations attempted
        attempts: usize,
        /// Total time spent across all attempts
        duration: Duration,
    },
}

impl FallbackEvent {
    /// Whether this event ends an invocation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FallbackEvent::AttemptFailed { .. })
    }
}

impl fmt::Display for FallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackEvent::AttemptFailed { implementation, attempt, duration } => {
                write!(f, "AttemptFailed({}, #{}, {:?})", implementation, attempt, duration)
            }
            FallbackEvent::Succeeded { implementation, attempt, duration } => {
                write!(f, "Succeeded({}, #{}, {:?})", implementation, attempt, duration)
            }
            FallbackEvent::Exhausted { attempts, duration } => {
                write!(f, "Exhausted(attempts={}, duration={:?})", attempts, duration)
            }
        }
    }
}

#[cfg(feature = "telemetry-json")]
fn clamp_u64(value: u128) -> u64 {
    value.min(u64::MAX as u128) as u64
}

/// Render an event as a flat JSON object with a `kind` discriminator.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &FallbackEvent) -> serde_json::Value {
    match event {
        FallbackEvent::AttemptFailed { implementation, attempt, duration } => json!({
            "kind": "fallback_attempt_failed",
            "implementation": implementation,
            "attempt": *attempt,
            "duration_ms": clamp_u64(duration.as_millis()),
        }),
        FallbackEvent::Succeeded { implementation, attempt, duration } => json!({
            "kind": "fallback_succeeded",
            "implementation": implementation,
            "attempt": *attempt,
            "duration_ms": clamp_u64(duration.as_millis()),
        }),
        FallbackEvent::Exhausted { attempts, duration } => json!({
            "kind": "fallback_exhausted",
            "attempts": *attempts,
            "duration_ms": clamp_u64(duration.as_millis()),
        }),
    }
}
