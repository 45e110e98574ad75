//! Convenient re-exports for common fallback types.
pub use crate::{
    fallback::{try_fallback, Fallback, FallbackBuilder, SharedObserver},
    implementation::{Implementation, Operation},
    observer::{ErrorObserver, TracingObserver},
    FallbackError,
};
