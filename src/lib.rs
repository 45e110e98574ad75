#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # tryfallback
//!
//! Sequential fallback for async Rust: try a list of named implementations of the same
//! operation in order and return the first success, tagged with the name of the
//! implementation that produced it.
//!
//! ## Features
//!
//! - **Strictly sequential** attempts in list order, short-circuiting on the first success
//! - **Error observers** invoked (and awaited) for every failed attempt
//! - **Explicit exhaustion** via [`FallbackError::Exhausted`]
//! - **tower interop**: services as implementations, and the combinator as a service
//! - **Structured telemetry** through pluggable sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use tryfallback::{Fallback, FallbackError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let geocode = Fallback::builder()
//!         .implementation("primary", |addr: String| async move {
//!             Err::<(f64, f64), _>(format!("primary rejected {addr}"))
//!         })
//!         .implementation("backup", |_addr: String| async move { Ok((51.5, -0.12)) })
//!         .on_error(|name: &&str, err: &String| eprintln!("{name}: {err}"))
//!         .build();
//!
//!     let (provider, coords) = geocode.execute("10 Downing St".to_string()).await.unwrap();
//!     assert_eq!(provider, "backup");
//!     assert_eq!(coords, (51.5, -0.12));
//!
//!     let nothing: Fallback<&str, String, (f64, f64), String> = Fallback::new(Vec::new(), None);
//!     assert!(matches!(
//!         nothing.execute("anywhere".to_string()).await,
//!         Err(FallbackError::Exhausted { attempts: 0 })
//!     ));
//! }
//! ```

pub mod algebra;
pub mod error;
pub mod fallback;
pub mod implementation;
pub mod observer;
pub mod prelude;
pub mod telemetry;

// Re-exports
pub use error::FallbackError;
pub use fallback::{try_fallback, Fallback, FallbackBuilder, SharedObserver};
pub use implementation::{Implementation, Operation};
pub use observer::{ErrorObserver, TracingObserver};
