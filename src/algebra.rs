//! Algebraic composition of fallback chains.
//!
//! `a | b` builds a chain that tries every implementation of `a`, then every implementation
//! of `b`. The result keeps `a`'s observer and telemetry; `b`'s are dropped.
//!
//! # Operator Precedence
//!
//! `|` is left-associative, so `a | b | c` is `(a | b) | c` and the attempt order is
//! `a`, `b`, `c`. Because only the leftmost operand's hooks survive, configure the observer
//! on the first chain.
//!
//! ```
//! use tryfallback::Fallback;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fast = Fallback::builder()
//!     .implementation("replica", |_: u32| async { Err::<u32, _>("lagging") })
//!     .build();
//! let slow = Fallback::builder()
//!     .implementation("primary", |i: u32| async move { Ok(i) })
//!     .build();
//!
//! let chain = fast | slow;
//! assert_eq!(chain.names().copied().collect::<Vec<_>>(), vec!["replica", "primary"]);
//! assert_eq!(chain.execute(7).await, Ok(("primary", 7)));
//! # });
//! ```

use crate::fallback::Fallback;
use std::ops::BitOr;

impl<N: Clone, I, O, E> BitOr for Fallback<N, I, O, E> {
    type Output = Fallback<N, I, O, E>;

    fn bitor(self, rhs: Self) -> Self::Output {
        let implementations =
            self.implementations.iter().chain(rhs.implementations.iter()).cloned().collect();
        Fallback { implementations, observer: self.observer, telemetry: self.telemetry }
    }
}
