//! Error types for the fallback combinator
//!
//! Individual implementation failures never reach the caller. They are handed to the
//! configured observer and then swallowed. The only error the composed operation
//! returns is [`FallbackError::Exhausted`].

/// Error returned by a composed fallback operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    /// Every implementation failed, or there were none to try.
    #[error("fallback implementations exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of implementations attempted (zero for an empty list)
        attempts: usize,
    },
}

impl FallbackError {
    pub(crate) fn exhausted(attempts: usize) -> Self {
        FallbackError::Exhausted { attempts }
    }

    /// Check if this error is due to exhaustion of the implementation list.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Number of implementations attempted before giving up.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts } => *attempts,
        }
    }
}
