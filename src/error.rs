//! Error types.

use std::fmt;

/// Error returned by [`Backoff::run`](crate::Backoff::run) and the free
/// [`retry`](crate::retry) functions.
///
/// The operation's own error is carried through untouched. Whether the run
/// ended because the budget was spent or because cancellation fired is not
/// encoded here; inspect the controller or the cancellation signal for that.
///
/// # Examples
///
/// ```rust
/// use exponent::{Backoff, RetryError, Strategy};
///
/// # tokio_test::block_on(async {
/// let mut backoff = Backoff::new(2).with_strategy(Strategy::linear());
/// let result = backoff
///     .run(|| async { Err::<(), _>("connection refused") })
///     .await;
///
/// assert_eq!(result, Err(RetryError::Operation("connection refused")));
/// assert!(backoff.has_failed());
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The error from the last attempt.
    Operation(E),
    /// The operation was never invoked, either because the budget was zero or
    /// because cancellation fired before the first attempt.
    NotAttempted,
}

impl<E> RetryError<E> {
    /// Returns true if the operation ran and this carries its error.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Returns true if the operation never ran.
    pub fn is_not_attempted(&self) -> bool {
        matches!(self, Self::NotAttempted)
    }

    /// Get the operation error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::NotAttempted => None,
        }
    }

    /// Borrow the operation error if present.
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::NotAttempted => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "{}", e),
            Self::NotAttempted => write!(f, "operation was never attempted"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation(e) => Some(e),
            Self::NotAttempted => None,
        }
    }
}

/// Error returned when parsing an unknown strategy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStrategyError {
    name: String,
}

impl ParseStrategyError {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The name that failed to parse.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ParseStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown backoff strategy `{}` (expected exponential, linear, full_jitter or decorrelated_jitter)",
            self.name
        )
    }
}

impl std::error::Error for ParseStrategyError {}
