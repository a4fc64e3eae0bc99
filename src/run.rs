//! Driving an operation to completion with a [`Backoff`].
//!
//! [`Backoff::run`] owns the attempt loop: it checks the guard before every
//! invocation, records success, and waits between failures. The free
//! [`retry`] and [`retry_with_cancel`] functions build a default controller
//! for one-off calls.
//!
//! ```rust
//! use exponent::retry;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # tokio_test::block_on(async {
//! let calls = AtomicU32::new(0);
//! let result = retry(10, || async {
//!     if calls.fetch_add(1, Ordering::SeqCst) < 1 {
//!         Err("warming up")
//!     } else {
//!         Ok("ready")
//!     }
//! })
//! .await;
//!
//! assert_eq!(result, Ok("ready"));
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::backoff::Backoff;
use crate::cancel::Cancellation;
use crate::error::RetryError;

/// Information about a failed attempt, passed to hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt, or `None` if this was the last one.
    pub next_delay: Option<Duration>,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

impl Backoff {
    /// Invoke `operation` until it succeeds or the controller stops
    /// permitting attempts.
    ///
    /// On success the controller is marked succeeded and the value is
    /// returned. Otherwise the error from the last attempt is returned
    /// unchanged. No wait happens after an attempt that leaves no budget.
    ///
    /// ```rust
    /// use exponent::{Backoff, RetryError};
    ///
    /// # tokio_test::block_on(async {
    /// let mut backoff = Backoff::new(0);
    /// let result = backoff.run(|| async { Ok::<_, ()>(1) }).await;
    /// assert_eq!(result, Err(RetryError::NotAttempted));
    /// # });
    /// ```
    pub async fn run<F, Fut, T, E>(&mut self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_hooks(operation, |_: &RetryEvent<'_, E>| {}).await
    }

    /// [`run`](Self::run), calling `on_retry` after every failed attempt.
    ///
    /// The hook runs before the wait and sees the delay that is about to be
    /// slept. It is synchronous; use it for logging or metrics.
    ///
    /// ```rust
    /// use exponent::{Backoff, RetryEvent, Strategy};
    ///
    /// # tokio_test::block_on(async {
    /// let mut seen = Vec::new();
    /// let mut backoff = Backoff::new(3).with_strategy(Strategy::exponential());
    /// let _ = backoff
    ///     .run_with_hooks(
    ///         || async { Err::<(), _>("nope") },
    ///         |event: &RetryEvent<'_, &str>| seen.push((event.attempt, event.next_delay)),
    ///     )
    ///     .await;
    ///
    /// assert_eq!(seen.len(), 3);
    /// assert_eq!(seen[2].1, None);
    /// # });
    /// ```
    pub async fn run_with_hooks<F, Fut, T, E, H>(
        &mut self,
        mut operation: F,
        mut on_retry: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&RetryEvent<'_, E>),
    {
        let start = Instant::now();
        let mut last_error = None;
        let mut invocations: u32 = 0;

        while self.next_attempt() {
            invocations += 1;
            match operation().await {
                Ok(value) => {
                    self.succeed();
                    return Ok(value);
                }
                Err(error) => {
                    let next_delay = self.may_retry().then(|| self.delay());

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        attempt = self.attempts(),
                        max_attempts = self.max_attempts(),
                        ?next_delay,
                        "attempt failed"
                    );

                    on_retry(&RetryEvent {
                        attempt: self.attempts(),
                        error: &error,
                        next_delay,
                        elapsed: start.elapsed(),
                    });

                    if let Some(delay) = next_delay {
                        self.wait_for(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            attempts = invocations,
            cancelled = self.is_cancelled(),
            elapsed = ?start.elapsed(),
            "giving up on operation"
        );

        Err(last_error.map_or(RetryError::NotAttempted, RetryError::Operation))
    }
}

/// Retry `operation` up to `max_attempts` times with the default strategy.
pub async fn retry<F, Fut, T, E>(max_attempts: u32, operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Backoff::new(max_attempts).run(operation).await
}

/// [`retry`], stopping early once `cancellation` fires.
///
/// Accepts a [`Cancellation`] or a bare
/// [`CancellationToken`](tokio_util::sync::CancellationToken).
pub async fn retry_with_cancel<F, Fut, T, E>(
    max_attempts: u32,
    cancellation: impl Into<Cancellation>,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Backoff::new(max_attempts)
        .with_cancellation(cancellation)
        .run(operation)
        .await
}
