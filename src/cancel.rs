//! Cooperative cancellation for [`Backoff`](crate::Backoff).
//!
//! A [`Cancellation`] combines an optional [`CancellationToken`] with an
//! optional deadline. It fires as soon as either the token is cancelled or the
//! deadline passes. The controller only observes it: firing never aborts an
//! operation that is already running.

use std::future;
use std::pin::pin;

use futures::future::select;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation signal observed by a retry controller.
///
/// The default value never fires.
///
/// ```rust
/// use exponent::Cancellation;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let cancellation = Cancellation::from_token(token.clone());
/// assert!(!cancellation.is_fired());
///
/// token.cancel();
/// assert!(cancellation.is_fired());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Fire when `token` is cancelled.
    pub fn from_token(token: CancellationToken) -> Self {
        Self::never().with_token(token)
    }

    /// Fire at `deadline`.
    pub fn from_deadline(deadline: Instant) -> Self {
        Self::never().with_deadline(deadline)
    }

    /// Fire `timeout` from now. A timeout too large to represent as an
    /// instant never fires.
    pub fn from_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::from_deadline(deadline),
            None => Self::never(),
        }
    }

    /// Observe `token`, replacing any previously set token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Also fire at `deadline`. The earlier of two deadlines wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// The token being observed, if any.
    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// The deadline being observed, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        let cancelled = self
            .token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        let expired = self.deadline.is_some_and(|d| d <= Instant::now());
        cancelled || expired
    }

    /// Resolve once the signal fires. Pending forever for [`never`](Self::never).
    pub async fn fired(&self) {
        let token = pin!(async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        });
        let deadline = pin!(async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => future::pending().await,
            }
        });
        // Either side firing is enough; the other future is dropped.
        select(token, deadline).await;
    }
}

impl From<CancellationToken> for Cancellation {
    fn from(token: CancellationToken) -> Self {
        Self::from_token(token)
    }
}
