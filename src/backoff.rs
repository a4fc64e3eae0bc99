//! The retry controller.

use std::pin::pin;
use std::time::Duration;

use futures::future::{select, Either};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::Cancellation;
use crate::strategy::Strategy;

/// Floor applied to the default strategy.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(150);

/// Where a [`Backoff`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffState {
    /// More attempts may follow.
    Retrying,
    /// [`Backoff::succeed`] has been called.
    Succeeded,
    /// The budget is spent, or cancellation fired, without success.
    Failed,
}

/// Attempt counter, retry budget and wait logic for one retried operation.
///
/// The usual shape is a loop over [`next_attempt`](Self::next_attempt), with
/// [`succeed`](Self::succeed) on success and [`wait`](Self::wait) between
/// failures:
///
/// ```rust
/// use exponent::{Backoff, Strategy};
///
/// # tokio_test::block_on(async {
/// let mut backoff = Backoff::new(5).with_strategy(Strategy::exponential());
/// let mut calls = 0;
///
/// while backoff.next_attempt() {
///     calls += 1;
///     if calls == 3 {
///         backoff.succeed();
///     } else {
///         backoff.wait().await;
///     }
/// }
///
/// assert_eq!(calls, 3);
/// assert!(!backoff.has_failed());
/// # });
/// ```
///
/// A controller is driven by a single caller. Methods that advance it take
/// `&mut self`, so sharing one between tasks requires external locking.
#[derive(Debug, Clone)]
pub struct Backoff {
    // Wider than the budget so the counter cannot saturate at `max_attempts`.
    attempt: u64,
    max_attempts: u32,
    strategy: Strategy,
    succeeded: bool,
    cancellation: Cancellation,
}

impl Backoff {
    /// Create a controller allowing up to `max_attempts` attempts.
    ///
    /// The default strategy is decorrelated jitter floored at
    /// [`DEFAULT_MIN_DELAY`]. A budget of `0` permits no attempts at all.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            strategy: Strategy::decorrelated_jitter().with_minimum(DEFAULT_MIN_DELAY),
            succeeded: false,
            cancellation: Cancellation::never(),
        }
    }

    /// Use `strategy` instead of the default.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Observe `cancellation`, replacing any previous signal.
    pub fn with_cancellation(mut self, cancellation: impl Into<Cancellation>) -> Self {
        self.cancellation = cancellation.into();
        self
    }

    /// Stop retrying once `token` is cancelled.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = self.cancellation.with_token(token);
        self
    }

    /// Stop retrying at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.cancellation = self.cancellation.with_deadline(deadline);
        self
    }

    /// Stop retrying `timeout` from now.
    ///
    /// A timeout too large to represent as an instant sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    #[cfg(test)]
    fn starting_at(max_attempts: u32, attempt: u64) -> Self {
        Self {
            attempt,
            ..Self::new(max_attempts)
        }
    }

    /// Count an attempt and report whether it may go ahead.
    ///
    /// Returns true while no success has been recorded, the budget is not
    /// spent and cancellation has not fired. The counter advances on every
    /// call, including calls made after the controller has become terminal.
    pub fn next_attempt(&mut self) -> bool {
        self.attempt = self.attempt.saturating_add(1);
        !self.succeeded
            && self.attempt <= u64::from(self.max_attempts)
            && !self.cancellation.is_fired()
    }

    /// The delay the active strategy prescribes after the current attempt.
    pub fn delay(&self) -> Duration {
        self.strategy.delay(self.attempts())
    }

    /// Sleep for [`delay`](Self::delay), or until cancellation fires.
    ///
    /// Returns the computed delay in both cases. Check
    /// [`is_cancelled`](Self::is_cancelled) to learn whether the sleep was cut
    /// short.
    pub async fn wait(&self) -> Duration {
        self.wait_for(self.delay()).await
    }

    pub(crate) async fn wait_for(&self, delay: Duration) -> Duration {
        let sleep = pin!(tokio::time::sleep(delay));
        let fired = pin!(self.cancellation.fired());

        match select(sleep, fired).await {
            Either::Left(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = self.attempt,
                    strategy = self.strategy.name(),
                    ?delay,
                    "backoff wait elapsed"
                );
            }
            Either::Right(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = self.attempt,
                    strategy = self.strategy.name(),
                    ?delay,
                    "backoff wait interrupted by cancellation"
                );
            }
        }

        delay
    }

    /// Whether another call to [`next_attempt`](Self::next_attempt) could
    /// still return true.
    pub(crate) fn may_retry(&self) -> bool {
        !self.succeeded
            && self.attempt < u64::from(self.max_attempts)
            && !self.cancellation.is_fired()
    }

    /// Record success. Every later [`next_attempt`](Self::next_attempt)
    /// returns false and [`has_failed`](Self::has_failed) returns false.
    pub fn succeed(&mut self) {
        self.succeeded = true;
    }

    /// Replace the active strategy. Takes effect on the next
    /// [`delay`](Self::delay) or [`wait`](Self::wait).
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    /// Whether the controller ended without success.
    ///
    /// Once cancellation has fired this is simply "not succeeded", whatever
    /// budget remains.
    pub fn has_failed(&self) -> bool {
        if self.cancellation.is_fired() {
            return !self.succeeded;
        }
        self.attempt >= u64::from(self.max_attempts) && !self.succeeded
    }

    /// The current state.
    pub fn state(&self) -> BackoffState {
        if self.succeeded {
            BackoffState::Succeeded
        } else if self.has_failed() {
            BackoffState::Failed
        } else {
            BackoffState::Retrying
        }
    }

    /// Number of [`next_attempt`](Self::next_attempt) calls so far, capped at
    /// `u32::MAX`.
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.attempt).unwrap_or(u32::MAX)
    }

    /// The attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The active strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// The cancellation signal being observed.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Whether the cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_fired()
    }

    /// Whether [`succeed`](Self::succeed) has been called.
    pub fn is_succeeded(&self) -> bool {
        self.succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(millis: u64) -> Strategy {
        Strategy::from_fn(move |_| Duration::from_millis(millis))
    }

    #[test]
    fn test_new_controller() {
        let backoff = Backoff::new(3);
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.max_attempts(), 3);
        assert!(!backoff.is_succeeded());
        assert!(!backoff.has_failed());
        assert_eq!(backoff.state(), BackoffState::Retrying);
    }

    #[test]
    fn test_default_strategy_is_floored() {
        let mut backoff = Backoff::new(3);
        for _ in 0..3 {
            backoff.next_attempt();
            assert!(backoff.delay() >= DEFAULT_MIN_DELAY);
        }
        assert_eq!(backoff.strategy().name(), "decorrelated_jitter");
    }

    #[test]
    fn test_budget_allows_exactly_max_attempts() {
        let mut backoff = Backoff::new(13).with_strategy(Strategy::linear());
        let mut loops = 0;
        while backoff.next_attempt() {
            loops += 1;
        }
        assert_eq!(loops, 13);
        assert!(backoff.has_failed());
    }

    #[test]
    fn test_zero_budget_never_proceeds() {
        let mut backoff = Backoff::new(0);
        assert!(!backoff.next_attempt());
        assert!(backoff.has_failed());
    }

    #[test]
    fn test_guard_keeps_counting_after_terminal() {
        let mut backoff = Backoff::new(1);
        assert!(backoff.next_attempt());
        assert!(!backoff.next_attempt());
        assert!(!backoff.next_attempt());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_stops_on_success() {
        let mut backoff = Backoff::new(10);
        let mut n = 0;
        while backoff.next_attempt() {
            n += 1;
            if n == 4 {
                backoff.succeed();
            }
        }
        assert_eq!(n, 4);
        assert!(!backoff.has_failed());
        assert_eq!(backoff.state(), BackoffState::Succeeded);
    }

    #[test]
    fn test_succeed_is_idempotent() {
        let mut backoff = Backoff::new(2);
        backoff.succeed();
        backoff.succeed();
        assert!(backoff.is_succeeded());
        assert!(!backoff.next_attempt());
    }

    #[test]
    fn test_failed_after_budget_then_rescued_by_success() {
        let mut backoff = Backoff::new(2);
        assert!(!backoff.has_failed());
        backoff.next_attempt();
        backoff.next_attempt();
        assert!(backoff.has_failed());
        assert_eq!(backoff.state(), BackoffState::Failed);

        backoff.succeed();
        assert!(!backoff.has_failed());
        assert_eq!(backoff.state(), BackoffState::Succeeded);
    }

    #[test]
    fn test_delay_reads_current_attempt() {
        let mut backoff = Backoff::new(5).with_strategy(Strategy::linear());
        backoff.next_attempt();
        backoff.next_attempt();
        backoff.next_attempt();
        assert_eq!(backoff.delay(), Duration::from_millis(300));
        assert_eq!(backoff.delay(), Duration::from_millis(300));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_set_strategy_takes_effect_immediately() {
        let mut backoff = Backoff::new(5).with_strategy(Strategy::linear());
        backoff.next_attempt();
        assert_eq!(backoff.delay(), Duration::from_millis(100));

        backoff.set_strategy(Strategy::exponential());
        assert_eq!(backoff.delay(), Duration::from_millis(2));
    }

    #[test]
    fn test_cancelled_token_stops_guard_and_fails() {
        let token = CancellationToken::new();
        let mut backoff = Backoff::new(10).with_token(token.clone());
        assert!(backoff.next_attempt());

        token.cancel();
        assert!(backoff.is_cancelled());
        assert!(!backoff.next_attempt());
        assert!(backoff.has_failed());
    }

    #[test]
    fn test_success_rescues_cancelled_controller() {
        let token = CancellationToken::new();
        let mut backoff = Backoff::new(10).with_token(token.clone());
        backoff.next_attempt();
        token.cancel();
        assert!(backoff.has_failed());

        backoff.succeed();
        assert!(!backoff.has_failed());
        assert_eq!(backoff.state(), BackoffState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_delay() {
        let mut backoff = Backoff::new(3).with_strategy(fixed(300));
        backoff.next_attempt();

        let start = Instant::now();
        let waited = backoff.wait().await;

        assert_eq!(waited, Duration::from_millis(300));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cut_short_by_cancellation() {
        let token = CancellationToken::new();
        let mut backoff = Backoff::new(3)
            .with_strategy(fixed(10_000))
            .with_token(token.clone());
        backoff.next_attempt();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let start = Instant::now();
        let waited = backoff.wait().await;

        assert_eq!(waited, Duration::from_millis(10_000));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(backoff.is_cancelled());
        assert!(backoff.has_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_retry_loop() {
        let mut backoff = Backoff::new(10)
            .with_strategy(fixed(150))
            .with_timeout(Duration::from_millis(200));

        while backoff.next_attempt() {
            backoff.wait().await;
        }

        assert!(backoff.has_failed());
        assert!(backoff.attempts() < 10);
    }

    #[test]
    fn test_guard_stops_at_largest_budget() {
        let mut backoff = Backoff::starting_at(u32::MAX, u64::from(u32::MAX) - 2);
        assert!(!backoff.has_failed());
        assert!(backoff.next_attempt());
        assert!(!backoff.has_failed());
        assert!(backoff.next_attempt());
        assert!(backoff.has_failed());

        assert!(!backoff.next_attempt());
        assert!(!backoff.next_attempt());
        assert_eq!(backoff.attempts(), u32::MAX);
        assert_eq!(backoff.state(), BackoffState::Failed);
    }

    #[test]
    fn test_unrepresentable_timeout_sets_no_deadline() {
        let mut backoff = Backoff::new(3).with_timeout(Duration::MAX);
        assert_eq!(backoff.cancellation().deadline(), None);
        assert!(backoff.next_attempt());
        assert!(!backoff.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_with_success_does_not_fail() {
        let mut backoff = Backoff::new(10)
            .with_strategy(fixed(150))
            .with_timeout(Duration::from_millis(200));

        while backoff.next_attempt() {
            backoff.wait().await;
            backoff.succeed();
        }

        assert!(!backoff.has_failed());
        assert_eq!(backoff.attempts(), 2);
    }
}
