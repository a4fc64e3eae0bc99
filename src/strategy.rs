//! Backoff strategies.
//!
//! A [`Strategy`] maps a 1-based attempt number to the delay that should be
//! waited before the next attempt. All built-in strategies work in whole
//! milliseconds.
//!
//! | Strategy              | Delay for attempt `n`              |
//! |-----------------------|------------------------------------|
//! | `exponential`         | `2^n` ms                           |
//! | `linear`              | `n * 100` ms                       |
//! | `full_jitter`         | uniform in `[0, 2^n)` ms           |
//! | `decorrelated_jitter` | uniform in `[2^n / 2, 2^n)` ms     |
//!
//! Any strategy can be given a floor with [`Strategy::with_minimum`].
//!
//! # Examples
//!
//! ```rust
//! use exponent::Strategy;
//! use std::time::Duration;
//!
//! assert_eq!(Strategy::linear().delay(3), Duration::from_millis(300));
//! assert_eq!(Strategy::exponential().delay(4), Duration::from_millis(16));
//!
//! let floored = Strategy::full_jitter().with_minimum(Duration::from_millis(50));
//! assert!(floored.delay(1) >= Duration::from_millis(50));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::random::{RandomSource, ThreadRandom};

type DelayFn = dyn Fn(u32) -> Duration + Send + Sync;

/// A function from attempt number to delay.
///
/// Cloning is cheap: clones share the same underlying function.
#[derive(Clone)]
pub struct Strategy {
    name: &'static str,
    delay: Arc<DelayFn>,
}

impl Strategy {
    /// Wrap an arbitrary function as a strategy.
    ///
    /// ```rust
    /// use exponent::Strategy;
    /// use std::time::Duration;
    ///
    /// let fixed = Strategy::from_fn(|_| Duration::from_millis(25));
    /// assert_eq!(fixed.delay(9), Duration::from_millis(25));
    /// ```
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::named("custom", f)
    }

    fn named<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            name,
            delay: Arc::new(f),
        }
    }

    /// `2^n` milliseconds, saturating at `u64::MAX`.
    pub fn exponential() -> Self {
        Self::named("exponential", |attempt| {
            Duration::from_millis(exp2_millis(attempt))
        })
    }

    /// `n * 100` milliseconds.
    pub fn linear() -> Self {
        Self::named("linear", |attempt| {
            Duration::from_millis(u64::from(attempt).saturating_mul(100))
        })
    }

    /// Uniformly random in `[0, 2^n)` milliseconds, drawn from the
    /// process-wide source.
    ///
    /// Spreads retries from many callers across the whole window, at the cost
    /// of occasionally returning zero.
    pub fn full_jitter() -> Self {
        Self::full_jitter_with(ThreadRandom)
    }

    /// [`full_jitter`](Self::full_jitter) drawing from `source`.
    pub fn full_jitter_with<R>(source: R) -> Self
    where
        R: RandomSource + 'static,
    {
        Self::named("full_jitter", move |attempt| {
            Duration::from_millis(source.below(exp2_millis(attempt)))
        })
    }

    /// Uniformly random in `[2^n / 2, 2^n)` milliseconds, drawn from the
    /// process-wide source.
    ///
    /// Unlike full jitter the result never drops below half the exponential
    /// value.
    pub fn decorrelated_jitter() -> Self {
        Self::decorrelated_jitter_with(ThreadRandom)
    }

    /// [`decorrelated_jitter`](Self::decorrelated_jitter) drawing from `source`.
    pub fn decorrelated_jitter_with<R>(source: R) -> Self
    where
        R: RandomSource + 'static,
    {
        Self::named("decorrelated_jitter", move |attempt| {
            let half = exp2_millis(attempt) / 2;
            Duration::from_millis(half + source.below(half))
        })
    }

    /// Clamp every delay produced by this strategy to at least `minimum`.
    ///
    /// ```rust
    /// use exponent::Strategy;
    /// use std::time::Duration;
    ///
    /// let min = Duration::from_millis(50);
    /// let high = Strategy::from_fn(|_| Duration::from_millis(300)).with_minimum(min);
    /// let low = Strategy::from_fn(|_| Duration::from_millis(1)).with_minimum(min);
    ///
    /// assert_eq!(high.delay(0), Duration::from_millis(300));
    /// assert_eq!(low.delay(0), Duration::from_millis(50));
    /// ```
    pub fn with_minimum(self, minimum: Duration) -> Self {
        let inner = self.delay;
        Self {
            name: self.name,
            delay: Arc::new(move |attempt| inner(attempt).max(minimum)),
        }
    }

    /// The delay to wait after `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.delay)(attempt)
    }

    /// Short name of the underlying strategy, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

/// `2^n` as milliseconds, saturating once the shift leaves `u64`.
fn exp2_millis(attempt: u32) -> u64 {
    1u64.checked_shl(attempt).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;

    #[test]
    fn test_exponential_delay() {
        let s = Strategy::exponential();
        assert_eq!(s.delay(0), Duration::from_millis(1));
        assert_eq!(s.delay(1), Duration::from_millis(2));
        assert_eq!(s.delay(4), Duration::from_millis(16));
        assert_eq!(s.delay(10), Duration::from_millis(1024));
    }

    #[test]
    fn test_exponential_saturates() {
        let s = Strategy::exponential();
        assert_eq!(s.delay(63), Duration::from_millis(1 << 63));
        assert_eq!(s.delay(64), Duration::from_millis(u64::MAX));
        assert_eq!(s.delay(u32::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_linear_delay() {
        let s = Strategy::linear();
        assert_eq!(s.delay(0), Duration::ZERO);
        assert_eq!(s.delay(1), Duration::from_millis(100));
        assert_eq!(s.delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_full_jitter_range() {
        let s = Strategy::full_jitter();
        for attempt in 1..12 {
            let upper = Duration::from_millis(1 << attempt);
            for _ in 0..200 {
                assert!(s.delay(attempt) < upper);
            }
        }
    }

    #[test]
    fn test_decorrelated_jitter_range() {
        let s = Strategy::decorrelated_jitter();
        for attempt in 1..12 {
            let lower = Duration::from_millis((1 << attempt) / 2);
            let upper = Duration::from_millis(1 << attempt);
            for _ in 0..200 {
                let d = s.delay(attempt);
                assert!(d >= lower && d < upper, "{d:?} outside [{lower:?}, {upper:?})");
            }
        }
    }

    #[test]
    fn test_jitter_attempt_zero_is_zero() {
        assert_eq!(Strategy::full_jitter().delay(0), Duration::ZERO);
        assert_eq!(Strategy::decorrelated_jitter().delay(0), Duration::ZERO);
    }

    #[test]
    fn test_jitter_at_saturation_does_not_panic() {
        let full = Strategy::full_jitter();
        let decorrelated = Strategy::decorrelated_jitter();
        assert!(full.delay(200) < Duration::from_millis(u64::MAX));
        assert!(decorrelated.delay(200) >= Duration::from_millis(u64::MAX / 2));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = Strategy::full_jitter_with(SeededRandom::new(3));
        let b = Strategy::full_jitter_with(SeededRandom::new(3));
        for attempt in 1..20 {
            assert_eq!(a.delay(attempt), b.delay(attempt));
        }
    }

    #[test]
    fn test_with_minimum_keeps_larger_value() {
        let s = Strategy::from_fn(|_| Duration::from_millis(300))
            .with_minimum(Duration::from_millis(50));
        assert_eq!(s.delay(0), Duration::from_millis(300));
    }

    #[test]
    fn test_with_minimum_raises_smaller_value() {
        let s = Strategy::from_fn(|_| Duration::from_millis(1))
            .with_minimum(Duration::from_millis(50));
        assert_eq!(s.delay(0), Duration::from_millis(50));
    }

    #[test]
    fn test_with_minimum_does_not_modify_inner() {
        let inner = Strategy::linear();
        let floored = inner.clone().with_minimum(Duration::from_millis(250));
        assert_eq!(inner.delay(1), Duration::from_millis(100));
        assert_eq!(floored.delay(1), Duration::from_millis(250));
        assert_eq!(floored.delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_strategy_debug_shows_name() {
        let debug = format!("{:?}", Strategy::decorrelated_jitter());
        assert!(debug.contains("decorrelated_jitter"));
        assert_eq!(Strategy::from_fn(|_| Duration::ZERO).name(), "custom");
    }
}
