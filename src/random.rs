//! Random sources for jittered strategies.
//!
//! Jittered strategies never call into `rand` directly. They draw through a
//! [`RandomSource`], which defaults to [`ThreadRandom`] and can be replaced with
//! a [`SeededRandom`] (or any custom implementation) to make delays
//! reproducible in tests.
//!
//! ```rust
//! use exponent::random::{RandomSource, SeededRandom};
//!
//! let a = SeededRandom::new(7);
//! let b = SeededRandom::new(7);
//! assert_eq!(a.below(1_000), b.below(1_000));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed integers.
///
/// Implementations must be shareable across threads since a single
/// [`Strategy`](crate::Strategy) can be cloned into many controllers.
pub trait RandomSource: Send + Sync {
    /// Draw a value uniformly from `[0, bound)`.
    ///
    /// A `bound` of `0` or `1` has exactly one valid answer, so implementations
    /// must return `0` without drawing.
    fn below(&self, bound: u64) -> u64;
}

impl<T: RandomSource + ?Sized> RandomSource for Arc<T> {
    fn below(&self, bound: u64) -> u64 {
        (**self).below(bound)
    }
}

/// The process-wide default source.
///
/// Backed by `rand`'s thread-local generator, which is seeded from the OS once
/// per thread. Draws from different threads never contend on a lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound <= 1 {
            return 0;
        }
        rand::rng().random_range(0..bound)
    }
}

/// A deterministic source seeded with a fixed value.
///
/// Draws are serialized behind a mutex, so one instance can be shared by
/// strategies running on several threads.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a source that produces the same sequence for the same seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound <= 1 {
            return 0;
        }
        // Poisoning cannot corrupt the generator state.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(0..bound)
    }
}
