//! # Exponent
//!
//! Retry with backoff for async Rust.
//!
//! A [`Backoff`] counts attempts against a fixed budget, computes how long to
//! wait between them with a pluggable [`Strategy`], and races each wait
//! against an optional [`Cancellation`] (a token, a deadline, or both).
//!
//! ## Quick Example
//!
//! ```rust
//! use exponent::{Backoff, Strategy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut backoff = Backoff::new(5)
//!     .with_strategy(Strategy::full_jitter().with_minimum(Duration::from_millis(10)))
//!     .with_timeout(Duration::from_secs(30));
//!
//! let mut tries = 0;
//! let result = backoff
//!     .run(|| {
//!         tries += 1;
//!         let attempt = tries;
//!         async move {
//!             if attempt < 3 {
//!                 Err("not yet")
//!             } else {
//!                 Ok(attempt)
//!             }
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(result, Ok(3));
//! assert!(!backoff.has_failed());
//! # });
//! ```
//!
//! ## Manual loop
//!
//! The controller can also be driven by hand, which is useful when the
//! operation does not fit in a closure:
//!
//! ```rust
//! use exponent::{Backoff, Strategy};
//!
//! # tokio_test::block_on(async {
//! let mut backoff = Backoff::new(3).with_strategy(Strategy::linear());
//! while backoff.next_attempt() {
//!     // ... try something, call `backoff.succeed()` when it works ...
//!     backoff.wait().await;
//! }
//! assert!(backoff.has_failed());
//! # });
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): emit `tracing` events for waits and give-ups.
//! - `serde`: derive `Serialize`/`Deserialize` for [`BackoffConfig`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod error;
pub mod random;
pub mod run;
pub mod strategy;

// Re-exports
pub use backoff::{Backoff, BackoffState, DEFAULT_MIN_DELAY};
pub use cancel::Cancellation;
pub use config::{BackoffConfig, StrategyKind};
pub use error::{ParseStrategyError, RetryError};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use run::{retry, retry_with_cancel, RetryEvent};
pub use strategy::Strategy;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::{Backoff, BackoffState};
    pub use crate::cancel::Cancellation;
    pub use crate::error::RetryError;
    pub use crate::run::{retry, retry_with_cancel};
    pub use crate::strategy::Strategy;
}
