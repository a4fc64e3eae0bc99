//! Declarative controller configuration.
//!
//! [`BackoffConfig`] describes a [`Backoff`] as plain data so it can live in
//! application settings. With the `serde` feature it can be deserialized;
//! missing fields fall back to the defaults.
//!
//! ```rust
//! use exponent::{BackoffConfig, StrategyKind};
//!
//! let config = BackoffConfig::default()
//!     .with_max_attempts(5)
//!     .with_strategy(StrategyKind::Linear)
//!     .with_min_delay_ms(None);
//!
//! let mut backoff = config.build();
//! backoff.next_attempt();
//! assert_eq!(backoff.delay().as_millis(), 100);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::{Backoff, DEFAULT_MIN_DELAY};
use crate::error::ParseStrategyError;
use crate::strategy::Strategy;

/// Built-in strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StrategyKind {
    /// [`Strategy::exponential`].
    Exponential,
    /// [`Strategy::linear`].
    Linear,
    /// [`Strategy::full_jitter`].
    FullJitter,
    /// [`Strategy::decorrelated_jitter`].
    #[default]
    DecorrelatedJitter,
}

impl StrategyKind {
    /// Build the strategy this kind names.
    pub fn strategy(self) -> Strategy {
        match self {
            Self::Exponential => Strategy::exponential(),
            Self::Linear => Strategy::linear(),
            Self::FullJitter => Strategy::full_jitter(),
            Self::DecorrelatedJitter => Strategy::decorrelated_jitter(),
        }
    }

    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Linear => "linear",
            Self::FullJitter => "full_jitter",
            Self::DecorrelatedJitter => "decorrelated_jitter",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ParseStrategyError;

    /// Accepts snake_case or kebab-case, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exponential" => Ok(Self::Exponential),
            "linear" => Ok(Self::Linear),
            "full_jitter" => Ok(Self::FullJitter),
            "decorrelated_jitter" => Ok(Self::DecorrelatedJitter),
            _ => Err(ParseStrategyError::new(s)),
        }
    }
}

/// Settings for building a [`Backoff`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    /// Attempt budget.
    pub max_attempts: u32,
    /// Which built-in strategy to use.
    pub strategy: StrategyKind,
    /// Floor applied to every delay, in milliseconds. `None` disables it.
    pub min_delay_ms: Option<u64>,
    /// Give up this many milliseconds after [`build`](Self::build).
    pub timeout_ms: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            strategy: StrategyKind::default(),
            min_delay_ms: Some(DEFAULT_MIN_DELAY.as_millis() as u64),
            timeout_ms: None,
        }
    }
}

impl BackoffConfig {
    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Select a built-in strategy.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set or clear the delay floor.
    pub fn with_min_delay_ms(mut self, min_delay_ms: Option<u64>) -> Self {
        self.min_delay_ms = min_delay_ms;
        self
    }

    /// Set or clear the overall timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The strategy described by this config, including any floor.
    pub fn strategy(&self) -> Strategy {
        let strategy = self.strategy.strategy();
        match self.min_delay_ms {
            Some(min) => strategy.with_minimum(Duration::from_millis(min)),
            None => strategy,
        }
    }

    /// Build a fresh controller. The timeout clock starts now.
    pub fn build(&self) -> Backoff {
        let backoff = Backoff::new(self.max_attempts).with_strategy(self.strategy());
        match self.timeout_ms {
            Some(ms) => backoff.with_timeout(Duration::from_millis(ms)),
            None => backoff,
        }
    }
}
