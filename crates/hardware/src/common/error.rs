//! Configuration error definitions.
//!
//! Construction is the only fallible surface of the controller: capacity and
//! power rejections during scheduling are normal deferrals reported as
//! booleans, and internal-consistency violations abort. Everything a caller
//! can get wrong is therefore a `ConfigError`, raised once from
//! `Controller::new` and fatal at startup.

use thiserror::Error;

/// Errors raised while validating a [`crate::config::Config`] at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A structural parameter that must be non-zero was zero.
    #[error("{name} must be non-zero")]
    ZeroParameter {
        /// Name of the offending configuration field.
        name: &'static str,
    },

    /// Flush thresholds must satisfy `low <= high <= 100`.
    #[error("flush thresholds invalid: low {low}% must be <= high {high}% and high <= 100%")]
    InvalidFlushThresholds {
        /// Low (stop-flushing) threshold in percent.
        low: u8,
        /// High (start-flushing) threshold in percent.
        high: u8,
    },

    /// The adaptive-write group size must evenly divide the bank count.
    #[error("group size {group_size} does not divide bank count {num_banks}")]
    GroupSizeMismatch {
        /// Configured adaptive-write group size.
        group_size: usize,
        /// Configured number of banks per rank.
        num_banks: usize,
    },

    /// A single operation's weight exceeds the whole power budget, so it
    /// could never be admitted.
    #[error("{name} weight {weight} exceeds the power budget {budget}")]
    WeightExceedsBudget {
        /// Which weight (`"read"` or `"write"`).
        name: &'static str,
        /// The offending weight.
        weight: u64,
        /// Configured `max_power_weight`.
        budget: u64,
    },

    /// The write-cancellation threshold is a percentage of the write service
    /// time and must not exceed 100.
    #[error("write cancel threshold {0}% exceeds 100%")]
    CancelThresholdOutOfRange(u8),
}
