//! Common types shared across the controller.
//!
//! This module collects the building blocks the rest of the crate depends on:
//! 1. **Geometry:** Address-to-bank/rank/row decomposition and the row-buffer-hit predicate.
//! 2. **Errors:** Construction-time configuration errors.
//! 3. **Constants:** Line granularity and related derived values.

/// Device geometry and address decomposition.
pub mod addr;
/// Baseline hardware constants.
pub mod constants;
/// Configuration error definitions.
pub mod error;

pub use addr::Geometry;
pub use error::ConfigError;
