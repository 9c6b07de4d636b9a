//! Cycle-level NVM (PCM) DIMM controller simulator library.
//!
//! This crate implements the scheduling and timing engine of a non-volatile
//! memory DIMM controller with the following:
//! 1. **Device:** Bank and rank timing/locking state with row-buffer tracking.
//! 2. **Write buffer:** Bounded, address-indexed staging area with hysteresis flush signaling.
//! 3. **Controller:** Per-cycle admission, write draining, power-weight budgeting,
//!    adaptive write-group locking, and write cancellation.
//! 4. **Events:** Tagged completion/cache events with exhaustive dispatch.
//! 5. **Simulation:** Request-trace parsing, replay driver, configuration, and statistics.

/// Common types and helpers (device geometry, errors, constants).
pub mod common;
/// Simulator configuration (defaults, hierarchical config structures, validation).
pub mod config;
/// Controller core (admission scheduling, write draining, event dispatch).
pub mod controller;
/// Bank and rank timing/locking state.
pub mod device;
/// Memory request, phase, completion, and controller event types.
pub mod request;
/// Trace replay (trace parsing and the tick-loop driver).
pub mod sim;
/// Controller statistics collection and reporting.
pub mod stats;
/// Bounded write buffer with hysteresis flush signaling.
pub mod write_buffer;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The scheduling core; construct with `Controller::new`.
pub use crate::controller::Controller;
/// Completion callbacks and cache-protocol events.
pub use crate::request::{Completion, ControllerEvent};
/// Trace replay driver; feeds arrivals and collects completions.
pub use crate::sim::driver::Driver;
