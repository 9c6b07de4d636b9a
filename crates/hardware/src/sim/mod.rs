//! Trace replay: request-trace parsing and the tick-loop driver.
//!
//! The controller itself is passive — an external driver calls `tick` once
//! per clock edge. This module provides that driver for standalone replay:
//! 1. **Traces:** A plain-text request trace format and its parser.
//! 2. **Driver:** Feeds arrivals at their cycles, ticks the controller, and
//!    collects the completion log.

/// Replay driver owning a controller and a trace.
pub mod driver;
/// Request trace format and parsing.
pub mod trace;
