//! Replay driver: owns a controller and a trace side by side.
//!
//! Feeds each trace entry to the controller at its arrival cycle, ticks once
//! per loop iteration, and accumulates the completion log. Replaying an
//! identical trace through a freshly constructed driver with an identical
//! configuration yields an identical completion sequence.

use crate::common::ConfigError;
use crate::config::Config;
use crate::controller::Controller;
use crate::request::{Completion, RequestId, RequestKind};
use crate::sim::trace::TraceEntry;

/// Trace replay driver.
#[derive(Debug)]
pub struct Driver {
    controller: Controller,
    trace: Vec<TraceEntry>,
    next_arrival: usize,
    next_id: u64,
    log: Vec<Completion>,
}

impl Driver {
    /// Builds a driver for the given configuration and trace.
    ///
    /// Entries are replayed in arrival-cycle order; same-cycle entries keep
    /// their relative order from the trace.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(config: Config, mut trace: Vec<TraceEntry>) -> Result<Self, ConfigError> {
        trace.sort_by_key(|entry| entry.at_cycle);
        Ok(Self {
            controller: Controller::new(config)?,
            trace,
            next_arrival: 0,
            next_id: 0,
            log: Vec::new(),
        })
    }

    /// The driven controller.
    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Completions collected so far, in delivery order.
    #[inline]
    pub fn completions(&self) -> &[Completion] {
        &self.log
    }

    /// Advances one cycle: feeds the arrivals due this cycle, ticks, and
    /// collects completions.
    pub fn step(&mut self) {
        let now = self.controller.cycle() + 1;
        while self
            .trace
            .get(self.next_arrival)
            .is_some_and(|entry| entry.at_cycle <= now)
        {
            let entry = self.trace[self.next_arrival];
            let id = RequestId(self.next_id);
            self.next_id += 1;
            self.controller.push_request(
                id,
                entry.addr,
                entry.size,
                entry.kind == RequestKind::Write,
            );
            self.next_arrival += 1;
        }
        self.controller.tick();
        self.log.extend(self.controller.drain_completions());
    }

    /// Runs until the trace is consumed and the controller is idle, or until
    /// `max_cycles` have elapsed. Returns true when everything drained.
    pub fn run(&mut self, max_cycles: u64) -> bool {
        while self.controller.cycle() < max_cycles {
            self.step();
            if self.next_arrival == self.trace.len() && self.controller.is_idle() {
                return true;
            }
        }
        self.next_arrival == self.trace.len() && self.controller.is_idle()
    }
}
