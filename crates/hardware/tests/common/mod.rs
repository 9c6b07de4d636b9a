//! Shared test harness: small configurations and a controller wrapper.

use nvmsim_core::config::Config;
use nvmsim_core::request::{Completion, CompletionKind, ControllerEvent, RequestId};
use nvmsim_core::Controller;

/// A small deterministic configuration with short latencies.
///
/// Topology: 4 banks, 1 rank, 256-byte rows, bank interleaving.
/// Timing: command 2, read column 3, write column 10,
/// row activate 5, burst 1. Derived windows:
///   - activation  = 5 + 2          = 7 cycles
///   - read burst  = 2 + 3 + 1      = 6 cycles
///   - write drain = 2 + 10 + 1     = 13 cycles
///
/// Write buffer: 4 entries, flush latches at 3 (75%), releases at 1 (25%).
pub fn small_config() -> Config {
    let mut config = Config::default();
    config.topology.num_banks = 4;
    config.topology.num_ranks = 1;
    config.topology.row_buffer_bytes = 256;
    config.topology.cacheline_interleaving = false;
    config.timing.command = 2;
    config.timing.read_column = 3;
    config.timing.write_column = 10;
    config.timing.row_activate = 5;
    config.timing.burst = 1;
    config.write_buffer.size = 4;
    config.write_buffer.flush_high_pct = 75;
    config.write_buffer.flush_low_pct = 25;
    config.scheduler.max_outstanding = 8;
    config.scheduler.max_concurrent_writes = 4;
    config.power.read_weight = 1;
    config.power.write_weight = 2;
    config.power.max_power_weight = 16;
    config
}

/// Admission-to-completion latency of a row-buffer hit under `small_config`.
pub const HIT_LATENCY: u64 = 1 + 6;
/// Admission-to-completion latency of a row-buffer miss under `small_config`.
pub const MISS_LATENCY: u64 = 7 + 6;

/// Harness owning a controller, an id allocator, and the completion log.
pub struct TestContext {
    pub ctrl: Controller,
    pub log: Vec<Completion>,
    next_id: u64,
}

impl TestContext {
    pub fn new(config: Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            ctrl: Controller::new(config).expect("test config must validate"),
            log: Vec::new(),
            next_id: 0,
        }
    }

    /// Harness with the standard small configuration.
    pub fn small() -> Self {
        Self::new(small_config())
    }

    fn alloc_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Queues a read and returns its id.
    pub fn push_read(&mut self, addr: u64) -> RequestId {
        let id = self.alloc_id();
        self.ctrl.push_request(id, addr, 64, false);
        id
    }

    /// Queues a write and returns its id.
    pub fn push_write(&mut self, addr: u64) -> RequestId {
        let id = self.alloc_id();
        self.ctrl.push_request(id, addr, 64, true);
        id
    }

    /// Holds a request pending a front-cache verdict and returns its id.
    pub fn push_held(&mut self, addr: u64, is_write: bool) -> RequestId {
        let id = self.alloc_id();
        self.ctrl.push_held(id, addr, 64, is_write);
        id
    }

    /// Delivers a controller event (playing the front cache's role) and
    /// collects any completions it produced.
    pub fn deliver(&mut self, event: ControllerEvent) {
        self.ctrl.deliver(event);
        self.log.extend(self.ctrl.drain_completions());
    }

    /// Ticks `n` cycles, collecting completions into the log.
    pub fn tick_n(&mut self, n: u64) {
        for _ in 0..n {
            self.ctrl.tick();
            self.log.extend(self.ctrl.drain_completions());
        }
    }

    /// Ticks until the controller is idle; panics after `max` cycles.
    pub fn run_until_idle(&mut self, max: u64) {
        for _ in 0..max {
            if self.ctrl.is_idle() {
                return;
            }
            self.tick_n(1);
        }
        assert!(
            self.ctrl.is_idle(),
            "controller still busy after {max} cycles"
        );
    }

    /// All completions delivered for `id`, in order.
    pub fn completions_for(&self, id: RequestId) -> Vec<Completion> {
        self.log.iter().filter(|c| c.id == id).copied().collect()
    }

    /// Cycle at which `id`'s single completion of `kind` was delivered.
    ///
    /// The log records delivery order, not cycles; use
    /// [`TestContext::tick_logged`] when exact cycles matter.
    pub fn single_completion(&self, id: RequestId, kind: CompletionKind) -> Completion {
        let found = self.completions_for(id);
        assert_eq!(found.len(), 1, "expected exactly one completion for {id}");
        assert_eq!(found[0].kind, kind, "wrong completion kind for {id}");
        found[0]
    }

    /// Ticks once and returns the completions with the cycle they fired at.
    pub fn tick_logged(&mut self) -> (u64, Vec<Completion>) {
        self.ctrl.tick();
        let fired = self.ctrl.drain_completions();
        self.log.extend(fired.iter().copied());
        (self.ctrl.cycle(), fired)
    }

    /// Ticks until a completion for `id` is delivered; returns the cycle.
    /// Panics after `max` cycles.
    pub fn cycle_of_completion(&mut self, id: RequestId, max: u64) -> u64 {
        for _ in 0..max {
            let (cycle, fired) = self.tick_logged();
            if fired.iter().any(|c| c.id == id) {
                return cycle;
            }
        }
        panic!("no completion for {id} within {max} cycles");
    }
}
