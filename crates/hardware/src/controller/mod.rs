//! Controller core: per-cycle admission scheduling and event dispatch.
//!
//! The controller owns every piece of mutable device state — ranks, banks,
//! the write buffer, the pending queue, the outstanding set, and the power
//! accounting — and is advanced one discrete cycle at a time by an external
//! driver. Each `tick`:
//! 1. Retires the power-counter entries indexed at this cycle and fires the
//!    device completion events due now (freed resources become visible before
//!    any new admission).
//! 2. Schedules the data transfer for every outstanding read whose bank and
//!    rank have come free.
//! 3. Rotates the adaptive write-group lock, then runs either the drain path
//!    or the admission path — at most one admission and one drain per cycle.
//!
//! The admission scan itself lives in `admission`; the drain path and write
//! cancellation live in `drain`.

/// Admission path: row-hit fast path and the in-order FIFO scan.
mod admission;
/// Drain path: write draining, adaptive grouping, write cancellation.
mod drain;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::common::{ConfigError, Geometry};
use crate::config::Config;
use crate::device::Rank;
use crate::request::{
    Completion, CompletionKind, ControllerEvent, MemoryRequest, Phase, RequestId, RequestKind,
};
use crate::stats::ControllerStats;
use crate::write_buffer::WriteBuffer;

/// A read bound to its bank, from admission until its completion fires.
#[derive(Debug, Clone, Copy)]
struct InFlightRead {
    req: MemoryRequest,
    rank: usize,
    bank: usize,
    /// Whether this read was charged against the power budget (activations
    /// only; row hits move no new row and are free).
    charged: bool,
}

/// A drained write occupying its bank, tracked for cancellation. The id is
/// the buffered write's stable handle; a cancellation stub re-enters the
/// buffer under the same handle.
#[derive(Debug, Clone, Copy)]
struct InFlightWrite {
    id: RequestId,
    addr: u64,
    rank: usize,
    bank: usize,
    done_at: u64,
}

/// The NVM DIMM controller scheduling core.
///
/// Construct with [`Controller::new`]; feed requests with
/// [`Controller::push_request`] (or [`Controller::push_held`] when a front
/// cache is consulted first), advance with [`Controller::tick`], and collect
/// completions with [`Controller::drain_completions`].
#[derive(Debug)]
pub struct Controller {
    config: Config,
    geom: Geometry,
    ranks: Vec<Rank>,
    write_buffer: WriteBuffer,

    pending: VecDeque<MemoryRequest>,
    held: HashMap<RequestId, MemoryRequest>,
    squashed: HashSet<RequestId>,
    outstanding: Vec<InFlightRead>,
    inflight_writes: Vec<InFlightWrite>,

    /// Events due at a future cycle, fired in insertion order within a cycle.
    due: BTreeMap<u64, Vec<ControllerEvent>>,
    /// `current_reads` decrements indexed by the cycle they take effect.
    reads_done_at: BTreeMap<u64, u32>,
    /// `current_writes` decrements indexed by the cycle they take effect.
    writes_done_at: BTreeMap<u64, u32>,
    current_reads: u32,
    current_writes: u32,

    group_locked: usize,
    cycle: u64,

    completions: VecDeque<Completion>,
    stats: ControllerStats,
}

impl Controller {
    /// Builds a controller for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if validation fails; a bad configuration is
    /// fatal at startup.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let geom = Geometry::new(&config.topology);
        let ranks = (0..config.topology.num_ranks)
            .map(|_| Rank::new(config.topology.num_banks))
            .collect();
        let write_buffer = WriteBuffer::new(
            config.write_buffer.size,
            config.write_buffer.flush_high_pct,
            config.write_buffer.flush_low_pct,
        );
        Ok(Self {
            config,
            geom,
            ranks,
            write_buffer,
            pending: VecDeque::new(),
            held: HashMap::new(),
            squashed: HashSet::new(),
            outstanding: Vec::new(),
            inflight_writes: Vec::new(),
            due: BTreeMap::new(),
            reads_done_at: BTreeMap::new(),
            writes_done_at: BTreeMap::new(),
            current_reads: 0,
            current_writes: 0,
            group_locked: 0,
            cycle: 0,
            completions: VecDeque::new(),
            stats: ControllerStats::default(),
        })
    }

    /// Current cycle (0 before the first `tick`).
    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Scheduling statistics so far.
    #[inline]
    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// True when no request is queued, held, buffered, or in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
            && self.held.is_empty()
            && self.outstanding.is_empty()
            && self.inflight_writes.is_empty()
            && self.write_buffer.is_empty()
            && self.due.is_empty()
    }

    /// Accepts a request straight into the pending-transaction queue.
    pub fn push_request(&mut self, id: RequestId, addr: u64, size: u32, is_write: bool) {
        let kind = if is_write {
            RequestKind::Write
        } else {
            RequestKind::Read
        };
        trace!(%id, addr, ?kind, "request accepted");
        if is_write {
            self.stats.writes_accepted += 1;
        } else {
            self.stats.reads_accepted += 1;
        }
        self.pending
            .push_back(MemoryRequest::new(id, kind, addr, size));
    }

    /// Accepts a request that first awaits a front-cache verdict.
    ///
    /// The request stays in the held set until a [`ControllerEvent::HitMiss`]
    /// or [`ControllerEvent::DeviceReady`] releases or serves it.
    pub fn push_held(&mut self, id: RequestId, addr: u64, size: u32, is_write: bool) {
        let kind = if is_write {
            RequestKind::Write
        } else {
            RequestKind::Read
        };
        trace!(%id, addr, ?kind, "request held for cache check");
        if is_write {
            self.stats.writes_accepted += 1;
        } else {
            self.stats.reads_accepted += 1;
        }
        let _ = self
            .held
            .insert(id, MemoryRequest::new(id, kind, addr, size));
    }

    /// Delivers one controller event, processing it immediately.
    ///
    /// Device completions scheduled by the controller itself arrive through
    /// the same dispatch, so every consumer of the event union matches
    /// exhaustively.
    ///
    /// # Panics
    ///
    /// Panics if the event names a request the controller is not tracking —
    /// a missing lookup entry is a scheduler bug, not a modeled fault.
    pub fn deliver(&mut self, event: ControllerEvent) {
        self.dispatch(event);
    }

    /// Takes the completions emitted since the last call.
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        self.completions.drain(..).collect()
    }

    /// Advances the controller by exactly one cycle. Not re-entrant.
    pub fn tick(&mut self) {
        self.cycle += 1;
        self.stats.cycles = self.cycle;

        if let Some(n) = self.reads_done_at.remove(&self.cycle) {
            self.current_reads -= n;
        }
        if let Some(n) = self.writes_done_at.remove(&self.cycle) {
            self.current_writes -= n;
        }
        if let Some(events) = self.due.remove(&self.cycle) {
            for event in events {
                self.dispatch(event);
            }
        }

        self.deliver_ready_reads();
        self.rotate_group_lock();

        if self.wants_drain() {
            let _ = self.drain_one_write();
        } else {
            let _ = self.admit_one_transaction();
        }
    }

    /// Whether this cycle services the write path instead of admissions.
    fn wants_drain(&self) -> bool {
        let sched = &self.config.scheduler;
        if sched.modulo_scheduling {
            return self.cycle % sched.modulo_unit == 0;
        }
        self.write_buffer.should_flush()
            || (self.pending.is_empty() && !self.write_buffer.is_empty())
    }

    /// Schedules the data transfer for every outstanding read whose bank and
    /// rank have come free at or before this cycle.
    ///
    /// Runs in admission order; the first transfer scheduled occupies its
    /// rank's bus, which naturally holds back same-rank siblings until a
    /// later cycle.
    fn deliver_ready_reads(&mut self) {
        let transfer = self.config.timing.read_transfer();
        for i in 0..self.outstanding.len() {
            let entry = self.outstanding[i];
            if !matches!(
                entry.req.phase,
                Phase::DeviceActivating | Phase::DeviceReadyRowHit
            ) {
                continue;
            }
            let bank_free = !self.ranks[entry.rank].bank(entry.bank).is_busy(self.cycle);
            let rank_free = !self.ranks[entry.rank].is_busy(self.cycle);
            if !bank_free || !rank_free {
                continue;
            }

            let end = self.cycle + transfer;
            self.outstanding[i].req.phase = Phase::DeviceReady;
            let rank = &mut self.ranks[entry.rank];
            rank.set_busy_until(end);
            rank.bank_mut(entry.bank).set_busy_until(end);
            self.due
                .entry(end)
                .or_default()
                .push(ControllerEvent::ReadCompletion { id: entry.req.id });
            if entry.charged {
                *self.reads_done_at.entry(end).or_default() += 1;
            }
            self.outstanding[i].req.phase = Phase::Completing;
            trace!(id = %entry.req.id, end, "read transfer scheduled");
        }
    }

    /// Rotates the adaptive write-group lock every `lock_period` cycles,
    /// locking the group with the most buffered writes (ties to the lowest
    /// index). An empty buffer advances round-robin so no group stays
    /// read-blocked without writes to justify it.
    fn rotate_group_lock(&mut self) {
        let sched = &self.config.scheduler;
        if !sched.adaptive_writes || self.cycle % sched.lock_period != 0 {
            return;
        }
        let groups = self.config.topology.num_banks / sched.group_size;
        let best = if self.write_buffer.is_empty() {
            (self.group_locked + 1) % groups
        } else {
            let mut buffered = vec![0_usize; groups];
            for write in self.write_buffer.iter() {
                let bank = self.geom.bank_index(write.addr);
                buffered[self.geom.group_index(bank, sched.group_size)] += 1;
            }
            let mut best = 0;
            for (group, count) in buffered.iter().enumerate() {
                if *count > buffered[best] {
                    best = group;
                }
            }
            best
        };
        if best != self.group_locked {
            debug!(group = best, "write group lock rotated");
            self.group_locked = best;
        }
    }

    /// Exhaustive event dispatch.
    fn dispatch(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::ReadCompletion { id } => self.complete_read(id),
            ControllerEvent::WriteCompletion { rank, bank } => self.complete_write(rank, bank),
            ControllerEvent::DeviceReady { id } => self.release_held(id),
            ControllerEvent::HitMiss { id, hit } => self.resolve_hit_miss(id, hit),
            ControllerEvent::InvalidateWrite { id, addr } => self.accept_eviction(id, addr),
        }
    }

    /// A device read finished its burst: unlock the bank, emit the completion.
    fn complete_read(&mut self, id: RequestId) {
        let Some(pos) = self.outstanding.iter().position(|e| e.req.id == id) else {
            panic!("read completion for untracked request {id} at cycle {}", self.cycle);
        };
        let mut entry = self.outstanding.remove(pos);
        self.ranks[entry.rank]
            .bank_mut(entry.bank)
            .set_locked(false, self.cycle);
        entry.req.phase = Phase::Done;
        self.stats.device_reads_completed += 1;
        debug!(%id, addr = entry.req.addr, "device read completed");
        self.emit(entry.req.id, entry.req.addr, CompletionKind::Device);
    }

    /// A drained write finished: unlock the bank, retire the tracker.
    fn complete_write(&mut self, rank: usize, bank: usize) {
        let Some(pos) = self
            .inflight_writes
            .iter()
            .position(|w| w.rank == rank && w.bank == bank)
        else {
            panic!(
                "write completion for idle bank {rank}/{bank} at cycle {}",
                self.cycle
            );
        };
        let write = self.inflight_writes.remove(pos);
        self.ranks[rank].bank_mut(bank).set_locked(false, self.cycle);
        trace!(addr = write.addr, rank, bank, "device write completed");
    }

    /// The front cache released a held request to the device path.
    fn release_held(&mut self, id: RequestId) {
        let Some(req) = self.held.remove(&id) else {
            panic!("device-ready for request {id} that is not held");
        };
        self.pending.push_back(req);
    }

    /// The front cache resolved a lookup for a held or queued request.
    fn resolve_hit_miss(&mut self, id: RequestId, hit: bool) {
        if let Some(req) = self.held.remove(&id) {
            if hit {
                self.stats.cache_hits += 1;
                debug!(%id, "served by front cache");
                self.emit(req.id, req.addr, CompletionKind::FrontCache);
            } else {
                self.pending.push_back(req);
            }
            return;
        }
        // A verdict for a request already released to the queue: a hit makes
        // the queued device operation moot.
        let Some(req) = self.pending.iter().find(|r| r.id == id).copied() else {
            panic!("hit/miss verdict for untracked request {id}");
        };
        if hit {
            let _ = self.squashed.insert(id);
            self.stats.cache_hits += 1;
            debug!(%id, "queued request squashed by cache hit");
            self.emit(req.id, req.addr, CompletionKind::FrontCache);
        }
    }

    /// A dirty line evicted from the front cache becomes a device write.
    fn accept_eviction(&mut self, id: RequestId, addr: u64) {
        trace!(%id, addr, "eviction write accepted");
        self.stats.writes_accepted += 1;
        self.pending.push_back(MemoryRequest::new(
            id,
            RequestKind::Write,
            addr,
            crate::common::constants::LINE_BYTES as u32,
        ));
    }

    /// Queues an outbound completion for the driver to collect.
    fn emit(&mut self, id: RequestId, addr: u64, kind: CompletionKind) {
        self.completions.push_back(Completion { id, addr, kind });
    }

    /// Power admission for a read activation: the weighted in-flight sum must
    /// leave room for one more read.
    fn power_admits_read(&self) -> bool {
        let p = &self.config.power;
        p.write_weight * u64::from(self.current_writes)
            + p.read_weight * u64::from(self.current_reads)
            <= p.max_power_weight - p.read_weight
    }

    /// Power admission for a write drain, symmetric to the read test.
    fn power_admits_write(&self) -> bool {
        let p = &self.config.power;
        p.write_weight * u64::from(self.current_writes)
            + p.read_weight * u64::from(self.current_reads)
            <= p.max_power_weight - p.write_weight
    }

    /// A bank accepts a new operation only when it and its rank are idle and
    /// no in-flight request holds its lock.
    fn bank_available(&self, rank: usize, bank: usize) -> bool {
        let r = &self.ranks[rank];
        let b = r.bank(bank);
        !b.is_busy(self.cycle) && !b.is_locked() && !r.is_busy(self.cycle)
    }

    /// Under adaptive writes, the locked group belongs to the drain path and
    /// rejects reads.
    fn read_blocked_by_group_lock(&self, bank: usize) -> bool {
        let sched = &self.config.scheduler;
        sched.adaptive_writes
            && self.geom.group_index(bank, sched.group_size) == self.group_locked
    }

    /// Row-buffer-hit check against a bank's recorded open row.
    fn is_row_hit(&self, rank: usize, bank: usize, addr: u64) -> bool {
        self.geom
            .row_hit(self.ranks[rank].bank(bank).row_buffer(), addr)
    }

    /// Lifecycle phase of a tracked request, or `None` once it is gone
    /// (completed, drained, or dropped).
    pub fn phase_of(&self, id: RequestId) -> Option<Phase> {
        if self.squashed.contains(&id) {
            return Some(Phase::Squashed);
        }
        if self.held.contains_key(&id) || self.pending.iter().any(|r| r.id == id) {
            return Some(Phase::Queued);
        }
        if let Some(entry) = self.outstanding.iter().find(|e| e.req.id == id) {
            return Some(entry.req.phase);
        }
        if self.write_buffer.iter().any(|w| w.id == id) {
            return Some(Phase::BufferedWrite);
        }
        if self.inflight_writes.iter().any(|w| w.id == id) {
            return Some(Phase::Completing);
        }
        None
    }
}
