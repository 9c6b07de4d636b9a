//! Admission path: the row-buffer-hit fast path and the in-order FIFO scan.
//!
//! Both paths share one set of named predicates evaluated in a fixed order,
//! so the scheduling decision stays auditable and each condition is testable
//! on its own. At most one admission or drop happens per cycle.

use std::collections::HashSet;

use tracing::debug;

use crate::common::constants::LINE_BYTES;
use crate::request::{CompletionKind, Phase, RequestKind};
use crate::write_buffer::BufferedWrite;

use super::{Controller, InFlightRead};

/// Outcome of a read admission: open row already matches, or the row must be
/// activated first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowOutcome {
    Hit,
    Miss,
}

impl Controller {
    /// Attempts to admit one queued transaction. Returns false when no
    /// eligible work exists — a normal outcome, never an error.
    pub(super) fn admit_one_transaction(&mut self) -> bool {
        if let Some(pos) = self.find_row_hit_read() {
            self.admit_read_at(pos, RowOutcome::Hit);
            return true;
        }

        let mut i = 0;
        while i < self.pending.len() {
            let req = self.pending[i];

            match req.kind {
                RequestKind::Write => {
                    // A cache hit arrived after this write was queued: the
                    // device operation is moot. The completion already went
                    // out with the verdict, so dropping it is the cycle's
                    // one action.
                    if self.squashed.remove(&req.id) {
                        self.drop_squashed(i);
                        return true;
                    }
                    if self.write_buffer.is_full() {
                        // Stop the scan: skipping a stalled write would let a
                        // younger same-line read reach the device first. The
                        // full buffer has latched the flush demand, so the
                        // next cycles drain.
                        self.stats.scans_stopped_full_buffer += 1;
                        return false;
                    }
                    self.buffer_write_at(i);
                    return true;
                }
                RequestKind::Read => {
                    // Read-after-write hazard: a buffered write to this line
                    // answers the read; the device is never involved.
                    if self.serve_read_from_buffer(i) {
                        return true;
                    }
                    // Squashed and no buffered write to clear against: drop.
                    if self.squashed.remove(&req.id) {
                        self.drop_squashed(i);
                        return true;
                    }

                    if self.outstanding.len() >= self.config.scheduler.max_outstanding {
                        i += 1;
                        continue;
                    }

                    let rank = self.geom.rank_index(req.addr);
                    let bank = self.geom.bank_index(req.addr);

                    if self.read_blocked_by_group_lock(bank) {
                        i += 1;
                        continue;
                    }
                    if !self.bank_available(rank, bank)
                        && self.config.scheduler.write_cancellation
                        && self.try_cancel_write(rank, bank)
                        && self.serve_read_from_buffer(i)
                    {
                        // The canceled write covered this very read: the
                        // reinserted stub serves it.
                        return true;
                    }
                    if !self.bank_available(rank, bank) {
                        i += 1;
                        continue;
                    }

                    if self.is_row_hit(rank, bank, req.addr) {
                        self.admit_read_at(i, RowOutcome::Hit);
                        return true;
                    }
                    if !self.power_admits_read() {
                        self.stats.reads_deferred_power += 1;
                        i += 1;
                        continue;
                    }
                    self.admit_read_at(i, RowOutcome::Miss);
                    return true;
                }
            }
        }
        false
    }

    /// Finds the first queued read that can be admitted as a row-buffer hit.
    ///
    /// Row hits must never wait behind an earlier unrelated miss, but they
    /// must not overtake work they depend on: the scan skips reads covered by
    /// a buffered write (the in-order path serves those from the buffer) and
    /// reads with an earlier queued write to the same line.
    fn find_row_hit_read(&self) -> Option<usize> {
        if self.outstanding.len() >= self.config.scheduler.max_outstanding {
            return None;
        }
        let mut earlier_write_lines: HashSet<u64> = HashSet::new();
        for (pos, req) in self.pending.iter().enumerate() {
            if req.is_write() {
                let _ = earlier_write_lines.insert(req.addr / LINE_BYTES);
                continue;
            }
            if self.squashed.contains(&req.id) {
                continue;
            }
            if self.write_buffer.find(req.addr).is_some() {
                continue;
            }
            if earlier_write_lines.contains(&(req.addr / LINE_BYTES)) {
                continue;
            }
            let rank = self.geom.rank_index(req.addr);
            let bank = self.geom.bank_index(req.addr);
            if !self.bank_available(rank, bank) {
                continue;
            }
            if self.read_blocked_by_group_lock(bank) {
                continue;
            }
            if self.is_row_hit(rank, bank, req.addr) {
                return Some(pos);
            }
        }
        None
    }

    /// Admits the read at queue position `pos`.
    ///
    /// A hit is device-ready after one cycle and is not charged against the
    /// power budget; a miss occupies the bank for the activation window and
    /// is charged until its transfer completes.
    fn admit_read_at(&mut self, pos: usize, outcome: RowOutcome) {
        let mut req = self.remove_pending(pos);
        let rank_idx = self.geom.rank_index(req.addr);
        let bank_idx = self.geom.bank_index(req.addr);
        let ready_at = match outcome {
            RowOutcome::Hit => self.cycle + 1,
            RowOutcome::Miss => self.cycle + self.config.timing.activation(),
        };

        let open_row = self.geom.open_row(req.addr);
        let bank = self.ranks[rank_idx].bank_mut(bank_idx);
        bank.set_locked(true, self.cycle);
        bank.set_busy_until(ready_at);
        bank.note_read();

        let charged = match outcome {
            RowOutcome::Hit => {
                req.phase = Phase::DeviceReadyRowHit;
                self.stats.row_hits += 1;
                false
            }
            RowOutcome::Miss => {
                self.ranks[rank_idx]
                    .bank_mut(bank_idx)
                    .set_row_buffer(open_row, false);
                req.phase = Phase::DeviceActivating;
                self.current_reads += 1;
                self.stats.row_misses += 1;
                true
            }
        };

        debug!(id = %req.id, addr = req.addr, ?outcome, ready_at, "read admitted");
        self.outstanding.push(InFlightRead {
            req,
            rank: rank_idx,
            bank: bank_idx,
            charged,
        });
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.outstanding.len());
    }

    /// Drops the squashed request at queue position `pos`. Its completion
    /// already went out with the cache verdict.
    fn drop_squashed(&mut self, pos: usize) {
        let mut dropped = self.remove_pending(pos);
        dropped.phase = Phase::Squashed;
        self.stats.squash_drops += 1;
        debug!(id = %dropped.id, "squashed request dropped");
    }

    /// Serves the read at queue position `pos` from a buffered write to the
    /// same line, if one exists. Returns false when no hazard is present.
    ///
    /// A squashed read clears its marker instead of completing a second time;
    /// the cache already delivered its data with the verdict.
    fn serve_read_from_buffer(&mut self, pos: usize) -> bool {
        let req = self.pending[pos];
        if self.write_buffer.find(req.addr).is_none() {
            return false;
        }
        let served = self.remove_pending(pos);
        if self.squashed.remove(&served.id) {
            self.stats.squash_drops += 1;
        } else {
            self.stats.write_buffer_hits += 1;
            self.emit(served.id, served.addr, CompletionKind::WriteBuffer);
        }
        debug!(id = %served.id, addr = served.addr, "read served from write buffer");
        true
    }

    /// Moves the write at queue position `pos` into the write buffer and
    /// acknowledges it. Buffered writes occupy no device slot.
    fn buffer_write_at(&mut self, pos: usize) {
        let mut req = self.remove_pending(pos);
        req.phase = Phase::BufferedWrite;
        let inserted = self.write_buffer.insert(BufferedWrite {
            id: req.id,
            addr: req.addr,
        });
        if !inserted {
            panic!(
                "write buffer rejected an insert after reporting free space (id {})",
                req.id
            );
        }
        self.stats.writes_buffered += 1;
        self.stats.peak_buffer_occupancy = self
            .stats
            .peak_buffer_occupancy
            .max(self.write_buffer.occupancy());
        debug!(id = %req.id, addr = req.addr, "write buffered and acknowledged");
        self.emit(req.id, req.addr, CompletionKind::BufferedAck);
    }

    /// Removes and returns the request at queue position `pos`.
    fn remove_pending(&mut self, pos: usize) -> crate::request::MemoryRequest {
        let Some(req) = self.pending.remove(pos) else {
            panic!("pending queue position {pos} out of range");
        };
        req
    }
}
