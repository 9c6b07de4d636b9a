//! Drain path: moving buffered writes to the device, adaptive grouping, and
//! write cancellation.
//!
//! Draining scans the buffer in FIFO order but may remove out of order: the
//! first entry whose bank and rank are free (and, under adaptive grouping,
//! whose group holds the write lock) wins. Cancellation is the only
//! preemption in the model: an in-flight write near the cancellation window
//! gives its bank back to a read and re-enters the buffer as a stub.

use tracing::debug;

use crate::request::ControllerEvent;
use crate::write_buffer::BufferedWrite;

use super::{Controller, InFlightWrite};

impl Controller {
    /// Attempts to drain one buffered write to the device. Returns false when
    /// no eligible write exists — a normal outcome, never an error.
    pub(super) fn drain_one_write(&mut self) -> bool {
        let sched = &self.config.scheduler;
        if self.current_writes >= sched.max_concurrent_writes || !self.power_admits_write() {
            self.stats.drains_deferred_power += 1;
            return false;
        }

        let adaptive = sched.adaptive_writes;
        let group_size = sched.group_size;
        let mut chosen = None;
        let mut group_skips = 0_u64;
        for write in self.write_buffer.iter() {
            let rank = self.geom.rank_index(write.addr);
            let bank = self.geom.bank_index(write.addr);
            if adaptive
                && self.geom.group_index(bank, group_size) != self.group_locked
            {
                group_skips += 1;
                continue;
            }
            if !self.bank_available(rank, bank) {
                continue;
            }
            chosen = Some(write.id);
            break;
        }
        self.stats.drains_deferred_group += group_skips;

        let Some(id) = chosen else {
            return false;
        };
        let write = self.write_buffer.erase(id);
        let rank_idx = self.geom.rank_index(write.addr);
        let bank_idx = self.geom.bank_index(write.addr);
        let end = self.cycle + self.config.timing.write_service();
        let open_row = self.geom.open_row(write.addr);

        let rank = &mut self.ranks[rank_idx];
        rank.set_busy_until(end);
        let bank = rank.bank_mut(bank_idx);
        bank.set_locked(true, self.cycle);
        bank.set_busy_until(end);
        bank.set_row_buffer(open_row, true);
        bank.note_write(write.addr);

        self.current_writes += 1;
        *self.writes_done_at.entry(end).or_default() += 1;
        self.due
            .entry(end)
            .or_default()
            .push(ControllerEvent::WriteCompletion {
                rank: rank_idx,
                bank: bank_idx,
            });
        self.inflight_writes.push(InFlightWrite {
            id: write.id,
            addr: write.addr,
            rank: rank_idx,
            bank: bank_idx,
            done_at: end,
        });
        self.stats.writes_drained += 1;
        debug!(id = %write.id, addr = write.addr, end, "write drained to device");
        // The stand-in request is gone; its host completion went out when it
        // entered the buffer.
        true
    }

    /// Cancels the in-flight write on `rank`/`bank` if the cancellation
    /// heuristic allows, freeing the bank for a read this same cycle.
    ///
    /// The window blends the configured percentage of the write service time
    /// with the buffer's headroom: a fuller buffer shrinks the window, since
    /// the stub needs room and drains are already urgent. Returns true when a
    /// write was canceled.
    pub(super) fn try_cancel_write(&mut self, rank: usize, bank: usize) -> bool {
        let Some(pos) = self
            .inflight_writes
            .iter()
            .position(|w| w.rank == rank && w.bank == bank)
        else {
            return false;
        };
        let write = self.inflight_writes[pos];

        let remaining = write.done_at.saturating_sub(self.cycle);
        let service = self.config.timing.write_service();
        let headroom = 1.0
            - self.write_buffer.occupancy() as f64 / self.write_buffer.capacity() as f64;
        let window = f64::from(self.config.scheduler.write_cancel_threshold) / 100.0
            * service as f64
            * headroom;
        if remaining as f64 >= window || self.write_buffer.is_full() {
            return false;
        }

        // Retract the scheduled completion and its power bookkeeping.
        let Some(events) = self.due.get_mut(&write.done_at) else {
            panic!(
                "canceling write on {rank}/{bank} with no events due at {}",
                write.done_at
            );
        };
        let Some(ev_pos) = events.iter().position(|ev| {
            matches!(ev, ControllerEvent::WriteCompletion { rank: r, bank: b } if *r == rank && *b == bank)
        }) else {
            panic!("canceling write on {rank}/{bank} with no scheduled completion");
        };
        let _ = events.remove(ev_pos);
        if events.is_empty() {
            let _ = self.due.remove(&write.done_at);
        }
        let Some(count) = self.writes_done_at.get_mut(&write.done_at) else {
            panic!("canceling write on {rank}/{bank} with no counter entry");
        };
        *count -= 1;
        if *count == 0 {
            let _ = self.writes_done_at.remove(&write.done_at);
        }
        self.current_writes -= 1;
        let _ = self.inflight_writes.remove(pos);

        // Free the bank now; only roll the rank back if this write is what
        // holds it.
        let r = &mut self.ranks[rank];
        if r.busy_until() == write.done_at {
            r.set_busy_until(self.cycle);
        }
        let b = r.bank_mut(bank);
        b.set_locked(false, self.cycle);
        b.set_busy_until(self.cycle);

        // The write re-enters the buffer as a stub under its own handle, at
        // the bank's recorded write address.
        let inserted = self.write_buffer.insert(BufferedWrite {
            id: write.id,
            addr: write.addr,
        });
        if !inserted {
            panic!("write buffer rejected a cancellation stub after reporting free space");
        }
        self.stats.writes_canceled += 1;
        debug!(addr = write.addr, rank, bank, "in-flight write canceled");
        true
    }
}
