//! Bounded write buffer with hysteresis flush signaling.
//!
//! Writes are acknowledged as soon as they enter the buffer and drained to
//! the device later. The buffer provides:
//! 1. **Insertion:** Bounded FIFO append, indexed by line address.
//! 2. **Hazard lookup:** O(1) `find` so a read never bypasses a buffered
//!    write to the same line.
//! 3. **Removal:** FIFO `pop_front` or out-of-order `erase` for
//!    locality-driven drains.
//! 4. **Flush signaling:** Sticky hysteresis between a high and a low
//!    occupancy threshold, so flush state cannot oscillate at the boundary.

use std::collections::{HashMap, VecDeque};

use crate::common::constants::LINE_BYTES;
use crate::request::RequestId;

/// A write parked in the buffer; the stand-in for a drained request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferedWrite {
    /// Handle of the buffered write.
    pub id: RequestId,
    /// Device address of the write.
    pub addr: u64,
}

/// Bounded, address-indexed staging area for writes.
pub struct WriteBuffer {
    fifo: VecDeque<BufferedWrite>,
    /// Line address → ids of buffered writes to that line, oldest first.
    /// Several writes to one line coexist; `find` answers with the newest.
    index: HashMap<u64, Vec<RequestId>>,
    max_entries: usize,
    high_pct: u8,
    low_pct: u8,
    still_flushing: bool,
}

impl std::fmt::Debug for WriteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBuffer")
            .field("occupancy", &self.fifo.len())
            .field("max_entries", &self.max_entries)
            .field("still_flushing", &self.still_flushing)
            .finish()
    }
}

impl WriteBuffer {
    /// Creates an empty buffer with the given capacity and thresholds.
    pub fn new(max_entries: usize, high_pct: u8, low_pct: u8) -> Self {
        Self {
            fifo: VecDeque::with_capacity(max_entries),
            index: HashMap::new(),
            max_entries,
            high_pct,
            low_pct,
            still_flushing: false,
        }
    }

    /// Number of buffered writes.
    #[inline]
    pub fn occupancy(&self) -> usize {
        self.fifo.len()
    }

    /// Capacity in entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// True when no writes are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// True when the buffer cannot accept another write.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.fifo.len() >= self.max_entries
    }

    /// True while the buffer demands draining (sticky hysteresis state).
    #[inline]
    pub fn should_flush(&self) -> bool {
        self.still_flushing
    }

    /// Inserts a write. Returns false if the buffer is at capacity.
    pub fn insert(&mut self, write: BufferedWrite) -> bool {
        if self.is_full() {
            return false;
        }
        self.index.entry(line_of(write.addr)).or_default().push(write.id);
        self.fifo.push_back(write);
        if self.fifo.len() * 100 >= self.max_entries * usize::from(self.high_pct) {
            self.still_flushing = true;
        }
        self.check_consistency("insert");
        true
    }

    /// Newest buffered write to `addr`'s line, if any.
    ///
    /// This is the read-after-write hazard lookup: a read whose line is here
    /// must be served from the buffer, never from the device.
    #[inline]
    pub fn find(&self, addr: u64) -> Option<RequestId> {
        self.index.get(&line_of(addr)).and_then(|ids| ids.last().copied())
    }

    /// Removes and returns the oldest buffered write.
    pub fn pop_front(&mut self) -> Option<BufferedWrite> {
        let write = self.fifo.pop_front()?;
        self.unindex(&write);
        self.settle_after_removal();
        self.check_consistency("pop_front");
        Some(write)
    }

    /// Removes a specific write out of FIFO order (locality-driven drains).
    ///
    /// # Panics
    ///
    /// Panics if `id` is not buffered: the drain scan just produced it, so a
    /// missing entry is a scheduler bug, not a recoverable condition.
    pub fn erase(&mut self, id: RequestId) -> BufferedWrite {
        let Some(pos) = self.fifo.iter().position(|w| w.id == id) else {
            panic!(
                "write buffer: erase of untracked request {id} (occupancy {})",
                self.fifo.len()
            );
        };
        let write = self.fifo.remove(pos).unwrap_or_else(|| {
            panic!("write buffer: position {pos} vanished during erase")
        });
        self.unindex(&write);
        self.settle_after_removal();
        self.check_consistency("erase");
        write
    }

    /// FIFO-order iteration over buffered writes.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &BufferedWrite> {
        self.fifo.iter()
    }

    fn unindex(&mut self, write: &BufferedWrite) {
        let line = line_of(write.addr);
        let Some(ids) = self.index.get_mut(&line) else {
            panic!("write buffer: no index entry for line {line:#x}");
        };
        let Some(pos) = ids.iter().position(|id| *id == write.id) else {
            panic!("write buffer: request {} missing from line {line:#x} index", write.id);
        };
        let _ = ids.remove(pos);
        if ids.is_empty() {
            let _ = self.index.remove(&line);
        }
    }

    fn settle_after_removal(&mut self) {
        if self.fifo.len() * 100 <= self.max_entries * usize::from(self.low_pct) {
            self.still_flushing = false;
        }
    }

    fn check_consistency(&self, op: &str) {
        let indexed: usize = self.index.values().map(Vec::len).sum();
        if indexed != self.fifo.len() {
            panic!(
                "write buffer corrupt after {op}: {indexed} indexed entries for {} buffered writes",
                self.fifo.len()
            );
        }
    }
}

/// Line address used for indexing and hazard matching.
#[inline]
fn line_of(addr: u64) -> u64 {
    addr / LINE_BYTES
}
