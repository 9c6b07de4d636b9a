//! Single-bank timing, locking, and row-buffer state.

/// One memory bank.
///
/// A bank is locked from the moment a request is admitted to it until that
/// request's completion handler releases it; the lock closes the race between
/// "ready to activate" and "data actually transferred". `busy_until` is
/// simple timing: the bank cannot accept a new operation before that cycle.
#[derive(Debug, Clone, Default)]
pub struct Bank {
    row_buffer: Option<u64>,
    row_buffer_dirty: bool,
    busy_until: u64,
    locked: bool,
    locked_since: u64,
    last_op_was_read: bool,
    last_write_addr: Option<u64>,
}

impl Bank {
    /// True while the bank's current operation has not finished.
    #[inline]
    pub fn is_busy(&self, now: u64) -> bool {
        self.busy_until > now
    }

    /// Cycle at which the current operation finishes.
    #[inline]
    pub fn busy_until(&self) -> u64 {
        self.busy_until
    }

    /// Marks the bank busy until cycle `t`.
    #[inline]
    pub fn set_busy_until(&mut self, t: u64) {
        self.busy_until = t;
    }

    /// True while an in-flight request is bound to this bank.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Cycle at which the current lock was taken.
    #[inline]
    pub fn locked_since(&self) -> u64 {
        self.locked_since
    }

    /// Binds or releases the bank lock.
    #[inline]
    pub fn set_locked(&mut self, locked: bool, now: u64) {
        self.locked = locked;
        if locked {
            self.locked_since = now;
        }
    }

    /// The recorded open row, if any.
    #[inline]
    pub fn row_buffer(&self) -> Option<u64> {
        self.row_buffer
    }

    /// True when the open row holds unwritten-back data.
    #[inline]
    pub fn row_buffer_dirty(&self) -> bool {
        self.row_buffer_dirty
    }

    /// Records a newly opened row.
    #[inline]
    pub fn set_row_buffer(&mut self, row: u64, dirty: bool) {
        self.row_buffer = Some(row);
        self.row_buffer_dirty = dirty;
    }

    /// True if the most recent operation on this bank was a read.
    #[inline]
    pub fn last_op_was_read(&self) -> bool {
        self.last_op_was_read
    }

    /// Address of the most recent write drained to this bank.
    #[inline]
    pub fn last_write_addr(&self) -> Option<u64> {
        self.last_write_addr
    }

    /// Records a read operation on this bank.
    #[inline]
    pub fn note_read(&mut self) {
        self.last_op_was_read = true;
    }

    /// Records a write operation to `addr` on this bank.
    #[inline]
    pub fn note_write(&mut self, addr: u64) {
        self.last_op_was_read = false;
        self.last_write_addr = Some(addr);
    }
}
