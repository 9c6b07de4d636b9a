//! Rank-level timing state and bank array.

use super::Bank;

/// One rank: a shared data bus over a fixed array of banks.
///
/// `busy_until` models the rank-level transfer window — only one burst moves
/// over a rank's bus at a time, whichever bank it comes from.
#[derive(Debug, Clone)]
pub struct Rank {
    busy_until: u64,
    banks: Vec<Bank>,
}

impl Rank {
    /// Creates a rank with `num_banks` idle banks.
    pub fn new(num_banks: usize) -> Self {
        Self {
            busy_until: 0,
            banks: vec![Bank::default(); num_banks],
        }
    }

    /// True while a transfer occupies this rank's bus.
    #[inline]
    pub fn is_busy(&self, now: u64) -> bool {
        self.busy_until > now
    }

    /// Cycle at which the current transfer finishes.
    #[inline]
    pub fn busy_until(&self) -> u64 {
        self.busy_until
    }

    /// Marks the rank busy until cycle `t`.
    #[inline]
    pub fn set_busy_until(&mut self, t: u64) {
        self.busy_until = t;
    }

    /// Shared access to a bank by index.
    #[inline]
    pub fn bank(&self, index: usize) -> &Bank {
        &self.banks[index]
    }

    /// Mutable access to a bank by index.
    #[inline]
    pub fn bank_mut(&mut self, index: usize) -> &mut Bank {
        &mut self.banks[index]
    }
}
