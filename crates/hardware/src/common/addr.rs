//! Device geometry and address decomposition.
//!
//! This module owns the mapping from request addresses to device coordinates.
//! It provides the following:
//! 1. **Bank/rank selection:** Which bank and rank an address falls in.
//! 2. **Open-row values:** What a bank's row buffer records after an access.
//! 3. **Row-buffer-hit predicate:** One shared implementation used by both the
//!    fast-path and in-order admission scans, so the two can never disagree.

use crate::config::TopologyConfig;

/// Address decomposition rules for a fixed device topology.
///
/// The interleaving policy decides how consecutive row-sized blocks are
/// spread across banks and what "the open row" means:
/// - *cacheline interleaving*: consecutive blocks rotate across all banks, so
///   the open row is the block group `addr / (num_banks * row_bytes)`;
/// - *bank interleaving*: a bank's row buffer records the raw row slot
///   `addr / row_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    num_banks: usize,
    num_ranks: usize,
    row_bytes: u64,
    cacheline_interleaving: bool,
}

impl Geometry {
    /// Builds the geometry for a validated topology.
    pub fn new(topology: &TopologyConfig) -> Self {
        Self {
            num_banks: topology.num_banks,
            num_ranks: topology.num_ranks,
            row_bytes: topology.row_buffer_bytes,
            cacheline_interleaving: topology.cacheline_interleaving,
        }
    }

    /// Number of banks per rank.
    #[inline]
    pub fn num_banks(&self) -> usize {
        self.num_banks
    }

    /// Number of ranks.
    #[inline]
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Bank index an address maps to, in both interleaving modes.
    #[inline]
    pub fn bank_index(&self, addr: u64) -> usize {
        ((addr / self.row_bytes) as usize) % self.num_banks
    }

    /// Rank index an address maps to.
    ///
    /// Consecutive bank groups stripe across ranks.
    #[inline]
    pub fn rank_index(&self, addr: u64) -> usize {
        ((addr / self.row_bytes) as usize / self.num_banks) % self.num_ranks
    }

    /// The value a bank's row buffer records after opening `addr`'s row.
    #[inline]
    pub fn open_row(&self, addr: u64) -> u64 {
        if self.cacheline_interleaving {
            addr / (self.num_banks as u64 * self.row_bytes)
        } else {
            addr / self.row_bytes
        }
    }

    /// Row-buffer-hit predicate: does the recorded open row serve `addr`?
    ///
    /// Evaluated only on the bank `addr` maps to, so bank equality is implied
    /// and the comparison reduces to the open-row value in both modes.
    #[inline]
    pub fn row_hit(&self, open_row: Option<u64>, addr: u64) -> bool {
        open_row == Some(self.open_row(addr))
    }

    /// Adaptive-write group index of a bank.
    #[inline]
    pub fn group_index(&self, bank: usize, group_size: usize) -> usize {
        bank / group_size
    }
}
