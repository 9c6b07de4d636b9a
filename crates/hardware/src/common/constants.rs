//! Baseline hardware constants.

/// Granularity of write-buffer indexing and hazard matching, in bytes.
///
/// Reads and buffered writes are matched at this granularity: a read hits a
/// buffered write iff both fall in the same 64-byte line. Matches typical
/// host cache-line size and device burst length.
pub const LINE_BYTES: u64 = 64;
