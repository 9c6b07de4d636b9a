//! Controller statistics collection and reporting.
//!
//! This module tracks scheduling metrics for the controller. It provides:
//! 1. **Throughput:** Accepted requests, device reads completed, writes drained.
//! 2. **Locality:** Row-buffer hits/misses and reads served from the write buffer.
//! 3. **Optimizations:** Cache squashes, write cancellations, group-lock and
//!    power deferrals.
//! 4. **Occupancy:** Peak write-buffer and outstanding-set occupancy.
//!
//! All counters are fields owned by the controller instance; there are no
//! process-wide statics.

/// Scheduling statistics for one controller instance.
#[derive(Debug, Clone, Default)]
pub struct ControllerStats {
    /// Total cycles ticked.
    pub cycles: u64,
    /// Read requests accepted.
    pub reads_accepted: u64,
    /// Write requests accepted.
    pub writes_accepted: u64,

    /// Device read completions delivered.
    pub device_reads_completed: u64,
    /// Reads admitted on an open row (1-cycle admission).
    pub row_hits: u64,
    /// Reads admitted through a row activation.
    pub row_misses: u64,
    /// Reads satisfied from a buffered write, no device operation.
    pub write_buffer_hits: u64,
    /// Requests served by the front cache (held or squashed).
    pub cache_hits: u64,
    /// Squashed requests dropped by the admission scan.
    pub squash_drops: u64,

    /// Writes moved into the write buffer.
    pub writes_buffered: u64,
    /// Writes drained from the buffer to the device.
    pub writes_drained: u64,
    /// In-flight writes canceled to make way for a read.
    pub writes_canceled: u64,

    /// Read admissions deferred by the power budget.
    pub reads_deferred_power: u64,
    /// Drains deferred by the power budget or the concurrent-write cap.
    pub drains_deferred_power: u64,
    /// Drain candidates skipped because their group was not write-locked.
    pub drains_deferred_group: u64,
    /// Admission scans stopped by a full write buffer.
    pub scans_stopped_full_buffer: u64,

    /// Highest write-buffer occupancy observed.
    pub peak_buffer_occupancy: usize,
    /// Highest outstanding-set occupancy observed.
    pub peak_outstanding: usize,
}

impl ControllerStats {
    /// Prints the statistics report to stdout.
    pub fn print(&self) {
        let cyc = if self.cycles == 0 { 1 } else { self.cycles };
        let activations = self.row_hits + self.row_misses;
        let act = if activations == 0 { 1 } else { activations };

        println!("\n==========================================================");
        println!("NVM DIMM CONTROLLER STATISTICS");
        println!("==========================================================");
        println!("sim_cycles               {}", self.cycles);
        println!("reads.accepted           {}", self.reads_accepted);
        println!("reads.completed          {}", self.device_reads_completed);
        println!("writes.accepted          {}", self.writes_accepted);
        println!("writes.drained           {}", self.writes_drained);
        println!("----------------------------------------------------------");
        println!("ROW BUFFER");
        println!(
            "  row.hits               {} ({:.2}%)",
            self.row_hits,
            (self.row_hits as f64 / act as f64) * 100.0
        );
        println!(
            "  row.misses             {} ({:.2}%)",
            self.row_misses,
            (self.row_misses as f64 / act as f64) * 100.0
        );
        println!("  buffer.read_hits       {}", self.write_buffer_hits);
        println!("----------------------------------------------------------");
        println!("WRITE PATH");
        println!("  buffer.inserted        {}", self.writes_buffered);
        println!("  buffer.peak            {}", self.peak_buffer_occupancy);
        println!("  writes.canceled        {}", self.writes_canceled);
        println!("----------------------------------------------------------");
        println!("SCHEDULING");
        println!("  cache.hits             {}", self.cache_hits);
        println!("  squash.drops           {}", self.squash_drops);
        println!(
            "  defer.read_power       {} ({:.4}/cycle)",
            self.reads_deferred_power,
            self.reads_deferred_power as f64 / cyc as f64
        );
        println!("  defer.drain_power      {}", self.drains_deferred_power);
        println!("  defer.drain_group      {}", self.drains_deferred_group);
        println!("  stall.buffer_full      {}", self.scans_stopped_full_buffer);
        println!("  outstanding.peak       {}", self.peak_outstanding);
        println!("==========================================================");
    }
}
