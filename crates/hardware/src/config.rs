//! Configuration system for the NVM DIMM controller.
//!
//! This module defines all configuration structures used to parameterize the
//! controller. It provides:
//! 1. **Defaults:** Baseline device constants (topology, timing, buffering, power).
//! 2. **Structures:** Hierarchical config for topology, timing, write buffer,
//!    scheduler, and power admission.
//! 3. **Validation:** `Config::validate`, called once by `Controller::new`;
//!    a bad configuration is fatal at startup.
//!
//! Configuration is supplied via JSON from the host harness or use
//! `Config::default()` for the CLI.

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the controller.
///
/// These values define the baseline device configuration when not explicitly
/// overridden in the supplied JSON.
mod defaults {
    /// Banks per rank.
    pub const NUM_BANKS: usize = 16;

    /// Number of ranks on the DIMM.
    pub const NUM_RANKS: usize = 2;

    /// Row buffer size in bytes.
    ///
    /// One open row per bank; also the granularity of bank interleaving.
    pub const ROW_BUFFER_BYTES: u64 = 4096;

    /// Command decode/issue latency in cycles.
    pub const COMMAND_LATENCY: u64 = 4;

    /// Column access latency for reads, in cycles.
    pub const READ_COLUMN_LATENCY: u64 = 35;

    /// Column access latency for writes, in cycles.
    ///
    /// PCM cell programming is far slower than sensing, which is what makes
    /// write buffering, group locking, and cancellation worthwhile.
    pub const WRITE_COLUMN_LATENCY: u64 = 120;

    /// Row activation latency in cycles (miss penalty before column access).
    pub const ROW_ACTIVATE_LATENCY: u64 = 110;

    /// Data burst latency in cycles.
    pub const BURST_LATENCY: u64 = 8;

    /// Write buffer capacity in entries.
    pub const WRITE_BUFFER_SIZE: usize = 64;

    /// Occupancy percentage at which the buffer starts demanding a flush.
    pub const FLUSH_HIGH_PCT: u8 = 80;

    /// Occupancy percentage at which a flush in progress stops.
    pub const FLUSH_LOW_PCT: u8 = 20;

    /// Maximum concurrent in-flight device read requests.
    pub const MAX_OUTSTANDING: usize = 32;

    /// Maximum concurrent device writes (buffered writes are not counted).
    pub const MAX_CONCURRENT_WRITES: u32 = 4;

    /// Power weight of one in-flight device read.
    pub const READ_WEIGHT: u64 = 1;

    /// Power weight of one in-flight device write.
    pub const WRITE_WEIGHT: u64 = 4;

    /// Total instantaneous power-weight budget for the DIMM.
    pub const MAX_POWER_WEIGHT: u64 = 16;

    /// Banks per adaptive-write group.
    pub const GROUP_SIZE: usize = 4;

    /// Cycles between adaptive-write group rotations.
    pub const LOCK_PERIOD: u64 = 1000;

    /// Write-cancellation threshold, percent of the write service time.
    pub const WRITE_CANCEL_THRESHOLD: u8 = 50;

    /// Cycle period of the forced write-service slot in modulo scheduling.
    pub const MODULO_UNIT: u64 = 10;
}

/// Root configuration structure containing all controller settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use nvmsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.topology.num_banks, 16);
/// assert!(config.validate().is_ok());
/// ```
///
/// Deserializing from JSON (typical harness usage):
///
/// ```
/// use nvmsim_core::config::Config;
///
/// let json = r#"{
///     "topology": {
///         "num_banks": 4,
///         "num_ranks": 1,
///         "row_buffer_bytes": 256,
///         "cacheline_interleaving": false
///     },
///     "scheduler": {
///         "max_outstanding": 1,
///         "write_cancellation": true,
///         "write_cancel_threshold": 60
///     }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.topology.num_banks, 4);
/// assert_eq!(config.scheduler.max_outstanding, 1);
/// assert!(config.scheduler.write_cancellation);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bank/rank layout and interleaving policy.
    pub topology: TopologyConfig,
    /// Device timing parameters in cycles.
    pub timing: TimingConfig,
    /// Write buffer capacity and hysteresis thresholds.
    pub write_buffer: WriteBufferConfig,
    /// Admission, draining, and optimization knobs.
    pub scheduler: SchedulerConfig,
    /// Power-weight admission model.
    pub power: PowerConfig,
}

/// Bank/rank layout and interleaving policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Banks per rank.
    pub num_banks: usize,
    /// Number of ranks.
    pub num_ranks: usize,
    /// Row buffer size in bytes.
    pub row_buffer_bytes: u64,
    /// Cacheline interleaving when true; bank interleaving when false.
    pub cacheline_interleaving: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_banks: defaults::NUM_BANKS,
            num_ranks: defaults::NUM_RANKS,
            row_buffer_bytes: defaults::ROW_BUFFER_BYTES,
            cacheline_interleaving: true,
        }
    }
}

/// Device timing parameters, all in controller cycles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Command decode/issue latency.
    pub command: u64,
    /// Column access latency for reads.
    pub read_column: u64,
    /// Column access latency for writes.
    pub write_column: u64,
    /// Row activation latency.
    pub row_activate: u64,
    /// Data burst latency.
    pub burst: u64,
}

impl TimingConfig {
    /// Total device service time of a drained write.
    #[inline]
    pub fn write_service(&self) -> u64 {
        self.command + self.write_column + self.burst
    }

    /// Total transfer window of a read once its bank is ready.
    #[inline]
    pub fn read_transfer(&self) -> u64 {
        self.command + self.read_column + self.burst
    }

    /// Admission-to-ready latency of a row-buffer miss.
    #[inline]
    pub fn activation(&self) -> u64 {
        self.row_activate + self.command
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command: defaults::COMMAND_LATENCY,
            read_column: defaults::READ_COLUMN_LATENCY,
            write_column: defaults::WRITE_COLUMN_LATENCY,
            row_activate: defaults::ROW_ACTIVATE_LATENCY,
            burst: defaults::BURST_LATENCY,
        }
    }
}

/// Write buffer capacity and flush hysteresis thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriteBufferConfig {
    /// Capacity in entries.
    pub size: usize,
    /// Occupancy percentage that latches the flush demand.
    pub flush_high_pct: u8,
    /// Occupancy percentage that releases the flush demand.
    pub flush_low_pct: u8,
}

impl Default for WriteBufferConfig {
    fn default() -> Self {
        Self {
            size: defaults::WRITE_BUFFER_SIZE,
            flush_high_pct: defaults::FLUSH_HIGH_PCT,
            flush_low_pct: defaults::FLUSH_LOW_PCT,
        }
    }
}

/// Admission, draining, and optimization knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrent in-flight device reads.
    pub max_outstanding: usize,
    /// Maximum concurrent device writes (excluding buffered writes).
    pub max_concurrent_writes: u32,
    /// Lock a rotating bank group to writes for `lock_period` cycles.
    pub adaptive_writes: bool,
    /// Banks per adaptive-write group.
    pub group_size: usize,
    /// Cycles between adaptive-write group rotations.
    pub lock_period: u64,
    /// Cancel an in-flight write when a read wants its bank.
    pub write_cancellation: bool,
    /// Cancellation threshold, percent of the write service time.
    pub write_cancel_threshold: u8,
    /// Force a periodic write-service slot regardless of flush state.
    pub modulo_scheduling: bool,
    /// Period of the forced write-service slot in cycles.
    pub modulo_unit: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_outstanding: defaults::MAX_OUTSTANDING,
            max_concurrent_writes: defaults::MAX_CONCURRENT_WRITES,
            adaptive_writes: false,
            group_size: defaults::GROUP_SIZE,
            lock_period: defaults::LOCK_PERIOD,
            write_cancellation: false,
            write_cancel_threshold: defaults::WRITE_CANCEL_THRESHOLD,
            modulo_scheduling: false,
            modulo_unit: defaults::MODULO_UNIT,
        }
    }
}

/// Power-weight admission model.
///
/// Weights are a unitless proxy for instantaneous current draw; an operation
/// is admitted only while the weighted sum of in-flight operations stays
/// within `max_power_weight`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Weight of one in-flight device read.
    pub read_weight: u64,
    /// Weight of one in-flight device write.
    pub write_weight: u64,
    /// Total instantaneous budget.
    pub max_power_weight: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            read_weight: defaults::READ_WEIGHT,
            write_weight: defaults::WRITE_WEIGHT,
            max_power_weight: defaults::MAX_POWER_WEIGHT,
        }
    }
}

impl Config {
    /// Validates the configuration; called once by `Controller::new`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found. A failed validation is fatal
    /// at startup: the controller refuses to construct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_zero(value: u64, name: &'static str) -> Result<(), ConfigError> {
            if value == 0 {
                Err(ConfigError::ZeroParameter { name })
            } else {
                Ok(())
            }
        }

        non_zero(self.topology.num_banks as u64, "num_banks")?;
        non_zero(self.topology.num_ranks as u64, "num_ranks")?;
        non_zero(self.topology.row_buffer_bytes, "row_buffer_bytes")?;
        non_zero(self.write_buffer.size as u64, "write_buffer.size")?;
        non_zero(self.scheduler.max_outstanding as u64, "max_outstanding")?;
        non_zero(
            u64::from(self.scheduler.max_concurrent_writes),
            "max_concurrent_writes",
        )?;
        non_zero(self.power.read_weight, "read_weight")?;
        non_zero(self.power.write_weight, "write_weight")?;
        non_zero(self.power.max_power_weight, "max_power_weight")?;

        let (low, high) = (
            self.write_buffer.flush_low_pct,
            self.write_buffer.flush_high_pct,
        );
        if low > high || high > 100 {
            return Err(ConfigError::InvalidFlushThresholds { low, high });
        }

        if self.scheduler.adaptive_writes {
            non_zero(self.scheduler.group_size as u64, "group_size")?;
            non_zero(self.scheduler.lock_period, "lock_period")?;
            if self.topology.num_banks % self.scheduler.group_size != 0 {
                return Err(ConfigError::GroupSizeMismatch {
                    group_size: self.scheduler.group_size,
                    num_banks: self.topology.num_banks,
                });
            }
        }

        if self.scheduler.modulo_scheduling {
            non_zero(self.scheduler.modulo_unit, "modulo_unit")?;
        }

        if self.scheduler.write_cancel_threshold > 100 {
            return Err(ConfigError::CancelThresholdOutOfRange(
                self.scheduler.write_cancel_threshold,
            ));
        }

        if self.power.read_weight > self.power.max_power_weight {
            return Err(ConfigError::WeightExceedsBudget {
                name: "read",
                weight: self.power.read_weight,
                budget: self.power.max_power_weight,
            });
        }
        if self.power.write_weight > self.power.max_power_weight {
            return Err(ConfigError::WeightExceedsBudget {
                name: "write",
                weight: self.power.write_weight,
                budget: self.power.max_power_weight,
            });
        }

        Ok(())
    }
}
