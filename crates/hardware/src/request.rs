//! Memory request, phase, completion, and controller event types.
//!
//! This module defines the data model of the scheduling engine:
//! 1. **Requests:** Stable integer handles, kind, address, and a mutable phase tag.
//! 2. **Phases:** The per-request state machine the controller drives.
//! 3. **Completions:** The outbound callback record, emitted exactly once per
//!    admitted request, tagged with the path that served it.
//! 4. **Events:** One tagged union for internal device completions and the
//!    front-cache protocol, dispatched with exhaustive matching.

/// Stable handle identifying a request across its lifetime.
///
/// Handles are assigned at request creation and key every lookup table, so a
/// squashed or canceled request can never dangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a request reads or writes the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Read access; completes with device data timing.
    Read,
    /// Write access; acknowledged when buffered, drained later.
    Write,
}

/// Lifecycle phase of a request.
///
/// The normal path is `Queued` to one of the admission outcomes to `Done`;
/// `Squashed` and `Canceled` are the two escapes (cache hit made the device
/// operation moot; bank reclaimed mid-activation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting in the pending-transaction queue.
    #[default]
    Queued,
    /// Write moved into the write buffer and acknowledged.
    BufferedWrite,
    /// Read admitted on a row miss; the bank is activating.
    DeviceActivating,
    /// Read admitted on a row hit; device ready next cycle.
    DeviceReadyRowHit,
    /// Bank ready; waiting for the data transfer to be scheduled.
    DeviceReady,
    /// Data transfer in flight; a completion event is scheduled.
    Completing,
    /// Completion delivered.
    Done,
    /// A cache hit made the device operation moot.
    Squashed,
    /// The bank was reclaimed mid-operation; the write re-enters the buffer.
    Canceled,
}

/// One memory request as tracked by the controller.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRequest {
    /// Stable handle assigned at creation.
    pub id: RequestId,
    /// Read or write.
    pub kind: RequestKind,
    /// Device address.
    pub addr: u64,
    /// Access size in bytes.
    pub size: u32,
    /// Mutable lifecycle tag.
    pub phase: Phase,
}

impl MemoryRequest {
    /// Creates a request in the `Queued` phase.
    pub fn new(id: RequestId, kind: RequestKind, addr: u64, size: u32) -> Self {
        Self {
            id,
            kind,
            addr,
            size,
            phase: Phase::Queued,
        }
    }

    /// True for write requests.
    #[inline]
    pub fn is_write(&self) -> bool {
        self.kind == RequestKind::Write
    }
}

/// Which path produced a completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionKind {
    /// Served by the device (read data returned).
    Device,
    /// Read satisfied from a buffered write to the same line.
    WriteBuffer,
    /// Served by the front cache; the device operation was skipped.
    FrontCache,
    /// Write acknowledged on entering the write buffer.
    BufferedAck,
}

/// Outbound completion record, emitted exactly once per admitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Handle of the completed request.
    pub id: RequestId,
    /// Device address of the completed request.
    pub addr: u64,
    /// The path that served it.
    pub kind: CompletionKind,
}

/// Controller events: delayed device completions and the front-cache protocol.
///
/// One tagged union replaces dynamic-cast event dispatch; every consumer
/// matches exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A device read finished its burst: unlock the bank, deliver the
    /// completion.
    ReadCompletion {
        /// Handle of the finishing read.
        id: RequestId,
    },
    /// A drained write finished: unlock the bank.
    WriteCompletion {
        /// Rank index of the finishing write.
        rank: usize,
        /// Bank index within the rank.
        bank: usize,
    },
    /// The front cache releases a held request to the device path.
    DeviceReady {
        /// Handle of the released request.
        id: RequestId,
    },
    /// The front cache resolved a lookup for a held or queued request.
    HitMiss {
        /// Handle of the request the verdict is for.
        id: RequestId,
        /// True when the cache can serve the request itself.
        hit: bool,
    },
    /// A dirty line evicted from the front cache becomes a device write.
    InvalidateWrite {
        /// Handle for the eviction write.
        id: RequestId,
        /// Line address being written back.
        addr: u64,
    },
}
