//! Bridge error types.

use thiserror::Error;

/// Errors surfaced to callers of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The module bytes are not a valid WebAssembly module.
    #[error("invalid module: {0}")]
    Validation(String),

    /// The module's imports could not be resolved against the import table.
    #[error("link failed: {0}")]
    Link(String),

    /// A required export is missing or has the wrong kind or signature.
    #[error("module does not export `{0}`")]
    MissingExport(String),

    /// The source text does not fit in the guest memory above the heap base.
    #[error("source needs {needed} bytes but only {available} bytes are free above the heap base")]
    Capacity { needed: usize, available: usize },

    /// The compiler returned a descriptor pointing outside its memory.
    #[error("artifact [{address}, {address}+{len}) exceeds guest memory of {memory_size} bytes")]
    ArtifactOutOfBounds {
        address: u32,
        len: u32,
        memory_size: usize,
    },

    /// The compiler signalled a failure through the descriptor.
    #[error("compilation failed: {0}")]
    CompilerFailed(String),

    /// The guest trapped for a reason other than a host fault.
    #[error("guest trapped: {0}")]
    Trap(String),

    /// A host import faulted while servicing the guest.
    #[error(transparent)]
    Host(#[from] HostFault),

    /// A memory reference was taken before the memory was rebound.
    #[error("stale memory reference: generation {held}, memory is at generation {current}")]
    StaleView { held: u64, current: u64 },

    /// The bridge configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The source preprocessor could not be built.
    #[error("preprocessor error: {0}")]
    Preprocess(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Bridge result type alias.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Faults raised inside host imports while the guest is running.
///
/// A faulting import records the fault in the host state and traps the
/// guest; the bridge reports the recorded fault in place of the trap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostFault {
    /// `puts` received bytes that are not valid UTF-8.
    #[error("invalid UTF-8 in guest text at [{address}, {address}+{len})")]
    Decode { address: u32, len: u32 },

    /// A guest reference points outside linear memory.
    #[error("guest reference [{address}, {address}+{len}) exceeds memory of {memory_size} bytes")]
    OutOfBounds {
        address: u32,
        len: u32,
        memory_size: usize,
    },

    /// The guest passed a memory reference but exports no memory.
    #[error("guest passed a memory reference but has no linear memory")]
    NoMemory,
}

impl wasmi::core::HostError for HostFault {}
