//! Structured error type for the engine.
//!
//! Every fatal condition named in the design (precision exhaustion,
//! integer-part overflow, arena exhaustion, malformed I/O, out-of-range
//! configuration, capacity caps in the periodicity analyzer) has its own
//! variant so callers can decide recoverability instead of matching on
//! strings.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while configuring or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A number-type multiply/square discarded a cross-term that did not
    /// round to zero above the 2⁻⁹⁶ limb.
    #[error("precision exhausted in {operation}: cross-term survived above 2^-96")]
    PrecisionExhausted { operation: &'static str },

    /// An integer part exceeded 2³²−1, or a screen/grid index exceeded
    /// i32/i64 range.
    #[error("overflow in {context}: value {value} out of range")]
    Overflow { context: &'static str, value: i64 },

    /// A bump allocator reached its fixed capacity.
    #[error("arena exhausted: {name} ({used} / {capacity} bytes)")]
    ArenaExhausted {
        name: &'static str,
        used: usize,
        capacity: usize,
    },

    /// I/O failure reading or writing raw state, tovisit sidecars, or
    /// bitmap output.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw-state or tovisit file exists but its header is inconsistent
    /// with the current run (unexpected width, wrong tile count, ...).
    #[error("malformed file {path}: {reason}")]
    MalformedFile { path: PathBuf, reason: String },

    /// The feasibility table reports insufficient precision for the
    /// requested (polynomial, range, refinement, number-type) combination.
    /// Recoverable: the caller should warn and proceed.
    #[error("configuration out of range: {reason}")]
    ConfigOutOfRange { reason: String },

    /// Too many cycles, Fatou components, or periodic-point regions.
    #[error("capacity cap exceeded in periodicity analyzer: {what} (limit {limit})")]
    CapacityCap { what: &'static str, limit: usize },

    /// Malformed CLI token stream.
    #[error("invalid configuration token {token:?}: {reason}")]
    InvalidToken { token: String, reason: String },

    /// A propagation or analysis invariant was violated — e.g. an orbit
    /// image that should land inside the working square or the interior
    /// set landed outside it. Always a bug, never a user-facing
    /// condition; fatal.
    #[error("inconsistent state in {context}: {detail}")]
    InconsistentState { context: &'static str, detail: String },
}

impl EngineError {
    /// True for conditions the caller may recover from by warning and
    /// continuing (missing input file, out-of-range feasibility table).
    /// Every other variant is fatal and must map to exit code 99.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::ConfigOutOfRange { .. })
    }

    /// The process exit code mandated for this error: 0 if recoverable,
    /// 99 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_recoverable() {
            0
        } else {
            99
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
