//! Error handling
use thiserror::Error;
use treeseqrs_core::Position;

/// Primary error type.
///
/// Some members of this enum implement ``From``
/// in order to redirect other error types.
#[derive(Error, Debug)]
pub enum TreeSequenceError {
    /// A bulk allocation could not be satisfied.
    #[error("Out of memory")]
    OutOfMemory,
    /// An [``ObjectArena``](crate::arena::ObjectArena) has no free slots left.
    #[error("Object pool exhausted")]
    PoolExhausted,
    /// An index accessor was given a value past the end.
    #[error("Index {index} out of bounds for length {len}")]
    OutOfBounds {
        /// The requested index
        index: usize,
        /// The length of the indexed sequence
        len: usize,
    },
    /// A persisted container is malformed.
    #[error("File format error: {0}")]
    FileFormat(String),
    /// The backing store could not be opened, read, or written.
    #[error("I/O error: {value}")]
    Io {
        /// The redirected error
        #[from]
        value: std::io::Error,
    },
    /// An unclassified failure while loading or dumping.
    #[error("{0}")]
    Generic(String),
    /// Breakpoints are not strictly increasing or exceed the number of loci.
    #[error("Breakpoints must be strictly increasing and at most num_loci")]
    InvalidBreakpoints,
    /// An edge's interval is empty, reversed, or extends past the genome.
    #[error("Invalid edge interval: [{left}, {right})")]
    InvalidEdge {
        /// Left end of the offending edge
        left: Position,
        /// Right end of the offending edge
        right: Position,
    },
    /// An edge's time is not finite.
    #[error("Invalid edge time")]
    InvalidTime,
    /// A tree changes at a position missing from the breakpoint table.
    #[error("Tree changes at {position}, which is not a breakpoint")]
    MisalignedBreakpoint {
        /// The position of the tree change
        position: Position,
    },
    /// A failure reported by a [``CoalescenceRecordSource``](crate::CoalescenceRecordSource).
    #[error("Record source error: {value}")]
    Source {
        /// The redirected error
        value: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A redirection of a [``treeseqrs_core::Error``].
    #[error("{value}")]
    Conversion {
        /// The redirected error
        #[from]
        value: treeseqrs_core::Error,
    },
}

/// Result type for tree sequence operations.
pub type Result<T> = std::result::Result<T, TreeSequenceError>;

impl From<std::collections::TryReserveError> for TreeSequenceError {
    fn from(_: std::collections::TryReserveError) -> Self {
        TreeSequenceError::OutOfMemory
    }
}
