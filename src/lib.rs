#![warn(missing_docs)]

//! Succinct storage and incremental replay of tree sequences.
//!
//! A tree sequence records the genealogies along a
//! recombining genome as a set of coalescence records
//! ([``Edge``]s), each valid over a half-open interval of
//! loci.  Adjacent trees share most of their edges, so
//! storing the edges once is far smaller than storing one
//! tree per locus.
//!
//! This crate provides:
//!
//! 1. [``TreeSequence``], an immutable store built from the
//!    output of a coalescent simulation (see
//!    [``CoalescenceRecordSource``]) or loaded from disk.
//! 2. A checksummed, optionally compressed binary format.
//!    See [``TreeSequence::dump``] and [``TreeSequence::load``].
//! 3. [``TreeDiffIterator``], which visits the trees from left
//!    to right, reporting only the edges that leave and enter
//!    at each step.
//!
//! The iterator allocates from fixed-capacity pools
//! (see [``arena``] and [``ArenaCapacity``]) so that one
//! pass never grows its memory beyond the configured bound.
//!
//! # Logging
//!
//! Events are emitted with [`tracing`](https://docs.rs/tracing).
//! No subscriber is installed by this crate.

pub mod arena;
pub mod container;
mod diff_iterator;
mod error;
mod flags;
pub mod interval_index;
pub mod prelude;
mod simulation;
mod tables;
mod tree_sequence;

pub use diff_iterator::{IteratorState, StateDump, TreeDiffIterator};
pub use error::{Result, TreeSequenceError};
pub use flags::{ArenaCapacity, DiffIteratorFlags, DumpFlags};
pub use simulation::CoalescenceRecordSource;
pub use tables::{
    edges_sorted_by_left, sort_edges, validate_breakpoints, validate_edge, validate_edge_table,
    Edge, EdgeTable,
};
pub use tree_sequence::{TreeSequence, FORMAT_VERSION};
pub use treeseqrs_core::{NodeId, Position, Time};

/// Get the treeseqrs version number.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
