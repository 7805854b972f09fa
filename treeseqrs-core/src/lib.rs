//! Core types for tree sequences: genomic loci,
//! node times, and node identifiers.

use thiserror::Error;

mod newtypes;
mod position;
pub mod prelude;
mod time;

pub use newtypes::NodeId;
pub use position::Position;
pub use time::Time;

/// Errors converting raw values into the
/// types defined in this crate.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// A value cannot be represented as a [`Position`].
    #[error("invalid position: {0:?}")]
    PositionError(i64),
    /// A value cannot be represented as a [`Time`].
    #[error("invalid time: {0:?}")]
    TimeError(f64),
    /// A value cannot be represented as a [`NodeId`].
    #[error("invalid node: {0:?}")]
    NodeIdError(i64),
}
