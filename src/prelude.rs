//! # Prelude
//!
//! Contains definitions that are useful to
//! have global
//!
//! ## Examples
//!
//! ```
//! use treeseqrs::prelude::*;
//! ```

pub use crate::flags::*;
pub use crate::simulation::*;
pub use crate::tables::*;
pub use crate::diff_iterator::*;
pub use crate::tree_sequence::*;
pub use crate::error::TreeSequenceError;
pub use treeseqrs_core::prelude::*;
