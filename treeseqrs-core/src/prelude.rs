//! # Prelude
//!
//! ```
//! use treeseqrs_core::prelude::*;
//! let p = Position::from(10);
//! assert_eq!(p, 10);
//! ```

pub use crate::NodeId;
pub use crate::Position;
pub use crate::Time;
