use bitflags::bitflags;

bitflags! {
    /// Modifies behavior of [``TreeSequence::dump``](crate::TreeSequence::dump).
    ///
    /// ```
    /// let f = treeseqrs::DumpFlags::default();
    /// assert!(!f.contains(treeseqrs::DumpFlags::ZLIB_COMPRESSION));
    /// ```
    #[derive(Default)]
    pub struct DumpFlags: u32 {
        /// Default
        const NONE = 0;
        /// Byte-shuffle, then deflate at the best compression level,
        /// every array.
        const ZLIB_COMPRESSION = 1 << 0;
    }
}

bitflags! {
    /// Modify the behavior of [``TreeSequence::diff_iterator``](crate::TreeSequence::diff_iterator).
    #[derive(Default)]
    pub struct DiffIteratorFlags: u32 {
        /// Default: one step per tree change.
        const NONE = 0;
        /// One step per entry of the breakpoint table,
        /// including loci where the tree does not change.
        const ALL_BREAKPOINTS = 1 << 0;
    }
}

/// Slot counts for the pools used by a
/// [``TreeDiffIterator``](crate::TreeDiffIterator).
///
/// The defaults are an empirical upper bound
/// taken from the number of samples: `3n` edge
/// slots (edges entering the current tree plus
/// every edge in the interval index) and `n`
/// index buckets.
///
/// ```
/// let c = treeseqrs::ArenaCapacity::from_sample_size(4);
/// assert_eq!(c.edges, 12);
/// assert_eq!(c.buckets, 4);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArenaCapacity {
    /// Slots for edge list nodes.
    pub edges: usize,
    /// Slots for interval index buckets.
    pub buckets: usize,
}

impl ArenaCapacity {
    /// The default sizing for `sample_size` samples.
    pub fn from_sample_size(sample_size: u32) -> Self {
        let n = sample_size as usize;
        Self {
            edges: 3 * n,
            buckets: n,
        }
    }

    /// Override the number of edge slots.
    pub fn with_edges(self, edges: usize) -> Self {
        Self { edges, ..self }
    }

    /// Override the number of bucket slots.
    pub fn with_buckets(self, buckets: usize) -> Self {
        Self { buckets, ..self }
    }
}
