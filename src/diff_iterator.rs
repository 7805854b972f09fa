//! Incremental replay of the trees of a [``TreeSequence``].
//!
//! A [``TreeDiffIterator``] walks the sorted edges once.  On
//! each step it reports the edges leaving the genealogy, the
//! edges entering it, and the number of loci covered by the
//! resulting tree.  Applying those differences in order
//! rebuilds every local tree without ever recomputing one
//! from scratch.
//!
//! Edges that are in the current tree are kept in an
//! [``IntervalIndex``] keyed by their right end, so that the
//! edges leaving at a position are found with one lookup.

use std::fmt;

use streaming_iterator::StreamingIterator;
use tracing::trace;

use crate::arena::{ArenaList, ListArena};
use crate::error::{Result, TreeSequenceError};
use crate::flags::{ArenaCapacity, DiffIteratorFlags};
use crate::interval_index::IntervalIndex;
use crate::tables::Edge;
use crate::tree_sequence::TreeSequence;
use treeseqrs_core::Position;

/// Life cycle of a [``TreeDiffIterator``].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IteratorState {
    /// No step has been taken.
    NotStarted,
    /// The views describe the current tree.
    Active,
    /// All trees have been visited, or a step failed.
    Exhausted,
}

/// Iterate over the differences between adjacent trees.
///
/// The iterator is a [``StreamingIterator``]: each item is the
/// iterator itself, whose views describe the latest step.
/// The views are valid until the next call to `advance`.
///
/// # Example
///
/// ```
/// use streaming_iterator::StreamingIterator;
/// use treeseqrs::prelude::*;
///
/// let edges = vec![
///     Edge::new(0, 10, 5, [2, 3], 1.0),
///     Edge::new(0, 5, 6, [0, 1], 2.0),
///     Edge::new(5, 10, 7, [0, 1], 1.5),
/// ];
/// let bp = [0, 5, 10].map(Position::from).to_vec();
/// let ts = TreeSequence::new(4, 10, bp, edges).unwrap();
///
/// let mut diffs = ts.diff_iterator(DiffIteratorFlags::default()).unwrap();
/// let mut lengths = vec![];
/// while let Some(step) = diffs.next() {
///     lengths.push((step.interval_length(), step.edges_out().count(), step.edges_in().count()));
/// }
/// assert_eq!(lengths, vec![(5, 0, 2), (5, 1, 1)]);
/// assert!(diffs.error().is_none());
/// ```
pub struct TreeDiffIterator<'ts> {
    treeseq: &'ts TreeSequence,
    flags: DiffIteratorFlags,
    edge_pool: ListArena<Edge>,
    index: IntervalIndex,
    edges_in: ArenaList<Edge>,
    // Position of the last tree change.  Buckets keyed at
    // or below it have been reported as leaving.
    reported: Option<Position>,
    // Left end of the next tree change.
    current_left: Position,
    cursor: usize,
    changes_exhausted: bool,
    // Set when the views show a tree change.
    has_change: bool,
    breakpoint_index: usize,
    left: Position,
    right: Position,
    state: IteratorState,
    error: Option<TreeSequenceError>,
}

impl<'ts> TreeDiffIterator<'ts> {
    pub(crate) fn new(
        treeseq: &'ts TreeSequence,
        flags: DiffIteratorFlags,
        capacity: ArenaCapacity,
    ) -> Result<Self> {
        Ok(Self {
            treeseq,
            flags,
            edge_pool: ListArena::new(capacity.edges)?,
            index: IntervalIndex::new(capacity.buckets)?,
            edges_in: ArenaList::new(),
            reported: None,
            current_left: Position::ZERO,
            cursor: 0,
            changes_exhausted: treeseq.edges().is_empty(),
            has_change: false,
            breakpoint_index: 0,
            left: Position::ZERO,
            right: Position::ZERO,
            state: IteratorState::NotStarted,
            error: None,
        })
    }

    // Apply the next tree change.  Returns false once
    // every edge has been consumed.
    fn step_tree_change(&mut self) -> Result<bool> {
        if self.changes_exhausted {
            return Ok(false);
        }
        let treeseq = self.treeseq;
        let edges = treeseq.edges();
        let x = self.current_left;

        self.edges_in.release_all(&mut self.edge_pool);
        if let Some(previous) = self.reported {
            while let Some(key) = self.index.first_key().filter(|k| *k <= previous) {
                self.index.remove(key, &mut self.edge_pool);
            }
        }
        // What is left at or below x ended in (previous, x].
        self.reported = Some(x);

        while let Some(edge) = edges.get(self.cursor) {
            if edge.left != x {
                break;
            }
            self.edges_in.push_back(&mut self.edge_pool, *edge)?;
            self.index.insert(edge.right, *edge, &mut self.edge_pool)?;
            self.cursor += 1;
        }
        let end = match edges.get(self.cursor) {
            Some(next) => next.left,
            None => {
                self.changes_exhausted = true;
                // The last tree ends at the largest active right end.
                self.index.last_key().unwrap_or(x)
            }
        };
        if end <= x {
            return Err(TreeSequenceError::Generic(format!(
                "tree at {} has no extent",
                x
            )));
        }
        self.left = x;
        self.right = end;
        self.current_left = end;
        self.has_change = true;
        trace!(
            left = x.raw(),
            right = end.raw(),
            edges_out = self.edges_out().count(),
            edges_in = self.edges_in.len(),
            "tree change"
        );
        Ok(true)
    }

    fn step_breakpoint(&mut self) -> Result<bool> {
        let treeseq = self.treeseq;
        let breakpoints = treeseq.breakpoints();
        let i = self.breakpoint_index;
        let (a, b) = match (breakpoints.get(i), breakpoints.get(i + 1)) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return Ok(false),
        };
        let pending = if self.changes_exhausted {
            None
        } else {
            Some(self.current_left)
        };
        match pending {
            Some(x) if x == a => {
                self.step_tree_change()?;
            }
            Some(x) if x < b => {
                return Err(TreeSequenceError::MisalignedBreakpoint { position: x });
            }
            _ => {
                self.edges_in.release_all(&mut self.edge_pool);
                self.has_change = false;
            }
        }
        self.left = a;
        self.right = b;
        self.breakpoint_index += 1;
        trace!(
            left = a.raw(),
            right = b.raw(),
            tree_change = self.has_change,
            "breakpoint"
        );
        Ok(true)
    }

    fn finish(&mut self) {
        self.edges_in.release_all(&mut self.edge_pool);
        self.index.clear(&mut self.edge_pool);
        self.reported = None;
        self.has_change = false;
        self.state = IteratorState::Exhausted;
    }

    /// Move to the next tree.
    ///
    /// Returns `Ok(false)` when there are no more trees.  Once
    /// that happens, or once a step fails, every arena slot
    /// has been released and later calls return `Ok(false)`.
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::PoolExhausted``] if the edges in the
    ///   current tree do not fit the configured [``ArenaCapacity``].
    /// * [``TreeSequenceError::MisalignedBreakpoint``] if, in
    ///   [``DiffIteratorFlags::ALL_BREAKPOINTS``] mode, the tree
    ///   changes at a position missing from the breakpoint table.
    pub fn advance_tree(&mut self) -> Result<bool> {
        if self.state == IteratorState::Exhausted {
            return Ok(false);
        }
        let stepped = if self.flags.contains(DiffIteratorFlags::ALL_BREAKPOINTS) {
            self.step_breakpoint()
        } else {
            self.step_tree_change()
        };
        match stepped {
            Ok(true) => {
                self.state = IteratorState::Active;
                Ok(true)
            }
            Ok(false) => {
                self.finish();
                Ok(false)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    /// The current [``IteratorState``].
    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// The error that stopped iteration, if any.
    pub fn error(&self) -> Option<&TreeSequenceError> {
        self.error.as_ref()
    }

    /// Number of loci covered by the current tree.
    pub fn interval_length(&self) -> u32 {
        self.right.raw() - self.left.raw()
    }

    /// Left end of the current tree.
    pub fn left(&self) -> Position {
        self.left
    }

    /// Right end of the current tree.
    pub fn right(&self) -> Position {
        self.right
    }

    /// Edges removed to obtain the current tree.
    ///
    /// These are the edges whose `right` lies after the
    /// previous tree change and at or before the current
    /// `left`.  For records that only end where another
    /// record starts, `right` equals the current `left`.
    pub fn edges_out(&self) -> impl Iterator<Item = &Edge> + '_ {
        let left = self.left;
        let changed = self.has_change;
        self.index
            .iter()
            .take_while(move |(key, _)| changed && *key <= left)
            .flat_map(move |(_, b)| b.iter(&self.edge_pool))
    }

    /// Edges added to obtain the current tree.
    pub fn edges_in(&self) -> impl Iterator<Item = &Edge> + '_ {
        let list = if self.has_change {
            Some(&self.edges_in)
        } else {
            None
        };
        list.into_iter().flat_map(move |l| l.iter(&self.edge_pool))
    }

    /// Every edge of the current tree.
    ///
    /// These are exactly the edges whose interval contains
    /// [``TreeDiffIterator::left``].
    pub fn active_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        let left = self.left;
        let live = self.state == IteratorState::Active;
        self.index
            .iter()
            .filter(move |(key, _)| live && *key > left)
            .flat_map(move |(_, b)| b.iter(&self.edge_pool))
    }

    /// Number of edge slots in use.
    pub fn edge_slots_in_use(&self) -> usize {
        self.edge_pool.len()
    }

    /// Number of index buckets in use.
    pub fn buckets_in_use(&self) -> usize {
        self.index.len()
    }

    /// A printable snapshot of the internal state.
    pub fn dump_state(&self) -> StateDump<'_, 'ts> {
        StateDump(self)
    }
}

impl<'ts> StreamingIterator for TreeDiffIterator<'ts> {
    type Item = TreeDiffIterator<'ts>;

    fn advance(&mut self) {
        if let Err(e) = self.advance_tree() {
            self.error = Some(e);
        }
    }

    fn get(&self) -> Option<&Self::Item> {
        match self.state {
            IteratorState::Active => Some(self),
            _ => None,
        }
    }
}

/// Returned by [``TreeDiffIterator::dump_state``].
pub struct StateDump<'a, 'ts>(&'a TreeDiffIterator<'ts>);

impl fmt::Display for StateDump<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let it = self.0;
        let show = |f: &mut fmt::Formatter<'_>, e: &Edge| {
            writeln!(
                f,
                "\t({}, {}) {} -> {} {} @ {}",
                e.left, e.right, e.parent, e.children[0], e.children[1], e.time
            )
        };
        writeln!(f, "tree_diff_iterator state")?;
        writeln!(f, "flags = {:#x}", it.flags.bits())?;
        writeln!(f, "state = {:?}", it.state)?;
        writeln!(f, "interval = [{}, {})", it.left, it.right)?;
        writeln!(f, "current_left = {}", it.current_left)?;
        writeln!(
            f,
            "cursor = {} / {}",
            it.cursor,
            it.treeseq.edges().len()
        )?;
        writeln!(
            f,
            "breakpoint = {} / {}",
            it.breakpoint_index,
            it.treeseq.breakpoints().len()
        )?;
        writeln!(f, "edges_in:")?;
        for e in it.edges_in.iter(&it.edge_pool) {
            show(f, e)?;
        }
        writeln!(f, "index:")?;
        for (key, bucket) in it.index.iter() {
            writeln!(f, "{}:", key)?;
            for e in bucket.iter(&it.edge_pool) {
                show(f, e)?;
            }
        }
        writeln!(
            f,
            "edge slots: {} / {}",
            it.edge_pool.len(),
            it.edge_pool.capacity()
        )?;
        writeln!(
            f,
            "buckets: {} / {}",
            it.index.len(),
            it.index.capacity()
        )
    }
}
