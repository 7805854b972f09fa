use crate::error::{Result, TreeSequenceError};
use treeseqrs_core::{NodeId, Position, Time};

/// An Edge is a coalescence record.
///
/// An edge records that, over the half-open chunk of genome
/// `[left, right)`, the lineages `children` coalesce into
/// `parent` at `time`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    /// Left end
    pub left: Position,
    /// Right end
    pub right: Position,
    /// The node the children coalesce into
    pub parent: NodeId,
    /// The two coalescing nodes
    pub children: [NodeId; 2],
    /// Age of `parent`
    pub time: Time,
}

impl Edge {
    /// Create a new edge.
    ///
    /// No validation is performed; see [``validate_edge``].
    ///
    /// ```
    /// let e = treeseqrs::Edge::new(0, 10, 5, [2, 3], 1.0);
    /// assert_eq!(e.left, 0);
    /// assert_eq!(e.children[1], 3);
    /// ```
    pub fn new<L, R, P, C, T>(left: L, right: R, parent: P, children: [C; 2], time: T) -> Self
    where
        L: Into<Position>,
        R: Into<Position>,
        P: Into<NodeId>,
        C: Into<NodeId>,
        T: Into<Time>,
    {
        let [c0, c1] = children;
        Self {
            left: left.into(),
            right: right.into(),
            parent: parent.into(),
            children: [c0.into(), c1.into()],
            time: time.into(),
        }
    }

    /// Number of loci covered by this edge.
    pub fn span(&self) -> u32 {
        self.right.raw().saturating_sub(self.left.raw())
    }

    /// `true` if `position` lies within `[left, right)`.
    pub fn contains(&self, position: Position) -> bool {
        self.left <= position && position < self.right
    }
}

/// An edge table
pub type EdgeTable = Vec<Edge>;

/// Check a single edge against a genome of `num_loci` loci.
///
/// # Errors
///
/// * [``TreeSequenceError::InvalidEdge``] unless `left < right <= num_loci`.
/// * [``TreeSequenceError::InvalidTime``] if `time` is not finite.
pub fn validate_edge(edge: &Edge, num_loci: Position) -> Result<()> {
    if edge.left >= edge.right || edge.right > num_loci {
        return Err(TreeSequenceError::InvalidEdge {
            left: edge.left,
            right: edge.right,
        });
    }
    if !edge.time.is_finite() {
        return Err(TreeSequenceError::InvalidTime);
    }
    Ok(())
}

/// Check that `breakpoints` is strictly increasing and
/// contained in `[0, num_loci]`.
///
/// ```
/// use treeseqrs::validate_breakpoints;
/// use treeseqrs::Position;
/// let bp = [0, 5, 10].map(Position::from);
/// assert!(validate_breakpoints(&bp, 10.into()).is_ok());
/// let bp = [0, 5, 5].map(Position::from);
/// assert!(validate_breakpoints(&bp, 10.into()).is_err());
/// ```
pub fn validate_breakpoints(breakpoints: &[Position], num_loci: Position) -> Result<()> {
    if breakpoints.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TreeSequenceError::InvalidBreakpoints);
    }
    match breakpoints.last() {
        Some(last) if *last > num_loci => Err(TreeSequenceError::InvalidBreakpoints),
        _ => Ok(()),
    }
}

/// Validate every edge of an [``EdgeTable``].
pub fn validate_edge_table(edges: &[Edge], num_loci: Position) -> Result<()> {
    for e in edges {
        validate_edge(e, num_loci)?;
    }
    Ok(())
}

/// `true` if edges are grouped by non-decreasing `left`.
pub fn edges_sorted_by_left(edges: &[Edge]) -> bool {
    edges.windows(2).all(|w| w[0].left <= w[1].left)
}

/// Sort edges by `left`.
///
/// The sort is stable, so edges sharing a `left`
/// keep their input order.
pub fn sort_edges(edges: &mut [Edge]) {
    edges.sort_by_key(|e| e.left);
}
