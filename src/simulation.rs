//! The interface through which a coalescent simulator
//! hands its output to a [``TreeSequence``](crate::TreeSequence).

use crate::tables::Edge;
use treeseqrs_core::Position;

/// Bulk access to the raw output of a coalescent simulation.
///
/// A [``TreeSequence``](crate::TreeSequence) calls each
/// `fetch_*` method exactly once, after sizing its buffers
/// from the corresponding count.  Records may be supplied
/// in any order.
pub trait CoalescenceRecordSource {
    /// Error reported by the simulator.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of sampled lineages.
    fn sample_size(&self) -> u32;

    /// Number of discrete loci along the genome.
    fn num_loci(&self) -> u32;

    /// Number of entries [`fetch_breakpoints`](Self::fetch_breakpoints) will produce.
    fn num_breakpoints(&self) -> usize;

    /// Number of records [`fetch_coalescence_records`](Self::fetch_coalescence_records) will produce.
    fn num_coalescence_records(&self) -> usize;

    /// Append the recombination breakpoints, in ascending order, to `buffer`.
    fn fetch_breakpoints(&self, buffer: &mut Vec<Position>) -> Result<(), Self::Error>;

    /// Append every coalescence record to `buffer`.
    fn fetch_coalescence_records(&self, buffer: &mut Vec<Edge>) -> Result<(), Self::Error>;
}
