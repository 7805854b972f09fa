use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::container::{Attribute, Container, DataType, Dataset, Element, Filters};
use crate::diff_iterator::TreeDiffIterator;
use crate::error::{Result, TreeSequenceError};
use crate::flags::{ArenaCapacity, DiffIteratorFlags, DumpFlags};
use crate::simulation::CoalescenceRecordSource;
use crate::tables::{
    edges_sorted_by_left, sort_edges, validate_breakpoints, validate_edge_table, Edge, EdgeTable,
};
use treeseqrs_core::{NodeId, Position, Time};

/// Version written to, and required of, persisted containers.
pub const FORMAT_VERSION: u32 = 1;

const FORMAT_VERSION_NAME: &str = "format_version";
const SAMPLE_SIZE_NAME: &str = "sample_size";
const NUM_LOCI_NAME: &str = "num_loci";

const BREAKPOINTS: &str = "breakpoints";
const EDGES_LEFT: &str = "edges.left";
const EDGES_RIGHT: &str = "edges.right";
const EDGES_PARENT: &str = "edges.parent";
const EDGES_CHILDREN: &str = "edges.children";
const EDGES_TIME: &str = "edges.time";

/// Shape and type of one persisted array.
struct FieldSpec {
    name: &'static str,
    data_type: DataType,
    rank: usize,
    // The first dimension must equal the number of edges.
    per_edge: bool,
    // Required extents of dimensions after the first.
    trailing: &'static [u64],
}

const FIELDS: [FieldSpec; 6] = [
    FieldSpec {
        name: BREAKPOINTS,
        data_type: DataType::U32,
        rank: 1,
        per_edge: false,
        trailing: &[],
    },
    FieldSpec {
        name: EDGES_LEFT,
        data_type: DataType::U32,
        rank: 1,
        per_edge: true,
        trailing: &[],
    },
    FieldSpec {
        name: EDGES_RIGHT,
        data_type: DataType::U32,
        rank: 1,
        per_edge: true,
        trailing: &[],
    },
    FieldSpec {
        name: EDGES_PARENT,
        data_type: DataType::U32,
        rank: 1,
        per_edge: true,
        trailing: &[],
    },
    FieldSpec {
        name: EDGES_CHILDREN,
        data_type: DataType::U32,
        rank: 2,
        per_edge: true,
        trailing: &[2],
    },
    FieldSpec {
        name: EDGES_TIME,
        data_type: DataType::F64,
        rank: 1,
        per_edge: true,
        trailing: &[],
    },
];

fn format_error<S: Into<String>>(msg: S) -> TreeSequenceError {
    TreeSequenceError::FileFormat(msg.into())
}

fn scalar_attribute(container: &Container, name: &str) -> Result<u32> {
    let a = container
        .attribute(name)
        .ok_or_else(|| format_error(format!("missing attribute {}", name)))?;
    if a.rank() != 1 || a.dims() != [1] {
        return Err(format_error(format!(
            "{}: expected a single value, found dimensions {:?}",
            name,
            a.dims()
        )));
    }
    Ok(a.values()[0])
}

fn checked_dataset<'c>(
    container: &'c Container,
    field: &FieldSpec,
    num_edges: u64,
) -> Result<&'c Dataset> {
    let d = container
        .dataset(field.name)
        .ok_or_else(|| format_error(format!("missing dataset {}", field.name)))?;
    if d.rank() != field.rank {
        return Err(format_error(format!(
            "{}: expected rank {}, found {}",
            field.name,
            field.rank,
            d.rank()
        )));
    }
    if d.data_type() != field.data_type {
        return Err(format_error(format!(
            "{}: expected {:?}, found {:?}",
            field.name,
            field.data_type,
            d.data_type()
        )));
    }
    if field.per_edge && d.dims()[0] != num_edges {
        return Err(format_error(format!(
            "{}: expected {} rows, found {}",
            field.name,
            num_edges,
            d.dims()[0]
        )));
    }
    if d.dims()[1..] != *field.trailing {
        return Err(format_error(format!(
            "{}: dimensions {:?} do not match {:?}",
            field.name,
            d.dims(),
            field.trailing
        )));
    }
    Ok(d)
}

fn decode_field<T: Element>(
    container: &Container,
    field: &FieldSpec,
    num_edges: u64,
) -> Result<Vec<T>> {
    checked_dataset(container, field, num_edges)?.decode::<T>()
}

/// An immutable, sorted set of coalescence records
/// together with the recombination breakpoints.
///
/// A `TreeSequence` is built once, from raw simulation
/// output or from a persisted container, and is never
/// modified afterwards.  Any number of
/// [``TreeDiffIterator``]s may borrow it at once.
///
/// # Example
///
/// ```
/// use treeseqrs::{DumpFlags, Edge, Position, TreeSequence};
///
/// let edges = vec![
///     Edge::new(5, 10, 7, [0, 1], 1.5),
///     Edge::new(0, 10, 5, [2, 3], 1.0),
///     Edge::new(0, 5, 6, [0, 1], 2.0),
/// ];
/// let bp = [0, 5, 10].map(Position::from).to_vec();
/// let ts = TreeSequence::new(4, 10, bp, edges).unwrap();
/// assert_eq!(ts.edge_count(), 3);
/// assert_eq!(ts.get_edge(2).unwrap().left, 5);
/// assert_eq!(ts.num_trees(), 2);
///
/// let mut buffer = vec![];
/// ts.dump_to_writer(&mut buffer, DumpFlags::ZLIB_COMPRESSION).unwrap();
/// let loaded = TreeSequence::load_from_reader(buffer.as_slice()).unwrap();
/// assert_eq!(loaded, ts);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TreeSequence {
    sample_size: u32,
    num_loci: Position,
    breakpoints: Vec<Position>,
    edges: EdgeTable,
}

impl TreeSequence {
    /// Build a tree sequence from unsorted edges.
    ///
    /// Edges are stably sorted by `left`.
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::InvalidBreakpoints``] unless
    ///   `breakpoints` is strictly increasing and at most `num_loci`.
    /// * [``TreeSequenceError::InvalidEdge``] unless every edge has
    ///   `left < right <= num_loci`.
    /// * [``TreeSequenceError::InvalidTime``] if a time is not finite.
    pub fn new(
        sample_size: u32,
        num_loci: u32,
        breakpoints: Vec<Position>,
        mut edges: EdgeTable,
    ) -> Result<Self> {
        let num_loci = Position::from(num_loci);
        validate_breakpoints(&breakpoints, num_loci)?;
        validate_edge_table(&edges, num_loci)?;
        sort_edges(&mut edges);
        debug!(
            sample_size,
            num_loci = num_loci.raw(),
            num_breakpoints = breakpoints.len(),
            num_edges = edges.len(),
            "created tree sequence"
        );
        Ok(Self {
            sample_size,
            num_loci,
            breakpoints,
            edges,
        })
    }

    /// Extract and sort the output of a simulation.
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::OutOfMemory``] if the buffers cannot be reserved.
    /// * [``TreeSequenceError::Source``] if `source` fails.
    /// * [``TreeSequenceError::Generic``] if `source` produces a different
    ///   number of items than it announced.
    /// * Any error of [``TreeSequence::new``].
    pub fn from_simulation<S: CoalescenceRecordSource>(source: &S) -> Result<Self> {
        let num_breakpoints = source.num_breakpoints();
        let num_records = source.num_coalescence_records();
        let mut breakpoints = Vec::new();
        breakpoints.try_reserve_exact(num_breakpoints)?;
        let mut edges = Vec::new();
        edges.try_reserve_exact(num_records)?;
        source
            .fetch_breakpoints(&mut breakpoints)
            .map_err(|e| TreeSequenceError::Source { value: Box::new(e) })?;
        source
            .fetch_coalescence_records(&mut edges)
            .map_err(|e| TreeSequenceError::Source { value: Box::new(e) })?;
        if breakpoints.len() != num_breakpoints {
            return Err(TreeSequenceError::Generic(format!(
                "expected {} breakpoints, fetched {}",
                num_breakpoints,
                breakpoints.len()
            )));
        }
        if edges.len() != num_records {
            return Err(TreeSequenceError::Generic(format!(
                "expected {} coalescence records, fetched {}",
                num_records,
                edges.len()
            )));
        }
        Self::new(source.sample_size(), source.num_loci(), breakpoints, edges)
    }

    /// Number of sampled lineages.
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Number of loci along the genome.
    pub fn num_loci(&self) -> Position {
        self.num_loci
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Alias for [``TreeSequence::edge_count``].
    pub fn num_edges(&self) -> usize {
        self.edge_count()
    }

    /// Number of breakpoints.
    pub fn breakpoint_count(&self) -> usize {
        self.breakpoints.len()
    }

    /// Alias for [``TreeSequence::breakpoint_count``].
    pub fn num_breakpoints(&self) -> usize {
        self.breakpoint_count()
    }

    /// Get the `index`-th edge in sorted order.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::OutOfBounds``] if `index >= edge_count()`.
    pub fn get_edge(&self, index: usize) -> Result<Edge> {
        self.edges
            .get(index)
            .copied()
            .ok_or(TreeSequenceError::OutOfBounds {
                index,
                len: self.edges.len(),
            })
    }

    /// The edges, sorted by `left`.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The breakpoints, in ascending order.
    pub fn breakpoints(&self) -> &[Position] {
        &self.breakpoints
    }

    /// Copy the breakpoints into the front of `buffer`.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::OutOfBounds``] if `buffer` is
    /// shorter than [``TreeSequence::breakpoint_count``].
    pub fn copy_breakpoints(&self, buffer: &mut [Position]) -> Result<()> {
        let n = self.breakpoints.len();
        match buffer.get_mut(..n) {
            Some(dst) => {
                dst.copy_from_slice(&self.breakpoints);
                Ok(())
            }
            None => Err(TreeSequenceError::OutOfBounds {
                index: n,
                len: buffer.len(),
            }),
        }
    }

    /// Number of steps taken by a [``TreeDiffIterator``]
    /// in tree-change mode.
    pub fn num_trees(&self) -> usize {
        match self.edges.first() {
            None => 0,
            Some(first) => {
                let changes = self
                    .edges
                    .windows(2)
                    .filter(|w| w[0].left != w[1].left)
                    .count();
                changes + 1 + usize::from(first.left > Position::ZERO)
            }
        }
    }

    /// Iterate over the differences between adjacent trees,
    /// with pools sized from the sample size.
    pub fn diff_iterator(&self, flags: DiffIteratorFlags) -> Result<TreeDiffIterator<'_>> {
        self.diff_iterator_with_capacity(flags, ArenaCapacity::from_sample_size(self.sample_size))
    }

    /// Iterate over the differences between adjacent trees,
    /// with explicitly sized pools.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::OutOfMemory``] if the pools cannot be
    /// reserved.
    pub fn diff_iterator_with_capacity(
        &self,
        flags: DiffIteratorFlags,
        capacity: ArenaCapacity,
    ) -> Result<TreeDiffIterator<'_>> {
        TreeDiffIterator::new(self, flags, capacity)
    }

    fn to_container(&self, flags: DumpFlags) -> Result<Container> {
        let filters = if flags.contains(DumpFlags::ZLIB_COMPRESSION) {
            Filters::SHUFFLE | Filters::DEFLATE
        } else {
            Filters::empty()
        };
        let n = self.edges.len() as u64;
        let mut c = Container::default();
        c.push_attribute(Attribute::scalar(FORMAT_VERSION_NAME, FORMAT_VERSION))?;
        c.push_attribute(Attribute::scalar(SAMPLE_SIZE_NAME, self.sample_size))?;
        c.push_attribute(Attribute::scalar(NUM_LOCI_NAME, self.num_loci.raw()))?;

        let breakpoints = self.breakpoints.iter().map(|p| p.raw()).collect::<Vec<_>>();
        c.push_dataset(Dataset::encode(
            BREAKPOINTS,
            vec![breakpoints.len() as u64],
            &breakpoints,
            filters,
        )?)?;
        let column = |f: fn(&Edge) -> u32| self.edges.iter().map(f).collect::<Vec<u32>>();
        c.push_dataset(Dataset::encode(EDGES_LEFT, vec![n], &column(|e| e.left.raw()), filters)?)?;
        c.push_dataset(Dataset::encode(EDGES_RIGHT, vec![n], &column(|e| e.right.raw()), filters)?)?;
        c.push_dataset(Dataset::encode(
            EDGES_PARENT,
            vec![n],
            &column(|e| e.parent.raw()),
            filters,
        )?)?;
        let children = self
            .edges
            .iter()
            .flat_map(|e| e.children.map(|c| c.raw()))
            .collect::<Vec<_>>();
        c.push_dataset(Dataset::encode(EDGES_CHILDREN, vec![n, 2], &children, filters)?)?;
        let time = self.edges.iter().map(|e| e.time.raw()).collect::<Vec<_>>();
        c.push_dataset(Dataset::encode(EDGES_TIME, vec![n], &time, filters)?)?;
        Ok(c)
    }

    fn from_container(c: &Container) -> Result<Self> {
        let version = scalar_attribute(c, FORMAT_VERSION_NAME)?;
        if version != FORMAT_VERSION {
            return Err(format_error(format!(
                "unsupported format version {}",
                version
            )));
        }
        let sample_size = scalar_attribute(c, SAMPLE_SIZE_NAME)?;
        let num_loci = Position::from(scalar_attribute(c, NUM_LOCI_NAME)?);

        let num_edges = match c.dataset(EDGES_LEFT).and_then(|d| d.dims().first()) {
            Some(n) => *n,
            None => return Err(format_error(format!("missing dataset {}", EDGES_LEFT))),
        };
        for field in FIELDS.iter() {
            checked_dataset(c, field, num_edges)?;
        }

        let breakpoints = decode_field::<u32>(c, &FIELDS[0], num_edges)?;
        let left = decode_field::<u32>(c, &FIELDS[1], num_edges)?;
        let right = decode_field::<u32>(c, &FIELDS[2], num_edges)?;
        let parent = decode_field::<u32>(c, &FIELDS[3], num_edges)?;
        let children = decode_field::<u32>(c, &FIELDS[4], num_edges)?;
        let time = decode_field::<f64>(c, &FIELDS[5], num_edges)?;

        let mut edges = Vec::new();
        edges.try_reserve_exact(left.len())?;
        for (i, pair) in children.chunks_exact(2).enumerate() {
            edges.push(Edge {
                left: Position::from(left[i]),
                right: Position::from(right[i]),
                parent: NodeId::from(parent[i]),
                children: [NodeId::from(pair[0]), NodeId::from(pair[1])],
                time: Time::from(time[i]),
            });
        }
        let breakpoints = breakpoints.into_iter().map(Position::from).collect::<Vec<_>>();

        validate_breakpoints(&breakpoints, num_loci).map_err(|e| format_error(e.to_string()))?;
        validate_edge_table(&edges, num_loci).map_err(|e| format_error(e.to_string()))?;
        if !edges_sorted_by_left(&edges) {
            return Err(format_error("edges are not sorted by left"));
        }
        Ok(Self {
            sample_size,
            num_loci,
            breakpoints,
            edges,
        })
    }

    /// Serialize to `writer`.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::Io``] if writing fails.
    pub fn dump_to_writer<W: Write>(&self, writer: W, flags: DumpFlags) -> Result<()> {
        self.to_container(flags)?.write_to(writer)
    }

    /// Write to the file at `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::Io``] if the file cannot be
    /// created or written.
    pub fn dump<P: AsRef<Path>>(&self, path: P, flags: DumpFlags) -> Result<()> {
        let path = path.as_ref();
        debug!(
            path = %path.display(),
            flags = flags.bits(),
            num_edges = self.edges.len(),
            "dumping tree sequence"
        );
        let mut writer = BufWriter::new(File::create(path)?);
        self.dump_to_writer(&mut writer, flags)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a tree sequence from `reader`.
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::FileFormat``] if the container is
    ///   malformed, fails a checksum, has arrays whose shapes
    ///   disagree, or holds an invalid tree sequence.
    /// * [``TreeSequenceError::Io``] if reading fails.
    pub fn load_from_reader<R: Read>(reader: R) -> Result<Self> {
        let container = Container::read_from(reader)?;
        Self::from_container(&container)
    }

    /// Read a tree sequence from the file at `path`.
    ///
    /// See [``TreeSequence::load_from_reader``] for the errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let result = File::open(path)
            .map_err(TreeSequenceError::from)
            .and_then(|f| Self::load_from_reader(BufReader::new(f)));
        match &result {
            Ok(ts) => debug!(
                path = %path.display(),
                num_edges = ts.edges.len(),
                num_breakpoints = ts.breakpoints.len(),
                "loaded tree sequence"
            ),
            Err(e) => warn!(path = %path.display(), error = %e, "rejected tree sequence file"),
        }
        result
    }
}
