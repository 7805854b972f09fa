
use proptest::prelude::*;
use stochastic_testing_tools::*;
use tempfile::tempdir;
use treeseqrs::container::{Container, Dataset, Filters};
use treeseqrs::prelude::*;

fn scenario() -> TreeSequence {
    let edges = vec![
        Edge::new(0, 10, 5, [2, 3], 1.0),
        Edge::new(0, 5, 6, [0, 1], 2.0),
        Edge::new(5, 10, 7, [0, 1], 1.5),
    ];
    TreeSequence::new(4, 10, [0, 5, 10].map(Position::from).to_vec(), edges).unwrap()
}

fn assert_file_format_error(result: Result<TreeSequence, TreeSequenceError>) {
    match result {
        Err(TreeSequenceError::FileFormat(_)) => (),
        Err(e) => panic!("expected a file format error, got {}", e),
        Ok(_) => panic!("expected a file format error"),
    }
}

#[test]
fn test_round_trip_on_disk() {
    let dir = tempdir().unwrap();
    let sim = simulate(101, 20, 10000, 200);
    let ts = TreeSequence::from_simulation(&sim).unwrap();
    for (name, flags) in [
        ("plain.tsq", DumpFlags::NONE),
        ("zlib.tsq", DumpFlags::ZLIB_COMPRESSION),
    ] {
        let path = dir.path().join(name);
        ts.dump(&path, flags).unwrap();
        let loaded = TreeSequence::load(&path).unwrap();
        assert_eq!(loaded.sample_size(), ts.sample_size());
        assert_eq!(loaded.num_loci(), ts.num_loci());
        assert_eq!(loaded.breakpoints(), ts.breakpoints());
        assert_eq!(loaded.edges(), ts.edges());
        for (a, b) in loaded.edges().iter().zip(ts.edges()) {
            assert_eq!(a.time.raw().to_bits(), b.time.raw().to_bits());
        }
    }
    let plain = std::fs::metadata(dir.path().join("plain.tsq")).unwrap().len();
    let zlib = std::fs::metadata(dir.path().join("zlib.tsq")).unwrap().len();
    assert!(zlib < plain);
}

#[test]
fn test_dump_overwrites() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ts.tsq");
    let big = TreeSequence::from_simulation(&simulate(3, 10, 1000, 50)).unwrap();
    big.dump(&path, DumpFlags::NONE).unwrap();
    let small = scenario();
    small.dump(&path, DumpFlags::NONE).unwrap();
    assert_eq!(TreeSequence::load(&path).unwrap(), small);
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    match TreeSequence::load(dir.path().join("nope.tsq")) {
        Err(TreeSequenceError::Io { value }) => {
            assert_eq!(value.kind(), std::io::ErrorKind::NotFound)
        }
        _ => panic!("expected an I/O error"),
    }
}

#[test]
fn test_dump_to_missing_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("ts.tsq");
    assert!(matches!(
        scenario().dump(path, DumpFlags::NONE),
        Err(TreeSequenceError::Io { .. })
    ));
}

#[test]
fn test_corrupted_payload() {
    let dir = tempdir().unwrap();
    let ts = scenario();
    for flags in [DumpFlags::NONE, DumpFlags::ZLIB_COMPRESSION] {
        let mut bytes = vec![];
        ts.dump_to_writer(&mut bytes, flags).unwrap();
        // The file ends with the payload of the last dataset.
        let last = bytes.len() - 1;
        bytes[last] ^= 0x5a;
        let path = dir.path().join("corrupt.tsq");
        std::fs::write(&path, &bytes).unwrap();
        assert_file_format_error(TreeSequence::load(&path));
    }
}

#[test]
fn test_truncated_file() {
    let ts = scenario();
    let mut bytes = vec![];
    ts.dump_to_writer(&mut bytes, DumpFlags::ZLIB_COMPRESSION)
        .unwrap();
    for len in [0, 7, 8, 30, bytes.len() / 2, bytes.len() - 1] {
        assert_file_format_error(TreeSequence::load_from_reader(&bytes[..len]));
    }
}

#[test]
fn test_not_a_container() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("text.tsq");
    std::fs::write(&path, "sample_size=4\nnum_loci=10\n").unwrap();
    assert_file_format_error(TreeSequence::load(&path));
}

// Copy `original`, handing each dataset to `edit`.
fn rewrite<F: Fn(&Dataset) -> Dataset>(original: &Container, edit: F) -> Vec<u8> {
    let mut c = Container::default();
    for a in original.attributes() {
        c.push_attribute(a.clone()).unwrap();
    }
    for d in original.datasets() {
        c.push_dataset(edit(d)).unwrap();
    }
    let mut bytes = vec![];
    c.write_to(&mut bytes).unwrap();
    bytes
}

fn container_of(ts: &TreeSequence, flags: DumpFlags) -> Container {
    let mut bytes = vec![];
    ts.dump_to_writer(&mut bytes, flags).unwrap();
    Container::read_from(bytes.as_slice()).unwrap()
}

#[test]
fn test_children_with_wrong_length() {
    let ts = scenario();
    for flags in [DumpFlags::NONE, DumpFlags::ZLIB_COMPRESSION] {
        let original = container_of(&ts, flags);
        let bytes = rewrite(&original, |d| {
            if d.name() == "edges.children" {
                Dataset::encode("edges.children", vec![4, 2], &[0_u32; 8], d.filters()).unwrap()
            } else {
                d.clone()
            }
        });
        assert_file_format_error(TreeSequence::load_from_reader(bytes.as_slice()));
    }
}

#[test]
fn test_per_edge_arrays_must_agree() {
    let ts = scenario();
    let original = container_of(&ts, DumpFlags::NONE);
    for name in ["edges.right", "edges.parent", "edges.time"] {
        let bytes = rewrite(&original, |d| {
            if d.name() != name {
                d.clone()
            } else if name == "edges.time" {
                Dataset::encode(name, vec![2], &[1.0_f64, 2.0], Filters::empty()).unwrap()
            } else {
                Dataset::encode(name, vec![2], &[10_u32, 10], Filters::empty()).unwrap()
            }
        });
        assert_file_format_error(TreeSequence::load_from_reader(bytes.as_slice()));
    }
}

#[test]
fn test_left_defines_the_edge_count() {
    let ts = scenario();
    let original = container_of(&ts, DumpFlags::NONE);
    let bytes = rewrite(&original, |d| {
        if d.name() == "edges.left" {
            Dataset::encode("edges.left", vec![2], &[0_u32, 0], Filters::empty()).unwrap()
        } else {
            d.clone()
        }
    });
    assert_file_format_error(TreeSequence::load_from_reader(bytes.as_slice()));
}

#[test]
fn test_stored_shapes() {
    let ts = scenario();
    let c = container_of(&ts, DumpFlags::ZLIB_COMPRESSION);
    assert_eq!(c.attribute("format_version").unwrap().values(), &[FORMAT_VERSION]);
    assert_eq!(c.attribute("sample_size").unwrap().values(), &[4]);
    assert_eq!(c.attribute("num_loci").unwrap().values(), &[10]);
    assert_eq!(c.dataset("breakpoints").unwrap().dims(), &[3]);
    assert_eq!(c.dataset("edges.children").unwrap().dims(), &[3, 2]);
    assert_eq!(c.dataset("edges.time").unwrap().dims(), &[3]);
    for d in c.datasets() {
        assert_eq!(d.filters(), Filters::SHUFFLE | Filters::DEFLATE);
    }
    let c = container_of(&ts, DumpFlags::NONE);
    for d in c.datasets() {
        assert!(d.filters().is_empty());
    }
}

fn arb_tree_sequence() -> impl Strategy<Value = TreeSequence> {
    (1..1000_u32)
        .prop_flat_map(|num_loci| {
            let edge = (0..num_loci, 1..=num_loci, 0..100_u32, 0..100_u32, 0..100_u32, -1e6..1e6)
                .prop_map(|(a, b, p, c0, c1, t)| {
                    let (left, right) = if a < b { (a, b) } else { (b - 1, b) };
                    Edge::new(left, right, p, [c0, c1], t)
                });
            (
                Just(num_loci),
                proptest::collection::btree_set(0..=num_loci, 0..20),
                proptest::collection::vec(edge, 0..100),
            )
        })
        .prop_map(|(num_loci, breakpoints, edges)| {
            let breakpoints = breakpoints.into_iter().map(Position::from).collect();
            TreeSequence::new(10, num_loci, breakpoints, edges).unwrap()
        })
}

proptest! {
    #[test]
    fn test_round_trip(ts in arb_tree_sequence(), compress in any::<bool>()) {
        let flags = if compress {
            DumpFlags::ZLIB_COMPRESSION
        } else {
            DumpFlags::NONE
        };
        let mut bytes = vec![];
        ts.dump_to_writer(&mut bytes, flags).unwrap();
        let loaded = TreeSequence::load_from_reader(bytes.as_slice()).unwrap();
        prop_assert_eq!(loaded, ts);
    }
}
