
use std::collections::BTreeSet;

use proptest::prelude::*;
use stochastic_testing_tools::*;
use streaming_iterator::StreamingIterator;
use treeseqrs::prelude::*;

fn scenario() -> TreeSequence {
    let edges = vec![
        Edge::new(0, 10, 5, [2, 3], 1.0),
        Edge::new(0, 5, 6, [0, 1], 2.0),
        Edge::new(5, 10, 7, [0, 1], 1.5),
    ];
    TreeSequence::new(4, 10, [0, 5, 10].map(Position::from).to_vec(), edges).unwrap()
}

fn sorted_keys<'a, I: Iterator<Item = &'a Edge>>(edges: I) -> Vec<(u32, u32, u32, u32, u32)> {
    let mut rv = edges.map(edge_key).collect::<Vec<_>>();
    rv.sort_unstable();
    rv
}

#[test]
fn test_scenario_tree_change_mode() {
    let ts = scenario();
    let mut it = ts.diff_iterator(DiffIteratorFlags::default()).unwrap();

    let step = it.next().unwrap();
    assert_eq!(step.interval_length(), 5);
    assert!(step.edges_out().next().is_none());
    assert_eq!(
        sorted_keys(step.edges_in()),
        vec![(0, 5, 6, 0, 1), (0, 10, 5, 2, 3)]
    );

    let step = it.next().unwrap();
    assert_eq!(step.interval_length(), 5);
    assert_eq!(sorted_keys(step.edges_out()), vec![(0, 5, 6, 0, 1)]);
    assert_eq!(sorted_keys(step.edges_in()), vec![(5, 10, 7, 0, 1)]);

    assert!(it.next().is_none());
    assert_eq!(it.state(), IteratorState::Exhausted);
    assert!(it.error().is_none());
}

#[test]
fn test_scenario_all_breakpoints_mode() {
    let ts = scenario();
    let mut it = ts
        .diff_iterator(DiffIteratorFlags::ALL_BREAKPOINTS)
        .unwrap();
    let mut lengths = vec![];
    while let Some(step) = it.next() {
        lengths.push(step.interval_length());
    }
    assert_eq!(lengths, vec![5, 5]);
}

#[test]
fn test_independent_iterators() {
    let ts = scenario();
    let mut a = ts.diff_iterator(DiffIteratorFlags::default()).unwrap();
    let mut b = ts.diff_iterator(DiffIteratorFlags::default()).unwrap();
    a.advance();
    a.advance();
    b.advance();
    assert_eq!(a.get().unwrap().left(), 5);
    assert_eq!(b.get().unwrap().left(), 0);
}

#[test]
fn test_iterators_across_threads() {
    let ts = std::sync::Arc::new(scenario());
    let handles = (0..4)
        .map(|_| {
            let ts = ts.clone();
            std::thread::spawn(move || {
                let mut it = ts.diff_iterator(DiffIteratorFlags::default()).unwrap();
                let mut total = 0;
                while let Some(step) = it.next() {
                    total += step.interval_length();
                }
                total
            })
        })
        .collect::<Vec<_>>();
    for h in handles {
        assert_eq!(h.join().unwrap(), 10);
    }
}

// Applies every step's differences in order, checking that the
// edges applied so far are exactly those covering the current
// position.  Returns the summed interval lengths and the peak
// slot usage.
fn replay(ts: &TreeSequence, flags: DiffIteratorFlags, capacity: ArenaCapacity) -> (u64, usize, usize) {
    let mut it = ts.diff_iterator_with_capacity(flags, capacity).unwrap();
    let mut live = BTreeSet::new();
    let mut total = 0_u64;
    let mut peak_edges = 0;
    let mut peak_buckets = 0;
    let mut previous_right = None;
    while let Some(step) = it.next() {
        if let Some(r) = previous_right {
            assert_eq!(step.left(), r);
        }
        previous_right = Some(step.right());
        for e in step.edges_out() {
            assert!(e.right <= step.left());
            assert!(live.remove(&edge_key(e)));
        }
        for e in step.edges_in() {
            assert_eq!(e.left, step.left());
            assert!(live.insert(edge_key(e)));
        }
        let expected = edges_covering(ts.edges(), step.left());
        assert_eq!(live.iter().copied().collect::<Vec<_>>(), expected);
        assert_eq!(sorted_keys(step.active_edges()), expected);
        total += step.interval_length() as u64;
        peak_edges = peak_edges.max(step.edge_slots_in_use());
        peak_buckets = peak_buckets.max(step.buckets_in_use());
    }
    assert!(it.error().is_none(), "{:?}", it.error());
    assert_eq!(it.edge_slots_in_use(), 0);
    assert_eq!(it.buckets_in_use(), 0);
    (total, peak_edges, peak_buckets)
}

#[test]
fn test_default_capacity_under_stress() {
    for seed in 0..50 {
        for &n in &[2_u32, 3, 5, 10, 33, 64] {
            let sim = simulate(seed * 1000 + n as u64, n, 500, 60);
            let ts = TreeSequence::from_simulation(&sim).unwrap();
            let capacity = ArenaCapacity::from_sample_size(n);
            for flags in [DiffIteratorFlags::NONE, DiffIteratorFlags::ALL_BREAKPOINTS] {
                let (total, edges, buckets) = replay(&ts, flags, capacity);
                assert_eq!(total, 500);
                assert!(edges <= capacity.edges);
                assert!(buckets <= capacity.buckets);
            }
        }
    }
}

#[test]
fn test_step_counts() {
    let sim = simulate(42, 8, 1000, 100);
    let ts = TreeSequence::from_simulation(&sim).unwrap();
    let mut it = ts.diff_iterator(DiffIteratorFlags::NONE).unwrap();
    let mut steps = 0;
    while it.advance_tree().unwrap() {
        steps += 1;
    }
    assert_eq!(steps, ts.num_trees());

    let mut it = ts
        .diff_iterator(DiffIteratorFlags::ALL_BREAKPOINTS)
        .unwrap();
    let mut steps = 0;
    let mut unchanged = 0;
    while it.advance_tree().unwrap() {
        steps += 1;
        if it.edges_in().next().is_none() {
            unchanged += 1;
            assert!(it.edges_out().next().is_none());
            assert!(it.interval_length() > 0);
        }
    }
    assert_eq!(steps, ts.breakpoint_count() - 1);
    assert_eq!(steps - unchanged, ts.num_trees());
}

#[test]
fn test_undersized_pool_fails_cleanly() {
    let sim = simulate(7, 16, 200, 20);
    let ts = TreeSequence::from_simulation(&sim).unwrap();
    let capacity = ArenaCapacity::from_sample_size(16).with_edges(16);
    let mut it = ts
        .diff_iterator_with_capacity(DiffIteratorFlags::NONE, capacity)
        .unwrap();
    match it.advance_tree() {
        Err(TreeSequenceError::PoolExhausted) => (),
        other => panic!("expected PoolExhausted, got {:?}", other),
    }
    assert_eq!(it.state(), IteratorState::Exhausted);
    assert_eq!(it.edge_slots_in_use(), 0);
    assert!(!it.advance_tree().unwrap());
}

proptest! {
    #[test]
    fn test_coverage_and_conservation(seed in any::<u64>(),
                                      n in 2..40_u32,
                                      num_loci in 1..2000_u32,
                                      segments in 1..50_usize) {
        let segments = segments.min(num_loci as usize);
        let sim = simulate(seed, n, num_loci, segments);
        let ts = TreeSequence::from_simulation(&sim).unwrap();
        let capacity = ArenaCapacity::from_sample_size(n);
        for flags in [DiffIteratorFlags::NONE, DiffIteratorFlags::ALL_BREAKPOINTS] {
            let (total, _, _) = replay(&ts, flags, capacity);
            prop_assert_eq!(total, num_loci as u64);
        }
    }

    #[test]
    fn test_differences_of_arbitrary_edges(raw in proptest::collection::vec((0..100_u32, 1..=100_u32), 1..100)) {
        // Parents are unique so that every edge is distinct.
        let edges = raw
            .iter()
            .enumerate()
            .map(|(i, &(a, b))| {
                let (left, right) = if a < b { (a, b) } else { (b - 1, b) };
                Edge::new(left, right, i as u32, [0, 1], 1.0)
            })
            .collect::<Vec<_>>();
        let extent = edges.iter().map(|e| e.right.raw()).max().unwrap_or(0);
        let ts = TreeSequence::new(2, 100, vec![], edges.clone()).unwrap();
        let capacity = ArenaCapacity::from_sample_size(2)
            .with_edges(2 * edges.len())
            .with_buckets(edges.len());
        let (total, _, _) = replay(&ts, DiffIteratorFlags::NONE, capacity);
        prop_assert_eq!(total, extent as u64);

        // Same edges, reversed input order.
        let mut reversed = edges;
        reversed.reverse();
        let other = TreeSequence::new(2, 100, vec![], reversed).unwrap();
        let (other_total, _, _) = replay(&other, DiffIteratorFlags::NONE, capacity);
        prop_assert_eq!(other_total, total);
    }
}
