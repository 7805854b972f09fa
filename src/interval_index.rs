//! Ordered index from an interval end-point to the
//! edges that end there.

use std::collections::BTreeMap;

use crate::arena::{ArenaList, Handle, ListArena, ObjectArena};
use crate::error::{Result, TreeSequenceError};
use crate::tables::Edge;
use treeseqrs_core::Position;

/// The edges sharing one end-point.
pub type Bucket = ArenaList<Edge>;

/// Maps a locus to the list of edges whose `right`
/// end is that locus.
///
/// Buckets are slots of a fixed-capacity [``ObjectArena``];
/// the edges within a bucket are nodes of a [``ListArena``]
/// owned by the caller, which may back other lists too.
/// Lookups by key and predecessor are `O(log n)`.
pub struct IntervalIndex {
    map: BTreeMap<Position, Handle<Bucket>>,
    buckets: ObjectArena<Bucket>,
}

impl IntervalIndex {
    /// Create an index able to hold `capacity` buckets at once.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::OutOfMemory``] if the bucket pool
    /// cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            map: BTreeMap::new(),
            buckets: ObjectArena::new(capacity)?,
        })
    }

    fn bucket(&self, handle: Handle<Bucket>) -> Option<&Bucket> {
        self.buckets.get(handle)
    }

    /// Get the bucket stored under `key`.
    pub fn find(&self, key: Position) -> Option<&Bucket> {
        self.map.get(&key).and_then(|h| self.bucket(*h))
    }

    /// Get the bucket stored under `key`, creating an empty one
    /// if `key` is not present.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::PoolExhausted``] if a bucket is needed
    /// and none are free.
    pub fn find_or_create(&mut self, key: Position) -> Result<&mut Bucket> {
        let existing = self.map.get(&key).copied();
        let handle = match existing {
            Some(h) => h,
            None => {
                let h = self.buckets.allocate(Bucket::new())?;
                self.map.insert(key, h);
                h
            }
        };
        self.buckets.get_mut(handle).ok_or_else(|| {
            TreeSequenceError::Generic(format!("bucket for key {} was released", key))
        })
    }

    /// Append `edge` to the bucket under `key`.
    pub fn insert(&mut self, key: Position, edge: Edge, edges: &mut ListArena<Edge>) -> Result<()> {
        self.find_or_create(key)?.push_back(edges, edge)
    }

    /// The entry with the largest key strictly less than `key`.
    ///
    /// ```
    /// use treeseqrs::arena::ListArena;
    /// use treeseqrs::interval_index::IntervalIndex;
    /// use treeseqrs::{Edge, Position};
    ///
    /// let mut edges = ListArena::new(4).unwrap();
    /// let mut index = IntervalIndex::new(2).unwrap();
    /// index.insert(5.into(), Edge::new(0, 5, 6, [0, 1], 2.0), &mut edges).unwrap();
    /// index.insert(10.into(), Edge::new(0, 10, 5, [2, 3], 1.0), &mut edges).unwrap();
    /// let (key, bucket) = index.predecessor(10.into()).unwrap();
    /// assert_eq!(key, 5);
    /// assert_eq!(bucket.len(), 1);
    /// assert!(index.predecessor(5.into()).is_none());
    /// ```
    pub fn predecessor(&self, key: Position) -> Option<(Position, &Bucket)> {
        let (k, h) = self.map.range(..key).next_back()?;
        self.bucket(*h).map(|b| (*k, b))
    }

    /// Smallest key, if any.
    pub fn first_key(&self) -> Option<Position> {
        self.map.keys().next().copied()
    }

    /// Largest key, if any.
    pub fn last_key(&self) -> Option<Position> {
        self.map.keys().next_back().copied()
    }

    /// Unlink the bucket under `key`, returning its edges to
    /// `edges` and its slot to the bucket pool.
    ///
    /// Returns `false` if `key` is not present.
    pub fn remove(&mut self, key: Position, edges: &mut ListArena<Edge>) -> bool {
        match self.map.remove(&key) {
            Some(h) => {
                if let Some(mut bucket) = self.buckets.release(h) {
                    bucket.release_all(edges);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every bucket.
    pub fn clear(&mut self, edges: &mut ListArena<Edge>) {
        for (_, h) in std::mem::take(&mut self.map) {
            if let Some(mut bucket) = self.buckets.release(h) {
                bucket.release_all(edges);
            }
        }
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of buckets held at once.
    pub fn capacity(&self) -> usize {
        self.buckets.capacity()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Position> + '_ {
        self.map.keys().copied()
    }

    /// `(key, bucket)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Bucket)> + '_ {
        self.map
            .iter()
            .filter_map(|(k, h)| self.bucket(*h).map(|b| (*k, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(left: u32, right: u32, parent: u32) -> Edge {
        Edge::new(left, right, parent, [0, 1], 1.0)
    }

    fn make_index() -> (ListArena<Edge>, IntervalIndex) {
        let mut edges = ListArena::new(8).unwrap();
        let mut index = IntervalIndex::new(3).unwrap();
        index.insert(10.into(), edge(0, 10, 5), &mut edges).unwrap();
        index.insert(5.into(), edge(0, 5, 6), &mut edges).unwrap();
        index.insert(10.into(), edge(5, 10, 7), &mut edges).unwrap();
        (edges, index)
    }

    #[test]
    fn test_find() {
        let (edges, index) = make_index();
        assert_eq!(index.len(), 2);
        let parents = index
            .find(10.into())
            .unwrap()
            .iter(&edges)
            .map(|e| e.parent.raw())
            .collect::<Vec<_>>();
        assert_eq!(parents, vec![5, 7]);
        assert!(index.find(7.into()).is_none());
    }

    #[test]
    fn test_keys_are_ordered() {
        let (_, index) = make_index();
        assert_eq!(
            index.keys().collect::<Vec<_>>(),
            vec![Position::from(5), Position::from(10)]
        );
        assert_eq!(index.first_key(), Some(Position::from(5)));
        assert_eq!(index.last_key(), Some(Position::from(10)));
    }

    #[test]
    fn test_predecessor() {
        let (_, index) = make_index();
        assert_eq!(index.predecessor(10.into()).unwrap().0, 5);
        assert_eq!(index.predecessor(7.into()).unwrap().0, 5);
        assert_eq!(index.predecessor(11.into()).unwrap().0, 10);
        assert!(index.predecessor(5.into()).is_none());
        assert!(index.predecessor(0.into()).is_none());
    }

    #[test]
    fn test_remove_releases_slots() {
        let (mut edges, mut index) = make_index();
        assert_eq!(edges.len(), 3);
        assert!(index.remove(10.into(), &mut edges));
        assert!(!index.remove(10.into(), &mut edges));
        assert_eq!(edges.len(), 1);
        assert_eq!(index.len(), 1);
        index.clear(&mut edges);
        assert!(index.is_empty());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_bucket_pool_exhaustion() {
        let (mut edges, mut index) = make_index();
        index.insert(15.into(), edge(0, 15, 8), &mut edges).unwrap();
        match index.insert(20.into(), edge(0, 20, 9), &mut edges) {
            Err(TreeSequenceError::PoolExhausted) => (),
            _ => panic!("expected PoolExhausted"),
        }
        // A failed insertion leaves the index unchanged.
        assert_eq!(index.len(), 3);
        assert!(index.find(20.into()).is_none());
    }
}
