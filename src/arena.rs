//! Fixed-capacity object pools.
//!
//! This module defines [``ObjectArena``], a slot pool whose
//! capacity is reserved up front, and [``ArenaList``], a
//! forward linked list whose nodes live in an arena.
//!
//! Slots are referred to by generation-tagged [``Handle``]s.
//! Releasing a slot bumps its generation, so a handle that
//! outlives its slot can never read or release whatever
//! is later stored there.

use crate::error::{Result, TreeSequenceError};

/// Reference to an occupied slot of an [``ObjectArena``].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: std::marker::PhantomData,
        }
    }

    /// Index of the slot in its arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// A pool of `capacity` slots with O(1) allocate and release.
///
/// The pool never grows: once every slot is in use,
/// [``ObjectArena::allocate``] fails with
/// [``TreeSequenceError::PoolExhausted``].
///
/// # Example
///
/// ```
/// use treeseqrs::arena::ObjectArena;
/// let mut arena = ObjectArena::<i32>::new(1).unwrap();
/// let h = arena.allocate(3).unwrap();
/// assert!(arena.allocate(4).is_err());
/// assert_eq!(arena.release(h), Some(3));
/// assert_eq!(arena.release(h), None); // stale handle
/// ```
pub struct ObjectArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> ObjectArena<T> {
    /// Reserve `capacity` slots.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::OutOfMemory``] if the reservation fails
    /// or `capacity` cannot be addressed by a [``Handle``].
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > u32::MAX as usize {
            return Err(TreeSequenceError::OutOfMemory);
        }
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        // Chain the free list in ascending order so
        // that slots are handed out front to back.
        for i in 0..capacity {
            let next_free = if i + 1 < capacity {
                Some((i + 1) as u32)
            } else {
                None
            };
            slots.push(Slot::Vacant {
                generation: 0,
                next_free,
            });
        }
        Ok(Self {
            slots,
            free_head: if capacity > 0 { Some(0) } else { None },
            len: 0,
        })
    }

    /// Store `value` in a free slot.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::PoolExhausted``] if no slot is free.
    pub fn allocate(&mut self, value: T) -> Result<Handle<T>> {
        let index = self.free_head.ok_or(TreeSequenceError::PoolExhausted)?;
        let (generation, next_free) = match self.slots[index as usize] {
            Slot::Vacant {
                generation,
                next_free,
            } => (generation, next_free),
            Slot::Occupied { .. } => {
                return Err(TreeSequenceError::Generic(
                    "arena free list refers to an occupied slot".to_string(),
                ))
            }
        };
        self.slots[index as usize] = Slot::Occupied { generation, value };
        self.free_head = next_free;
        self.len += 1;
        Ok(Handle::new(index, generation))
    }

    /// Return a slot to the free list, yielding its value.
    ///
    /// Returns `None`, leaving the arena untouched, if
    /// `handle` does not refer to a currently occupied slot.
    pub fn release(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let vacant = Slot::Vacant {
            generation: handle.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let old = std::mem::replace(&mut self.slots[handle.index()], vacant);
        self.free_head = Some(handle.index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Get a reference to the value behind `handle`.
    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.slots.get(handle.index())? {
            Slot::Occupied { generation, value } if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Get a mutable reference to the value behind `handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.slots.get_mut(handle.index())? {
            Slot::Occupied { generation, value } if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// `true` if `handle` refers to an occupied slot.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Release every occupied slot.
    ///
    /// Outstanding handles all become stale.
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let generation = match slot {
                Slot::Occupied { generation, .. } => generation.wrapping_add(1),
                Slot::Vacant { generation, .. } => *generation,
            };
            let next_free = if i + 1 < capacity {
                Some((i + 1) as u32)
            } else {
                None
            };
            *slot = Slot::Vacant {
                generation,
                next_free,
            };
        }
        self.free_head = if capacity > 0 { Some(0) } else { None };
        self.len = 0;
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if no slots are occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }
}

/// A node of an [``ArenaList``].
pub struct ListNode<T> {
    value: T,
    next: Option<Handle<ListNode<T>>>,
}

/// The arena type backing an [``ArenaList``].
pub type ListArena<T> = ObjectArena<ListNode<T>>;

/// A forward linked list whose nodes are slots of a [``ListArena``].
///
/// The list only stores its head and tail handles, so the
/// same arena may back many lists.  Every mutating operation
/// takes the arena explicitly.  Nodes are only ever
/// allocated and released through the list, which keeps a
/// node from being released twice.
///
/// # Example
///
/// ```
/// use treeseqrs::arena::{ArenaList, ListArena};
/// let mut arena = ListArena::<i32>::new(4).unwrap();
/// let mut list = ArenaList::new();
/// for i in 0..3 {
///     list.push_back(&mut arena, i).unwrap();
/// }
/// assert_eq!(list.iter(&arena).copied().collect::<Vec<_>>(), vec![0, 1, 2]);
/// list.release_all(&mut arena);
/// assert!(arena.is_empty());
/// ```
pub struct ArenaList<T> {
    head: Option<Handle<ListNode<T>>>,
    tail: Option<Handle<ListNode<T>>>,
    len: usize,
}

impl<T> Default for ArenaList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArenaList<T> {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Append `value`.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::PoolExhausted``] if `arena` is full.
    pub fn push_back(&mut self, arena: &mut ListArena<T>, value: T) -> Result<()> {
        let node = arena.allocate(ListNode { value, next: None })?;
        match self.tail {
            None => self.head = Some(node),
            Some(tail) => match arena.get_mut(tail) {
                Some(t) => t.next = Some(node),
                None => {
                    let _ = arena.release(node);
                    return Err(TreeSequenceError::Generic(
                        "list tail is not in this arena".to_string(),
                    ));
                }
            },
        }
        self.tail = Some(node);
        self.len += 1;
        Ok(())
    }

    /// Release every node back to `arena` and empty the list.
    pub fn release_all(&mut self, arena: &mut ListArena<T>) {
        let mut current = self.head.take();
        while let Some(h) = current {
            current = arena.release(h).and_then(|node| node.next);
        }
        self.tail = None;
        self.len = 0;
    }

    /// Return an [`Iterator`] over the values in the list.
    pub fn iter<'a>(&self, arena: &'a ListArena<T>) -> ListIter<'a, T> {
        ListIter {
            arena,
            current: self.head,
        }
    }

    /// Number of values in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the list has no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Iterator returned by [``ArenaList::iter``].
pub struct ListIter<'a, T> {
    arena: &'a ListArena<T>,
    current: Option<Handle<ListNode<T>>>,
}

impl<'a, T> Iterator for ListIter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.arena.get(self.current?)?;
        self.current = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    struct Datum {
        datum: i32,
    }

    fn make_data_for_testing() -> (ListArena<i32>, ArenaList<i32>, ArenaList<i32>) {
        let mut arena = ListArena::new(8).unwrap();
        let mut first = ArenaList::new();
        let mut second = ArenaList::new();
        for i in 0..3 {
            first.push_back(&mut arena, 2 * i).unwrap();
        }
        for i in 0..5 {
            second.push_back(&mut arena, 3 * i).unwrap();
        }
        assert_eq!(arena.len(), 8);
        assert_eq!(arena.available(), 0);
        (arena, first, second)
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let mut arena = ObjectArena::new(3).unwrap();
        for i in 0..3 {
            arena.allocate(i).unwrap();
        }
        match arena.allocate(4) {
            Err(TreeSequenceError::PoolExhausted) => (),
            _ => panic!("expected PoolExhausted"),
        }
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_zero_capacity() {
        let mut arena = ObjectArena::<u8>::new(0).unwrap();
        assert!(matches!(
            arena.allocate(1),
            Err(TreeSequenceError::PoolExhausted)
        ));
    }

    #[test]
    fn test_unaddressable_capacity() {
        assert!(matches!(
            ObjectArena::<u8>::new(u32::MAX as usize + 1),
            Err(TreeSequenceError::OutOfMemory)
        ));
    }

    #[test]
    fn test_release_reuses_slot() {
        let mut arena = ObjectArena::new(2).unwrap();
        let a = arena.allocate(1).unwrap();
        let _ = arena.allocate(2).unwrap();
        assert_eq!(arena.release(a), Some(1));
        let c = arena.allocate(3).unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(arena.get(c), Some(&3));
        assert_eq!(arena.get(a), None);
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut arena = ObjectArena::new(2).unwrap();
        let a = arena.allocate(1).unwrap();
        assert_eq!(arena.release(a), Some(1));
        assert_eq!(arena.release(a), None);
        assert_eq!(arena.len(), 0);
        // The free list is intact: both slots can be used.
        arena.allocate(5).unwrap();
        arena.allocate(6).unwrap();
        assert!(arena.allocate(7).is_err());
    }

    #[test]
    fn test_get_mut_struct() {
        let mut arena = ObjectArena::new(1).unwrap();
        let h = arena.allocate(Datum { datum: 0 }).unwrap();
        arena.get_mut(h).unwrap().datum = 111;
        assert_eq!(arena.get(h).unwrap().datum, 111);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut arena = ObjectArena::new(2).unwrap();
        let a = arena.allocate(1).unwrap();
        arena.clear();
        assert!(!arena.contains(a));
        assert_eq!(arena.available(), 2);
        let b = arena.allocate(2).unwrap();
        assert_eq!(arena.release(a), None);
        assert!(arena.contains(b));
    }

    #[test]
    fn test_list_round_trip() {
        let (arena, first, second) = make_data_for_testing();
        let output = first.iter(&arena).copied().collect::<Vec<_>>();
        assert_eq!(output, vec![0, 2, 4]);
        let output = second.iter(&arena).copied().collect::<Vec<_>>();
        assert_eq!(output, vec![0, 3, 6, 9, 12]);
        assert_eq!(second.len(), 5);
    }

    #[test]
    fn test_list_push_into_full_arena() {
        let (mut arena, mut first, _) = make_data_for_testing();
        assert!(matches!(
            first.push_back(&mut arena, 100),
            Err(TreeSequenceError::PoolExhausted)
        ));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_release_all() {
        let (mut arena, mut first, second) = make_data_for_testing();
        first.release_all(&mut arena);
        assert!(first.is_empty());
        assert_eq!(first.iter(&arena).count(), 0);
        assert_eq!(arena.len(), 5);
        assert_eq!(second.iter(&arena).count(), 5);
        first.push_back(&mut arena, 77).unwrap();
        assert_eq!(first.iter(&arena).copied().collect::<Vec<_>>(), vec![77]);
    }
}
