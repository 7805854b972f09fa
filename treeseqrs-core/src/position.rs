/// A locus along a genome.
///
/// Loci are discrete, so positions are unsigned integers.
/// A genome of `num_loci` loci spans the half-open range
/// `[0, num_loci)` and intervals are reported as `[left, right)`
/// with `right <= num_loci`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
#[repr(transparent)]
pub struct Position(u32);

impl Position {
    /// The first locus of every genome.
    pub const ZERO: Position = Position(0);
    /// Largest representable locus.
    pub const MAX: Position = Position(u32::MAX);

    /// Create a new Position
    ///
    /// # Returns
    ///
    /// * `Some` if `position` is non-negative and fits in 32 bits
    /// * `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// let p = treeseqrs_core::Position::new(10).unwrap();
    /// assert_eq!(p, 10); // can be compared to u32
    /// # assert_eq!(10, p);
    /// # assert!(p > 0);
    /// # assert!(p != 0);
    /// # assert!(p >= 10);
    /// # assert!(p <= 10);
    /// # assert!(0 < p);
    /// let p2 = treeseqrs_core::Position::new(11).unwrap();
    /// assert!(p < p2);
    /// assert!(p != p2);
    /// assert!(treeseqrs_core::Position::new(-1).is_none());
    /// ```
    pub fn new(position: i64) -> Option<Self> {
        u32::try_from(position).ok().map(Self)
    }

    /// Return the underlying locus.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Distance from `self` to a position further along the genome.
    ///
    /// Returns `None` if `other < self`.
    ///
    /// ```
    /// use treeseqrs_core::Position;
    /// assert_eq!(Position::from(3).distance_to(Position::from(10)), Some(7));
    /// assert_eq!(Position::from(10).distance_to(Position::from(3)), None);
    /// ```
    pub fn distance_to(self, other: Position) -> Option<u32> {
        other.0.checked_sub(self.0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u32> for Position {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Position> for u32 {
    fn eq(&self, other: &Position) -> bool {
        *self == other.0
    }
}

impl PartialOrd<u32> for Position {
    fn partial_cmp(&self, other: &u32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl PartialOrd<Position> for u32 {
    fn partial_cmp(&self, other: &Position) -> Option<std::cmp::Ordering> {
        self.partial_cmp(&other.0)
    }
}

impl From<u32> for Position {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for Position {
    type Error = crate::Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::Error::PositionError(value))
    }
}

impl From<Position> for u32 {
    fn from(value: Position) -> Self {
        value.0
    }
}

impl From<Position> for i64 {
    fn from(value: Position) -> Self {
        i64::from(value.0)
    }
}
