/// The age of a node.
///
/// Times are finite floating-point values measured
/// backwards from the present, so a parent is older
/// (has a larger time) than its children.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time(f64);

impl Time {
    /// Create a new Time
    ///
    /// # Returns
    ///
    /// * `Some` if `time` is finite
    /// * `None` otherwise
    ///
    /// ```
    /// assert!(treeseqrs_core::Time::new(1.5).is_some());
    /// assert!(treeseqrs_core::Time::new(f64::NAN).is_none());
    /// assert!(treeseqrs_core::Time::new(f64::INFINITY).is_none());
    /// ```
    pub fn new(time: f64) -> Option<Self> {
        if time.is_finite() {
            Some(Self(time))
        } else {
            None
        }
    }

    /// Return the underlying value.
    pub fn raw(self) -> f64 {
        self.0
    }

    /// `true` if the underlying value is finite.
    ///
    /// Values built with [`From<f64>`] are not checked.
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Time {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<i32> for Time {
    fn from(value: i32) -> Self {
        Self(f64::from(value))
    }
}

impl From<Time> for f64 {
    fn from(value: Time) -> Self {
        value.0
    }
}

impl PartialEq<f64> for Time {
    fn eq(&self, other: &f64) -> bool {
        self.0 == *other
    }
}
