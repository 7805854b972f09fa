macro_rules! impl_node_id {
    ($idtype: ident, $integer_type: ty) => {
        impl $idtype {
            /// Return the underlying value.
            pub fn raw(self) -> $integer_type {
                self.0
            }
        }

        impl From<$integer_type> for $idtype {
            fn from(value: $integer_type) -> Self {
                Self(value)
            }
        }

        impl From<$idtype> for $integer_type {
            fn from(item: $idtype) -> Self {
                item.0
            }
        }

        impl TryFrom<i64> for $idtype {
            type Error = $crate::Error;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                <$integer_type>::try_from(value)
                    .map(Self)
                    .map_err(|_| $crate::Error::NodeIdError(value))
            }
        }

        impl TryFrom<usize> for $idtype {
            type Error = $crate::Error;

            fn try_from(value: usize) -> Result<Self, Self::Error> {
                <$integer_type>::try_from(value)
                    .map(Self)
                    .map_err(|_| $crate::Error::NodeIdError(value as i64))
            }
        }

        impl From<$idtype> for usize {
            fn from(value: $idtype) -> Self {
                value.0 as usize
            }
        }

        impl std::fmt::Display for $idtype {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl PartialEq<$integer_type> for $idtype {
            fn eq(&self, other: &$integer_type) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$idtype> for $integer_type {
            fn eq(&self, other: &$idtype) -> bool {
                *self == other.0
            }
        }

        impl PartialOrd<$integer_type> for $idtype {
            fn partial_cmp(&self, other: &$integer_type) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl PartialOrd<$idtype> for $integer_type {
            fn partial_cmp(&self, other: &$idtype) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.0)
            }
        }
    };
}

/// A node of a genealogy.
///
/// Samples are numbered `0..sample_size`; ancestral
/// nodes receive larger values.
///
/// ```
/// # use treeseqrs_core::NodeId;
/// let n = NodeId::from(5);
/// assert_eq!(n, 5);
/// assert_eq!(n.raw(), 5);
/// assert!(NodeId::try_from(-1_i64).is_err());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct NodeId(u32);

impl_node_id!(NodeId, u32);
