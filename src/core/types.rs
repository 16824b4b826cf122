//! Shared value types for stores and watches.

use std::fmt;

use crate::error::StoreError;

/// A hierarchical key path (e.g., `/app/db/password`).
pub type Key = String;

/// Opaque revision marker reported by a store.
///
/// Zero means "nothing observed yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u64);

impl Revision {
    /// The unset cursor.
    pub const ZERO: Revision = Revision(0);

    /// Whether this cursor has recorded an observation.
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    /// The revision a long-poll must wait for.
    pub fn next(self) -> Revision {
        Revision(self.0.saturating_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// A value read from a store together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub value: Vec<u8>,
    pub revision: Revision,
}

impl Node {
    pub fn new(value: impl Into<Vec<u8>>, revision: impl Into<Revision>) -> Self {
        Self {
            value: value.into(),
            revision: revision.into(),
        }
    }
}

/// A child of a directory key, as reported by a raw listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub dir: bool,
}

impl Entry {
    pub fn leaf(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            dir: false,
        }
    }

    pub fn dir(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            dir: true,
        }
    }
}

/// One item of a store watch: a raw (still encrypted) value or an error.
pub type Response = std::result::Result<Vec<u8>, StoreError>;
