//! Bit tags carried by vertices, edges, faces and elements
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Set of tag bits
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagFlags(u16);

impl TagFlags {
    pub const NONE: Self = Self(0);
    /// Entity carries a reference
    pub const REF: Self = Self(1 << 0);
    /// Ridge
    pub const GEOMETRIC: Self = Self(1 << 1);
    /// Must not be modified by the remesher
    pub const REQUIRED: Self = Self(1 << 2);
    /// Non manifold
    pub const NON_MANIFOLD: Self = Self(1 << 3);
    /// Lies on a boundary (physical or between partitions)
    pub const BOUNDARY: Self = Self(1 << 4);
    /// Corner
    pub const CORNER: Self = Self(1 << 5);
    /// Must not be projected on the surface approximation
    pub const NO_SURFACE_PROJECTION: Self = Self(1 << 6);
    /// Lies on an interface between partitions
    pub const PARALLEL_BOUNDARY: Self = Self(1 << 10);
    /// Unused entity (free slot)
    pub const NULL: Self = Self(1 << 14);

    /// Tags set on every entity of a new interface between partitions
    pub const PARALLEL_INTERFACE: Self = Self(
        Self::PARALLEL_BOUNDARY.0
            | Self::BOUNDARY.0
            | Self::REQUIRED.0
            | Self::NO_SURFACE_PROJECTION.0,
    );

    /// Check if all the bits of `other` are set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if any bit of `other` is set
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for TagFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TagFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TagFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for TagFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for TagFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(TagFlags, &str); 9] = [
            (TagFlags::REF, "REF"),
            (TagFlags::GEOMETRIC, "GEOMETRIC"),
            (TagFlags::REQUIRED, "REQUIRED"),
            (TagFlags::NON_MANIFOLD, "NON_MANIFOLD"),
            (TagFlags::BOUNDARY, "BOUNDARY"),
            (TagFlags::CORNER, "CORNER"),
            (TagFlags::NO_SURFACE_PROJECTION, "NO_SURFACE_PROJECTION"),
            (TagFlags::PARALLEL_BOUNDARY, "PARALLEL_BOUNDARY"),
            (TagFlags::NULL, "NULL"),
        ];
        let names = NAMES
            .iter()
            .filter(|(t, _)| self.contains(*t))
            .map(|(_, n)| *n)
            .collect::<Vec<_>>();
        write!(f, "TagFlags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::TagFlags;

    #[test]
    fn test_interface_tags() {
        let t = TagFlags::PARALLEL_INTERFACE;
        assert!(t.contains(TagFlags::PARALLEL_BOUNDARY));
        assert!(t.contains(TagFlags::BOUNDARY | TagFlags::REQUIRED));
        assert!(t.contains(TagFlags::NO_SURFACE_PROJECTION));
        assert!(!t.intersects(TagFlags::CORNER | TagFlags::NULL));

        let mut t = TagFlags::BOUNDARY;
        t |= TagFlags::CORNER;
        assert!(!t.contains(TagFlags::PARALLEL_INTERFACE));
        t.remove(TagFlags::CORNER);
        assert_eq!(t, TagFlags::BOUNDARY);
        assert_eq!(format!("{t:?}"), "TagFlags(BOUNDARY)");
    }
}
