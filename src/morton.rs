//! Routines for working with Morton keys.

use std::cmp::Ordering;

use crate::constants::MAX_DEPTH;
use crate::types::{Error, GridCoordinates, MortonBits, Result};

// Creating a distinct type for Morton keys to distinguish
// them from plain u64 numbers.

/// Path-encoded identity of an octree cell.
///
/// A key at depth `d` is a `3 * d + 1` bit value: a leading sentinel `1`
/// followed by `d` three-bit child selectors from the root down to the cell.
/// The root is `bits == 1`. Bit 0 of a selector encodes the x direction,
/// bit 1 the y direction and bit 2 the z direction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MortonKey {
    bits: MortonBits,
}

impl Default for MortonKey {
    fn default() -> Self {
        Self::root()
    }
}

impl MortonKey {
    /// The root key.
    pub fn root() -> Self {
        Self { bits: 1 }
    }

    /// Create a key from its raw bit representation.
    pub fn new(bits: MortonBits) -> Self {
        debug_assert!(bits != 0, "a Morton key must carry its sentinel bit");
        Self { bits }
    }

    /// The raw bit representation.
    pub fn bits(&self) -> MortonBits {
        self.bits
    }

    /// Build a key from a sequence of child selectors, root first.
    ///
    /// Fails with [`Error::InvalidArgument`] if the path is longer than
    /// [`MAX_DEPTH`] or contains a selector outside `0..=7`.
    pub fn from_path(path: &[MortonBits]) -> Result<Self> {
        if path.len() > MAX_DEPTH {
            return Err(Error::InvalidArgument(format!(
                "path of length {} exceeds the maximum depth {}",
                path.len(),
                MAX_DEPTH
            )));
        }

        let mut bits: MortonBits = 1;
        for (depth, &choice) in path.iter().enumerate() {
            if choice & 7 != choice {
                return Err(Error::InvalidArgument(format!(
                    "path selector {choice:#b} at depth {depth} is not a child index"
                )));
            }
            bits = (bits << 3) | choice;
        }

        Ok(Self { bits })
    }

    /// The child selectors from the root down to this cell.
    pub fn path(&self) -> Vec<MortonBits> {
        let mut shift = 3 * self.level();
        let mut path = Vec::with_capacity(self.level());

        while shift > 0 {
            shift -= 3;
            path.push((self.bits >> shift) & 7);
        }

        path
    }

    /// Depth of the cell below the root.
    pub fn level(&self) -> usize {
        ((63 - self.bits.leading_zeros()) / 3) as usize
    }

    /// Whether this is the root key.
    pub fn is_root(&self) -> bool {
        self.bits == 1
    }

    /// Index of this cell within its sibling group; `0` for the root.
    pub fn sibling_index(&self) -> MortonBits {
        if self.is_root() {
            return 0;
        }
        self.bits & 7
    }

    /// Whether this cell is the first of its sibling group.
    pub fn is_first_sibling(&self) -> bool {
        self.sibling_index() == 0
    }

    /// Whether this cell is the last of its sibling group. True for the root.
    pub fn is_last_sibling(&self) -> bool {
        if self.is_root() {
            return true;
        }
        self.sibling_index() == 7
    }

    /// The parent key. For the root this yields the empty key `0`, which is
    /// not a valid key; use [`checked_parent`](Self::checked_parent) when the
    /// input may be the root.
    pub fn parent(&self) -> Self {
        Self {
            bits: self.bits >> 3,
        }
    }

    /// The parent key, failing with [`Error::LogicError`] for the root.
    pub fn checked_parent(&self) -> Result<Self> {
        if self.is_root() {
            return Err(Error::LogicError("key points to root".to_string()));
        }
        Ok(self.parent())
    }

    /// The child key at the given branch.
    pub fn child(&self, branch: MortonBits) -> Self {
        debug_assert!(branch < 8);
        Self {
            bits: (self.bits << 3) | branch,
        }
    }

    /// The child key at the given branch, failing with [`Error::LogicError`]
    /// when the child would exceed the maximum depth.
    pub fn checked_child(&self, branch: MortonBits) -> Result<Self> {
        if self.level() >= MAX_DEPTH {
            return Err(Error::LogicError(
                "child would exceed maximum depth".to_string(),
            ));
        }
        Ok(self.child(branch))
    }

    /// The integer grid coordinates of this cell at its own level.
    ///
    /// At level `L` the cell occupies the lattice cube `(x, y, z)` with all
    /// components in `[0, 2^L)`.
    pub fn grid_coordinates(&self) -> GridCoordinates {
        let mut coords = [0usize; 3];

        for choice in self.path() {
            coords[0] = (coords[0] << 1) | (choice & 1) as usize;
            coords[1] = (coords[1] << 1) | ((choice >> 1) & 1) as usize;
            coords[2] = (coords[2] << 1) | ((choice >> 2) & 1) as usize;
        }

        coords
    }

    /// The key of the cell at the given grid coordinates and refinement level.
    ///
    /// Inverse of [`grid_coordinates`](Self::grid_coordinates) on the domain
    /// `[0, 2^level)^3`; coordinate bits above `level` are discarded.
    pub fn from_grid_coordinates(level: usize, coords: GridCoordinates) -> Self {
        let mut key = Self::root();

        for bit in (0..level).rev() {
            let branch = (((coords[2] >> bit) & 1) << 2)
                | (((coords[1] >> bit) & 1) << 1)
                | ((coords[0] >> bit) & 1);
            key = key.child(branch as MortonBits);
        }

        key
    }

    fn is_strict_ancestor_of(&self, other: &Self) -> bool {
        let own_width = 64 - self.bits.leading_zeros();
        let other_width = 64 - other.bits.leading_zeros();
        own_width < other_width && (other.bits >> (other_width - own_width)) == self.bits
    }
}

/// The ancestor partial order: an ancestor compares less than each of its
/// descendants, and keys on disjoint branches are incomparable (`<`, `>`,
/// `<=` and `>=` all return `false`).
impl PartialOrd for MortonKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.is_strict_ancestor_of(other) {
            Some(Ordering::Less)
        } else if other.is_strict_ancestor_of(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for MortonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let coords = self.grid_coordinates();
        f.debug_struct("MortonKey")
            .field("level", &self.level())
            .field("x", &coords[0])
            .field("y", &coords[1])
            .field("z", &coords[2])
            .field("bits", &format_args!("{:#b}", self.bits))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use rand::prelude::*;

    use super::*;

    #[test]
    fn test_root() {
        let root = MortonKey::root();
        assert_eq!(root.bits(), 0b1);
        assert_eq!(root.level(), 0);
        assert!(root.is_root());
        assert!(root.is_first_sibling());
        assert!(root.is_last_sibling());
        assert_eq!(root.sibling_index(), 0);
        assert_eq!(MortonKey::default(), root);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(MortonKey::from_path(&[]).unwrap().bits(), 0b1);
        assert_eq!(MortonKey::from_path(&[0]).unwrap().bits(), 0b1000);
        assert_eq!(MortonKey::from_path(&[1]).unwrap().bits(), 0b1001);
        assert_eq!(MortonKey::from_path(&[6]).unwrap().bits(), 0b1110);
        assert_eq!(
            MortonKey::from_path(&[1, 3, 1]).unwrap().bits(),
            0b1001011001
        );
        assert_eq!(
            MortonKey::from_path(&[7, 2, 5]).unwrap().bits(),
            0b1111010101
        );
    }

    #[test]
    fn test_from_path_rejects_bad_input() {
        let too_long = vec![0; MAX_DEPTH + 1];
        assert!(matches!(
            MortonKey::from_path(&too_long),
            Err(Error::InvalidArgument(_))
        ));

        assert!(matches!(
            MortonKey::from_path(&[1, 8, 3]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_path() {
        assert_eq!(MortonKey::new(0b1).path(), Vec::<MortonBits>::new());
        assert_eq!(MortonKey::new(0b1000000).path(), vec![0, 0]);
        assert_eq!(MortonKey::new(0b1101011).path(), vec![5, 3]);
        assert_eq!(MortonKey::new(0b1111010110).path(), vec![7, 2, 6]);
        assert_eq!(MortonKey::new(0b1001011101111).path(), vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_path_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);

        for _ in 0..1000 {
            let len = rng.gen_range(0..=MAX_DEPTH);
            let path: Vec<MortonBits> = (0..len).map(|_| rng.gen_range(0..8)).collect();
            let key = MortonKey::from_path(&path).unwrap();
            assert_eq!(key.path(), path);
            assert_eq!(key.level(), len);
        }
    }

    #[test]
    fn test_position_queries() {
        let key = MortonKey::new(0o1043);
        assert!(!key.is_root());
        assert!(!key.is_first_sibling());
        assert!(!key.is_last_sibling());
        assert_eq!(key.level(), 3);
        assert_eq!(key.sibling_index(), 3);

        let key = MortonKey::new(0o1070);
        assert!(key.is_first_sibling());
        assert!(!key.is_last_sibling());
        assert_eq!(key.level(), 3);
        assert_eq!(key.sibling_index(), 0);

        let key = MortonKey::new(0o17);
        assert!(!key.is_first_sibling());
        assert!(key.is_last_sibling());
        assert_eq!(key.level(), 1);
        assert_eq!(key.sibling_index(), 7);

        let key = MortonKey::new(0o135);
        assert!(!key.is_first_sibling());
        assert!(!key.is_last_sibling());
        assert_eq!(key.level(), 2);
        assert_eq!(key.sibling_index(), 5);
    }

    #[test]
    fn test_parent_child() {
        let root = MortonKey::root();

        for branch in 0..8 {
            let child = root.child(branch);
            assert!(!child.is_root());
            assert_eq!(child.level(), 1);
            assert_eq!(child.sibling_index(), branch);
            assert_eq!(child.parent(), root);
        }
    }

    #[test]
    fn test_child_parent_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);

        for _ in 0..1000 {
            let len = rng.gen_range(1..=MAX_DEPTH);
            let path: Vec<MortonBits> = (0..len).map(|_| rng.gen_range(0..8)).collect();
            let key = MortonKey::from_path(&path).unwrap();
            assert_eq!(key.parent().child(key.sibling_index()), key);
        }
    }

    #[test]
    fn test_checked_parent() {
        assert!(matches!(
            MortonKey::root().checked_parent(),
            Err(Error::LogicError(_))
        ));
        assert_eq!(
            MortonKey::new(0o1043).checked_parent().unwrap().bits(),
            0o104
        );
    }

    #[test]
    fn test_checked_child() {
        let mut key = MortonKey::root();
        for depth in 0..MAX_DEPTH {
            key = key.checked_child(0).unwrap();
            assert_eq!(key.bits(), 1 << (3 * (depth + 1)));
        }

        assert_eq!(key.bits(), 0x8000000000000000);
        assert!(matches!(key.checked_child(3), Err(Error::LogicError(_))));
    }

    #[test]
    fn test_equality() {
        assert_eq!(MortonKey::root(), MortonKey::root());
        assert_eq!(MortonKey::new(0o1023), MortonKey::new(0o1023));
        assert_ne!(MortonKey::new(0o1023), MortonKey::new(0o1203));
    }

    #[test]
    fn test_ancestor_order() {
        let root = MortonKey::root();

        assert!(root <= root);
        assert!(root >= root);
        assert!(!(root < root));
        assert!(!(root > root));

        // The root is a strict ancestor of every other key.
        assert!(root < MortonKey::new(0o12));
        assert!(root < MortonKey::new(0o143));
        assert!(root <= MortonKey::new(0o12));
        assert!(root <= MortonKey::new(0o10301));

        let key = MortonKey::new(0o1201);
        assert!(key <= key);
        assert!(key < MortonKey::new(0o12014));
        assert!(key <= MortonKey::new(0o12014));
        assert!(key < MortonKey::new(0o1201431));
        assert!(key <= MortonKey::new(0o1201431));

        assert!(MortonKey::new(0o12014) > key);
        assert!(MortonKey::new(0o12014) >= key);
        assert!(MortonKey::new(0o1201431) > key);
        assert!(MortonKey::new(0o1201431) >= key);
    }

    #[test]
    fn test_disjoint_branches_are_incomparable() {
        let lhs = MortonKey::new(0o1023);
        let rhs = MortonKey::new(0o1203);

        assert!(!(lhs < rhs));
        assert!(!(lhs > rhs));
        assert!(!(lhs <= rhs));
        assert!(!(lhs >= rhs));
        assert_eq!(lhs.partial_cmp(&rhs), None);
    }

    #[test]
    fn test_ancestor_path_is_prefix() {
        let ancestor = MortonKey::new(0o1201);
        let descendant = MortonKey::new(0o1201431);

        assert!(ancestor < descendant);
        assert_eq!(descendant.path()[..ancestor.level()], ancestor.path()[..]);
    }

    #[test]
    fn test_grid_coordinates() {
        assert_eq!(MortonKey::root().grid_coordinates(), [0, 0, 0]);
        assert_eq!(MortonKey::new(0o10).grid_coordinates(), [0, 0, 0]);
        assert_eq!(MortonKey::new(0o100).grid_coordinates(), [0, 0, 0]);
        assert_eq!(MortonKey::new(0b1110).grid_coordinates(), [0, 1, 1]);
        assert_eq!(MortonKey::new(0b1000110).grid_coordinates(), [0, 1, 1]);
        assert_eq!(MortonKey::new(0b1010000001).grid_coordinates(), [1, 4, 0]);
        assert_eq!(MortonKey::new(0b1101011).grid_coordinates(), [3, 1, 2]);
        assert_eq!(MortonKey::new(0b1000101011).grid_coordinates(), [3, 1, 2]);
        assert_eq!(MortonKey::new(0b1011101101).grid_coordinates(), [7, 4, 3]);
        assert_eq!(
            MortonKey::new(0b1011001000110).grid_coordinates(),
            [12, 9, 1]
        );
    }

    #[test]
    fn test_from_grid_coordinates() {
        assert_eq!(MortonKey::from_grid_coordinates(0, [0, 0, 0]).bits(), 0b1);
        assert_eq!(MortonKey::from_grid_coordinates(1, [0, 0, 0]).bits(), 0o10);
        assert_eq!(MortonKey::from_grid_coordinates(2, [0, 0, 0]).bits(), 0o100);
        assert_eq!(MortonKey::from_grid_coordinates(1, [0, 1, 1]).bits(), 0b1110);
        assert_eq!(
            MortonKey::from_grid_coordinates(2, [0, 1, 1]).bits(),
            0b1000110
        );
        assert_eq!(
            MortonKey::from_grid_coordinates(3, [1, 4, 0]).bits(),
            0b1010000001
        );
        assert_eq!(
            MortonKey::from_grid_coordinates(2, [3, 1, 2]).bits(),
            0b1101011
        );
        assert_eq!(
            MortonKey::from_grid_coordinates(3, [3, 1, 2]).bits(),
            0b1000101011
        );
        assert_eq!(
            MortonKey::from_grid_coordinates(3, [7, 4, 3]).bits(),
            0b1011101101
        );
        assert_eq!(
            MortonKey::from_grid_coordinates(4, [12, 9, 1]).bits(),
            0b1011001000110
        );
    }

    #[test]
    fn test_grid_coordinates_round_trip() {
        // Exhaustive on small levels.
        for level in 0..=3usize {
            let extent = 1 << level;
            for x in 0..extent {
                for y in 0..extent {
                    for z in 0..extent {
                        let key = MortonKey::from_grid_coordinates(level, [x, y, z]);
                        assert_eq!(key.level(), level);
                        assert_eq!(key.grid_coordinates(), [x, y, z]);
                    }
                }
            }
        }

        // Sampled up to the deepest level.
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let level = rng.gen_range(4..=MAX_DEPTH);
            let extent = 1usize << level;
            let coords = [
                rng.gen_range(0..extent),
                rng.gen_range(0..extent),
                rng.gen_range(0..extent),
            ];
            let key = MortonKey::from_grid_coordinates(level, coords);
            assert_eq!(key.level(), level);
            assert_eq!(key.grid_coordinates(), coords);
        }
    }

    #[test]
    fn test_debug_print() {
        let key = MortonKey::from_grid_coordinates(3, [1, 3, 5]);
        let parent = key.parent();

        println!("{:#?}", parent);
    }
}
