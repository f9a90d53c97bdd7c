//! Crate-wide constants.

/// The maximum refinement depth representable by a [`MortonKey`](crate::MortonKey).
///
/// A key at depth `d` occupies `3 * d + 1` bits (a leading sentinel bit
/// followed by one three-bit child selector per level), so 64-bit keys
/// support 21 levels below the root.
pub const MAX_DEPTH: usize = 21;

/// Number of children of a refined octree node.
pub const NUM_CHILDREN: usize = 8;

/// Sentinel for stream indices that are not part of a cell grid enumeration.
pub const NOT_ENUMERATED: usize = usize::MAX;

/// Sentinel entry in adjacency tables for cells without a neighbor at an offset.
pub const NO_NEIGHBOR: usize = NOT_ENUMERATED;
