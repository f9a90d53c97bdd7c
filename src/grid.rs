//! Dense enumeration of octree cells with constant-time neighbor lookup.
//!
//! A [`CellGrid`] enumerates the non-phantom cells of selected levels into a
//! dense ordinal index space and precomputes, per user-supplied offset, an
//! adjacency table under a pluggable periodicity policy. Payload arrays are
//! indexed by the ordinal cell index.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::constants::{NOT_ENUMERATED, NO_NEIGHBOR};
use crate::geometry::BoundingBox;
use crate::morton::MortonKey;
use crate::octree::{CellOctree, CellView};
use crate::types::{AdjacencyOffset, Error, GridCoordinates, Result, SignedGridCoordinates};

/// Policy mapping signed grid coordinates back into valid grid coordinates.
///
/// The set of policies is closed, so a tagged variant is preferred over open
/// extension. A mapped coordinate with any negative component is invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Periodicity {
    /// Bounds check only: coordinates outside `[0, 2^level)^3` are invalid.
    #[default]
    None,
    /// Wrap flagged axes around the `[0, 2^level)` torus; unflagged axes pass
    /// through unchanged and may yield an out-of-range result treated as
    /// invalid.
    Torus([bool; 3]),
}

impl Periodicity {
    /// Map goal coordinates at the given level to valid grid coordinates, or
    /// to a coordinate with a negative component when there are none.
    pub fn map(&self, goal: SignedGridCoordinates, level: usize) -> SignedGridCoordinates {
        let extent = 1i64 << level;

        match self {
            Periodicity::None => {
                if goal.iter().all(|&c| 0 <= c && c < extent) {
                    goal
                } else {
                    [-1, -1, -1]
                }
            }
            Periodicity::Torus(periodic) => {
                let mut mapped = goal;
                for axis in 0..3 {
                    if periodic[axis] {
                        mapped[axis] = goal[axis].rem_euclid(extent);
                    }
                }
                mapped
            }
        }
    }
}

fn to_signed(coords: GridCoordinates) -> SignedGridCoordinates {
    [coords[0] as i64, coords[1] as i64, coords[2] as i64]
}

fn to_unsigned(coords: SignedGridCoordinates) -> GridCoordinates {
    [coords[0] as usize, coords[1] as usize, coords[2] as usize]
}

fn is_invalid(coords: SignedGridCoordinates) -> bool {
    coords.iter().any(|&c| c < 0)
}

/// A dense enumeration of the non-phantom cells of selected octree levels,
/// together with per-offset neighbor tables.
///
/// Immutable after construction; shares its octree store by reference count.
#[derive(Clone, Debug)]
pub struct CellGrid {
    octree: Arc<CellOctree>,
    morton_keys: Vec<MortonKey>,
    stream_to_enum: Vec<usize>,
    offsets: Vec<AdjacencyOffset>,
    adjacency: Vec<Vec<usize>>,
}

impl CellGrid {
    /// Start building a grid over the given octree store.
    pub fn create(octree: Arc<CellOctree>) -> CellGridBuilder {
        CellGridBuilder::new(octree)
    }

    /// Number of enumerated cells.
    pub fn len(&self) -> usize {
        self.morton_keys.len()
    }

    /// Whether the grid enumerates no cells.
    pub fn is_empty(&self) -> bool {
        self.morton_keys.is_empty()
    }

    /// The octree store this grid enumerates.
    pub fn octree(&self) -> &CellOctree {
        &self.octree
    }

    /// The Morton keys of the enumerated cells, in enumeration order.
    pub fn morton_keys(&self) -> &[MortonKey] {
        &self.morton_keys
    }

    /// The ordinal of the cell with the given stream index, or
    /// [`NOT_ENUMERATED`].
    pub fn enumeration_index_of_stream(&self, stream_index: usize) -> usize {
        self.stream_to_enum
            .get(stream_index)
            .copied()
            .unwrap_or(NOT_ENUMERATED)
    }

    /// The ordinal of the given cell; [`NOT_ENUMERATED`] for phantom cells.
    pub fn enumeration_index(&self, cell: &CellView) -> usize {
        if cell.is_phantom() {
            return NOT_ENUMERATED;
        }
        self.enumeration_index_of_stream(cell.stream_index())
    }

    /// The precomputed neighbor table for one offset of the neighborhood.
    ///
    /// Entry `i` holds the ordinal of cell `i`'s neighbor, or [`NO_NEIGHBOR`].
    /// Fails with [`Error::OutOfRange`] when the offset is not part of the
    /// configured neighborhood. The neighborhood is small, so a linear scan
    /// is expected.
    pub fn neighbor_indices(&self, offset: AdjacencyOffset) -> Result<&[usize]> {
        self.offsets
            .iter()
            .position(|&configured| configured == offset)
            .map(|index| self.adjacency[index].as_slice())
            .ok_or_else(|| {
                Error::OutOfRange(format!("offset {offset:?} is not part of the neighborhood"))
            })
    }

    /// The octree cell view of the cell at the given ordinal.
    ///
    /// Fails with [`Error::OutOfRange`] for an ordinal outside the
    /// enumeration.
    pub fn cell(&self, ordinal: usize) -> Result<CellView> {
        let Some(&key) = self.morton_keys.get(ordinal) else {
            return Err(Error::OutOfRange(format!(
                "cell ordinal {ordinal} exceeds the enumeration size {}",
                self.len()
            )));
        };

        self.octree.get_cell(key).ok_or_else(|| {
            Error::LogicError(format!(
                "enumerated key {key:?} no longer names a cell in the octree"
            ))
        })
    }

    /// Iterate the enumerated cells in ordinal order.
    pub fn iter(&self) -> GridCells<'_> {
        GridCells {
            grid: self,
            ordinal: 0,
        }
    }
}

impl<'a> IntoIterator for &'a CellGrid {
    type Item = GridCell<'a>;
    type IntoIter = GridCells<'a>;

    fn into_iter(self) -> GridCells<'a> {
        self.iter()
    }
}

/// Iterator over the cells of a [`CellGrid`] in ordinal order.
pub struct GridCells<'a> {
    grid: &'a CellGrid,
    ordinal: usize,
}

impl<'a> Iterator for GridCells<'a> {
    type Item = GridCell<'a>;

    fn next(&mut self) -> Option<GridCell<'a>> {
        if self.ordinal >= self.grid.len() {
            return None;
        }
        let cell = GridCell {
            grid: self.grid,
            ordinal: self.ordinal,
        };
        self.ordinal += 1;
        Some(cell)
    }
}

/// A cell of a [`CellGrid`], addressed by its ordinal.
#[derive(Clone, Copy)]
pub struct GridCell<'a> {
    grid: &'a CellGrid,
    ordinal: usize,
}

impl<'a> GridCell<'a> {
    /// The ordinal of this cell in the grid enumeration.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The Morton key of this cell.
    pub fn morton_key(&self) -> MortonKey {
        self.grid.morton_keys[self.ordinal]
    }

    /// The refinement level of this cell.
    pub fn level(&self) -> usize {
        self.morton_key().level()
    }

    /// The Cartesian center of this cell.
    pub fn center(&self) -> [f64; 3] {
        self.grid.octree.geometry().cell_center(self.morton_key())
    }

    /// The Cartesian bounding box of this cell.
    pub fn bounding_box(&self) -> BoundingBox {
        self.grid
            .octree
            .geometry()
            .cell_bounding_box(self.morton_key())
    }

    /// The octree cell view of this cell.
    pub fn cell_view(&self) -> Result<CellView> {
        self.grid.cell(self.ordinal)
    }

    /// The neighbor of this cell at the given offset.
    ///
    /// `Ok(None)` when the cell has no neighbor there; fails with
    /// [`Error::OutOfRange`] when the offset is not part of the neighborhood.
    pub fn neighbor(&self, offset: AdjacencyOffset) -> Result<Option<GridCell<'a>>> {
        let neighbor_ordinal = self.grid.neighbor_indices(offset)?[self.ordinal];
        if neighbor_ordinal == NO_NEIGHBOR {
            return Ok(None);
        }
        Ok(Some(GridCell {
            grid: self.grid,
            ordinal: neighbor_ordinal,
        }))
    }
}

/// Builder for a [`CellGrid`].
///
/// Defaults: all levels of the octree, an empty neighborhood and
/// [`Periodicity::None`].
pub struct CellGridBuilder {
    octree: Arc<CellOctree>,
    levels: Vec<usize>,
    offsets: Vec<AdjacencyOffset>,
    periodicity: Periodicity,
}

impl CellGridBuilder {
    fn new(octree: Arc<CellOctree>) -> Self {
        Self {
            octree,
            levels: Vec::new(),
            offsets: Vec::new(),
            periodicity: Periodicity::None,
        }
    }

    /// Select the levels to enumerate, in the given order.
    pub fn levels(mut self, levels: &[usize]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    /// Select the neighborhood offsets to precompute adjacency tables for.
    pub fn neighborhood(mut self, offsets: &[AdjacencyOffset]) -> Self {
        self.offsets = offsets.to_vec();
        self
    }

    /// Select the periodicity policy for neighbor resolution.
    pub fn periodicity(mut self, periodicity: Periodicity) -> Self {
        self.periodicity = periodicity;
        self
    }

    /// Build the grid: enumerate the selected levels and resolve the
    /// adjacency tables.
    pub fn build(self) -> CellGrid {
        let octree = self.octree;

        let levels = if self.levels.is_empty() {
            (0..octree.num_levels()).collect()
        } else {
            self.levels
        };

        let num_cells = octree.num_non_phantom_nodes_in(&levels);
        let mut morton_keys = Vec::with_capacity(num_cells);
        let mut stream_to_enum = vec![NOT_ENUMERATED; octree.num_nodes()];

        // Enumerate in horizontal order per level; the ranges already skip
        // phantoms.
        for &level in &levels {
            for cell in octree.horizontal_range(level) {
                stream_to_enum[cell.stream_index()] = morton_keys.len();
                morton_keys.push(cell.morton_key());
            }
        }

        let adjacency = if self.offsets.is_empty() {
            Vec::new()
        } else {
            // Cells of different levels may share grid coordinates, so the
            // lookup keeps all candidates and the same-level one wins.
            let mut coord_to_enum: HashMap<GridCoordinates, Vec<usize>> = HashMap::new();
            for (ordinal, key) in morton_keys.iter().enumerate() {
                coord_to_enum
                    .entry(key.grid_coordinates())
                    .or_default()
                    .push(ordinal);
            }

            self.offsets
                .iter()
                .map(|&offset| {
                    let mut table = vec![NO_NEIGHBOR; morton_keys.len()];
                    for (ordinal, key) in morton_keys.iter().enumerate() {
                        let coords = to_signed(key.grid_coordinates());
                        let goal = [
                            coords[0] + offset[0],
                            coords[1] + offset[1],
                            coords[2] + offset[2],
                        ];

                        let mapped = self.periodicity.map(goal, key.level());
                        if is_invalid(mapped) {
                            continue;
                        }

                        let Some(candidates) = coord_to_enum.get(&to_unsigned(mapped)) else {
                            continue;
                        };
                        for &candidate in candidates {
                            if morton_keys[candidate].level() == key.level() {
                                table[ordinal] = candidate;
                                break;
                            }
                        }
                    }
                    table
                })
                .collect()
        };

        debug!(
            cells = morton_keys.len(),
            offsets = self.offsets.len(),
            "built cell grid"
        );

        CellGrid {
            octree,
            morton_keys,
            stream_to_enum,
            offsets: self.offsets,
            adjacency,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FACE_NEIGHBORHOOD: [AdjacencyOffset; 6] = [
        [-1, 0, 0],
        [1, 0, 0],
        [0, -1, 0],
        [0, 1, 0],
        [0, 0, -1],
        [0, 0, 1],
    ];

    fn grid_bits(grid: &CellGrid) -> Vec<u64> {
        grid.morton_keys().iter().map(|key| key.bits()).collect()
    }

    // Neighbor table mapped to the neighbors' Morton bits, 0 for no neighbor,
    // mirroring how the adjacency scenarios are easiest to read.
    fn neighbor_bits(grid: &CellGrid, offset: AdjacencyOffset) -> Vec<u64> {
        grid.neighbor_indices(offset)
            .unwrap()
            .iter()
            .map(|&ordinal| {
                if ordinal == NO_NEIGHBOR {
                    0
                } else {
                    grid.morton_keys()[ordinal].bits()
                }
            })
            .collect()
    }

    #[test]
    fn test_periodicity_none() {
        let mapper = Periodicity::None;

        assert_eq!(mapper.map([0, 1, 1], 1), [0, 1, 1]);
        assert_eq!(mapper.map([2, 0, 0], 1), [-1, -1, -1]);
        assert_eq!(mapper.map([0, -1, 0], 1), [-1, -1, -1]);
        assert_eq!(mapper.map([3, 3, 3], 2), [3, 3, 3]);
        assert_eq!(mapper.map([4, 0, 0], 2), [-1, -1, -1]);
    }

    #[test]
    fn test_periodicity_torus() {
        let mapper = Periodicity::Torus([true, true, true]);

        assert_eq!(mapper.map([2, -1, 0], 1), [0, 1, 0]);
        assert_eq!(mapper.map([-1, -1, -1], 2), [3, 3, 3]);
        assert_eq!(mapper.map([4, 5, 8], 2), [0, 1, 0]);

        // Non-periodic axes pass through, including invalid results.
        let mapper = Periodicity::Torus([true, false, false]);
        assert_eq!(mapper.map([-1, 1, 0], 1), [1, 1, 0]);
        assert_eq!(mapper.map([0, -1, 0], 1), [0, -1, 0]);
        assert_eq!(mapper.map([0, 2, 0], 1), [0, 2, 0]);
    }

    #[test]
    fn test_enumerate_all_levels() {
        let octree = Arc::new(CellOctree::from_descriptor("R|RR......|................").unwrap());
        let grid = CellGrid::create(octree).build();

        assert_eq!(
            grid_bits(&grid),
            vec![
                0o1,
                0o10, 0o11, 0o12, 0o13, 0o14, 0o15, 0o16, 0o17,
                0o100, 0o101, 0o102, 0o103, 0o104, 0o105, 0o106, 0o107,
                0o110, 0o111, 0o112, 0o113, 0o114, 0o115, 0o116, 0o117,
            ]
        );
    }

    #[test]
    fn test_enumerate_selected_levels() {
        let octree = Arc::new(CellOctree::from_descriptor("R|RR......|................").unwrap());

        let grid = CellGrid::create(octree.clone()).levels(&[1, 2]).build();
        assert_eq!(
            grid_bits(&grid),
            vec![
                0o10, 0o11, 0o12, 0o13, 0o14, 0o15, 0o16, 0o17,
                0o100, 0o101, 0o102, 0o103, 0o104, 0o105, 0o106, 0o107,
                0o110, 0o111, 0o112, 0o113, 0o114, 0o115, 0o116, 0o117,
            ]
        );

        let grid = CellGrid::create(octree).levels(&[0, 2]).build();
        assert_eq!(
            grid_bits(&grid),
            vec![
                0o1,
                0o100, 0o101, 0o102, 0o103, 0o104, 0o105, 0o106, 0o107,
                0o110, 0o111, 0o112, 0o113, 0o114, 0o115, 0o116, 0o117,
            ]
        );
    }

    #[test]
    fn test_enumerate_with_phantoms() {
        let octree = Arc::new(CellOctree::from_descriptor("R|XX....PP|................").unwrap());
        let grid = CellGrid::create(octree).build();

        assert_eq!(
            grid_bits(&grid),
            vec![
                0o1,
                0o12, 0o13, 0o14, 0o15,
                0o100, 0o101, 0o102, 0o103, 0o104, 0o105, 0o106, 0o107,
                0o110, 0o111, 0o112, 0o113, 0o114, 0o115, 0o116, 0o117,
            ]
        );
    }

    #[test]
    fn test_enumerate_sparse_phantom_tree() {
        let octree = Arc::new(
            CellOctree::from_descriptor("X|XXXXPPPP|...PPPPP..P.PPPP.P..PPPP.P.PPPPP").unwrap(),
        );
        let grid = CellGrid::create(octree).levels(&[2]).build();

        assert_eq!(
            grid_bits(&grid),
            vec![0o100, 0o101, 0o102, 0o110, 0o111, 0o113, 0o120, 0o122, 0o123, 0o130, 0o132]
        );
    }

    #[test]
    fn test_enumeration_coverage() {
        let octree = Arc::new(
            CellOctree::from_descriptor("X|XXXXPPPP|...PPPPP..P.PPPP.P..PPPP.P.PPPPP").unwrap(),
        );

        for levels in [vec![0], vec![1], vec![2], vec![1, 2], vec![0, 1, 2]] {
            let grid = CellGrid::create(octree.clone()).levels(&levels).build();
            assert_eq!(grid.len(), octree.num_non_phantom_nodes_in(&levels));
        }
    }

    #[test]
    fn test_enumeration_index_round_trip() {
        let octree = Arc::new(CellOctree::from_descriptor("X|........").unwrap());
        let grid = CellGrid::create(octree.clone()).levels(&[1]).build();

        assert_eq!(grid.len(), 8);

        for (grid_cell, tree_cell) in grid.iter().zip(octree.horizontal_range(1)) {
            assert_eq!(grid.enumeration_index(&tree_cell), grid_cell.ordinal());
            assert_eq!(
                grid_cell.morton_key().bits(),
                tree_cell.morton_key().bits()
            );
            assert_eq!(grid_cell.level(), tree_cell.level());
            assert_eq!(grid_cell.center(), tree_cell.center());
            assert_eq!(
                grid_cell.bounding_box().min_corner(),
                tree_cell.bounding_box().min_corner()
            );
            assert_eq!(
                grid_cell.bounding_box().max_corner(),
                tree_cell.bounding_box().max_corner()
            );

            let view = grid_cell.cell_view().unwrap();
            assert_eq!(view.stream_index(), tree_cell.stream_index());
        }
    }

    #[test]
    fn test_enumeration_index_of_phantom() {
        let octree = Arc::new(CellOctree::from_descriptor("R|P.......").unwrap());
        let grid = CellGrid::create(octree.clone()).build();

        // The phantom's slot keeps the sentinel.
        assert_eq!(grid.enumeration_index_of_stream(1), NOT_ENUMERATED);

        let cursor = crate::cursor::OctreeCursor::with_path(&octree, vec![0, 1]);
        assert!(cursor.current_node().unwrap().is_phantom());
    }

    #[test]
    fn test_unknown_offset_is_rejected() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree).build();

        assert!(matches!(
            grid.neighbor_indices([-1, 0, 0]),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            grid.neighbor_indices([1, 0, 0]),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn test_cell_out_of_range() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree).levels(&[1]).build();

        assert!(grid.cell(7).is_ok());
        assert!(matches!(grid.cell(8), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn test_face_neighbors() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree)
            .neighborhood(&FACE_NEIGHBORHOOD)
            .build();

        assert_eq!(
            neighbor_bits(&grid, [-1, 0, 0]),
            vec![0, 0, 0o10, 0, 0o12, 0, 0o14, 0, 0o16]
        );
        assert_eq!(
            neighbor_bits(&grid, [1, 0, 0]),
            vec![0, 0o11, 0, 0o13, 0, 0o15, 0, 0o17, 0]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, -1, 0]),
            vec![0, 0, 0, 0o10, 0o11, 0, 0, 0o14, 0o15]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 1, 0]),
            vec![0, 0o12, 0o13, 0, 0, 0o16, 0o17, 0, 0]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 0, -1]),
            vec![0, 0, 0, 0, 0, 0o10, 0o11, 0o12, 0o13]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 0, 1]),
            vec![0, 0o14, 0o15, 0o16, 0o17, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_diagonal_neighbors_without_periodicity() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree)
            .levels(&[1])
            .neighborhood(&[[-1, -1, 0], [1, 1, 0]])
            .periodicity(Periodicity::None)
            .build();

        assert_eq!(
            neighbor_bits(&grid, [-1, -1, 0]),
            vec![0, 0, 0, 0o10, 0, 0, 0, 0o14]
        );
        assert_eq!(
            neighbor_bits(&grid, [1, 1, 0]),
            vec![0o13, 0, 0, 0, 0o17, 0, 0, 0]
        );
    }

    #[test]
    fn test_partial_torus() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree)
            .levels(&[1])
            .neighborhood(&[[-1, -1, 0], [1, 1, 0], [0, 0, 1], [0, 0, -1]])
            .periodicity(Periodicity::Torus([true, true, false]))
            .build();

        assert_eq!(
            neighbor_bits(&grid, [-1, -1, 0]),
            vec![0o13, 0o12, 0o11, 0o10, 0o17, 0o16, 0o15, 0o14]
        );
        assert_eq!(
            neighbor_bits(&grid, [1, 1, 0]),
            vec![0o13, 0o12, 0o11, 0o10, 0o17, 0o16, 0o15, 0o14]
        );

        // The z axis is not periodic.
        assert_eq!(
            neighbor_bits(&grid, [0, 0, 1]),
            vec![0o14, 0o15, 0o16, 0o17, 0, 0, 0, 0]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 0, -1]),
            vec![0, 0, 0, 0, 0o10, 0o11, 0o12, 0o13]
        );
    }

    #[test]
    fn test_full_torus_includes_root_level() {
        let octree = Arc::new(CellOctree::from_descriptor("R|........").unwrap());
        let grid = CellGrid::create(octree)
            .neighborhood(&FACE_NEIGHBORHOOD)
            .periodicity(Periodicity::Torus([true, true, true]))
            .build();

        // The root wraps onto itself; each level-1 cell wraps onto its
        // opposite face which is its direct sibling.
        assert_eq!(
            neighbor_bits(&grid, [-1, 0, 0]),
            vec![0o1, 0o11, 0o10, 0o13, 0o12, 0o15, 0o14, 0o17, 0o16]
        );
        assert_eq!(
            neighbor_bits(&grid, [1, 0, 0]),
            vec![0o1, 0o11, 0o10, 0o13, 0o12, 0o15, 0o14, 0o17, 0o16]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, -1, 0]),
            vec![0o1, 0o12, 0o13, 0o10, 0o11, 0o16, 0o17, 0o14, 0o15]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 1, 0]),
            vec![0o1, 0o12, 0o13, 0o10, 0o11, 0o16, 0o17, 0o14, 0o15]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 0, -1]),
            vec![0o1, 0o14, 0o15, 0o16, 0o17, 0o10, 0o11, 0o12, 0o13]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 0, 1]),
            vec![0o1, 0o14, 0o15, 0o16, 0o17, 0o10, 0o11, 0o12, 0o13]
        );
    }

    #[test]
    fn test_torus_on_sparse_phantom_tree() {
        let octree = Arc::new(
            CellOctree::from_descriptor("X|XXXXPPPP|...PPPPP..P.PPPP.P..PPPP.P.PPPPP").unwrap(),
        );
        let grid = CellGrid::create(octree)
            .levels(&[2])
            .neighborhood(&FACE_NEIGHBORHOOD)
            .periodicity(Periodicity::Torus([true, true, false]))
            .build();

        assert_eq!(
            neighbor_bits(&grid, [1, 0, 0]),
            vec![0o101, 0o110, 0, 0o111, 0o100, 0o102, 0, 0o123, 0o132, 0, 0]
        );
        assert_eq!(
            neighbor_bits(&grid, [-1, 0, 0]),
            vec![0o111, 0o100, 0o113, 0o101, 0o110, 0, 0, 0, 0o122, 0, 0o123]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, 1, 0]),
            vec![0o102, 0, 0o120, 0, 0o113, 0, 0o122, 0o100, 0o101, 0o132, 0o110]
        );
        assert_eq!(
            neighbor_bits(&grid, [0, -1, 0]),
            vec![0o122, 0o123, 0o100, 0o132, 0, 0o111, 0o102, 0o120, 0, 0, 0o130]
        );
        assert_eq!(neighbor_bits(&grid, [0, 0, -1]), vec![0; 11]);
        assert_eq!(neighbor_bits(&grid, [0, 0, 1]), vec![0; 11]);
    }

    #[test]
    fn test_uniform_boundary_has_no_neighbor() {
        let octree = CellOctree::create_uniform_grid(2);
        let grid = CellGrid::create(octree)
            .neighborhood(&[[1, 0, 0]])
            .build();

        let table = grid.neighbor_indices([1, 0, 0]).unwrap();
        for (ordinal, key) in grid.morton_keys().iter().enumerate() {
            let expected_none = key.grid_coordinates()[0] == 7;
            assert_eq!(table[ordinal] == NO_NEIGHBOR, expected_none);
        }
    }

    #[test]
    fn test_adjacency_symmetry() {
        let octree = CellOctree::create_uniform_grid(2);
        let grid = CellGrid::create(octree)
            .neighborhood(&FACE_NEIGHBORHOOD)
            .build();

        for offset in FACE_NEIGHBORHOOD {
            let negated = [-offset[0], -offset[1], -offset[2]];
            let forward = grid.neighbor_indices(offset).unwrap();
            let backward = grid.neighbor_indices(negated).unwrap();

            for (ordinal, &neighbor) in forward.iter().enumerate() {
                if neighbor != NO_NEIGHBOR {
                    assert_eq!(backward[neighbor], ordinal);
                }
            }
        }
    }

    #[test]
    fn test_full_torus_is_six_regular() {
        let octree = CellOctree::create_uniform_grid(2);
        let grid = CellGrid::create(octree)
            .neighborhood(&FACE_NEIGHBORHOOD)
            .periodicity(Periodicity::Torus([true, true, true]))
            .build();

        assert_eq!(grid.len(), 64);

        for cell in &grid {
            for offset in FACE_NEIGHBORHOOD {
                assert!(cell.neighbor(offset).unwrap().is_some());
            }
        }
    }

    #[test]
    fn test_cross_level_coordinates_do_not_alias() {
        // The level-1 cell at (1, 0, 0) and the level-2 cell at (1, 0, 0)
        // share grid coordinates; only the same-level cell may win.
        let octree = Arc::new(CellOctree::from_descriptor("R|RR......|................").unwrap());
        let grid = CellGrid::create(octree)
            .levels(&[1, 2])
            .neighborhood(&[[1, 0, 0]])
            .build();

        let table = grid.neighbor_indices([1, 0, 0]).unwrap();
        for (ordinal, &neighbor) in table.iter().enumerate() {
            if neighbor != NO_NEIGHBOR {
                assert_eq!(
                    grid.morton_keys()[neighbor].level(),
                    grid.morton_keys()[ordinal].level()
                );
            }
        }
    }

    #[test]
    fn test_central_difference() {
        let octree =
            Arc::new(CellOctree::from_descriptor("X|XXXXPPPP|................................").unwrap());
        let grid = CellGrid::create(octree.clone())
            .levels(&[2])
            .neighborhood(&[[-1, 0, 0], [1, 0, 0]])
            .build();

        let mut values = vec![0.0; grid.len()];
        for cell in &grid {
            values[cell.ordinal()] = cell.center()[0] * cell.center()[0];
        }

        let spacing = octree.geometry().dx(2);
        let mut derivative = vec![0.0; grid.len()];
        for cell in &grid {
            let west = cell.neighbor([-1, 0, 0]).unwrap();
            let east = cell.neighbor([1, 0, 0]).unwrap();

            if let (Some(west), Some(east)) = (west, east) {
                derivative[cell.ordinal()] =
                    (values[east.ordinal()] - values[west.ordinal()]) / (2.0 * spacing);
            }
        }

        for cell in &grid {
            let has_both = cell.neighbor([-1, 0, 0]).unwrap().is_some()
                && cell.neighbor([1, 0, 0]).unwrap().is_some();
            if has_both {
                let expected = 2.0 * cell.center()[0];
                assert!((derivative[cell.ordinal()] - expected).abs() <= 1e-12);
            }
        }
    }
}
