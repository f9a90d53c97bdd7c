//! Definition of a linear cell octree.
//!
//! The octree is stored as a level-grouped stream of bit-packed nodes
//! together with a `(start, count)` table per level. The eight children of a
//! refined node occupy a contiguous group in the next level's range.

use std::sync::Arc;

use tracing::debug;

use crate::geometry::{BoundingBox, OctreeGeometry};
use crate::morton::MortonKey;
use crate::types::{Error, Result};

const PHANTOM_BIT_MASK: u64 = 1 << 63;
const REFINED_BIT_MASK: u64 = 1 << 62;
const CHILDREN_INDEX_MASK: u64 = !(PHANTOM_BIT_MASK | REFINED_BIT_MASK);

/// A bit-packed octree node.
///
/// One 64-bit word: bit 63 is the phantom flag, bit 62 the refined flag and
/// the low 62 bits hold the stream index of the node's first child. The
/// children index is only meaningful while the refined flag is set. The
/// packing is load-bearing for cache density during traversal; do not expand
/// it into separate fields.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Node {
    data: u64,
}

impl Node {
    /// Create a node from its flags and the stream index of its first child.
    pub fn new(refined: bool, phantom: bool, children_start: usize) -> Self {
        Self {
            data: (children_start as u64 & CHILDREN_INDEX_MASK)
                | ((refined as u64) << 62)
                | ((phantom as u64) << 63),
        }
    }

    /// Whether this node has eight children on the next level.
    pub fn is_refined(&self) -> bool {
        self.data & REFINED_BIT_MASK != 0
    }

    /// Whether this node is a structural placeholder rather than a real cell.
    pub fn is_phantom(&self) -> bool {
        self.data & PHANTOM_BIT_MASK != 0
    }

    /// Set the refined flag, preserving the phantom flag and children index.
    pub fn set_refined(&mut self, refined: bool) {
        self.data = if refined {
            self.data | REFINED_BIT_MASK
        } else {
            self.data & !REFINED_BIT_MASK
        };
    }

    /// Set the phantom flag, preserving the refined flag and children index.
    pub fn set_phantom(&mut self, phantom: bool) {
        self.data = if phantom {
            self.data | PHANTOM_BIT_MASK
        } else {
            self.data & !PHANTOM_BIT_MASK
        };
    }

    /// Stream index of the node's first child.
    pub fn children_start_index(&self) -> usize {
        (self.data & CHILDREN_INDEX_MASK) as usize
    }

    /// Set the children start index, preserving both flag bits.
    pub fn set_children_start_index(&mut self, index: usize) {
        self.data = (self.data & !CHILDREN_INDEX_MASK) | (index as u64 & CHILDREN_INDEX_MASK);
    }

    /// Stream index of the child on the given branch `0..=7`.
    pub fn child_index(&self, branch: usize) -> usize {
        self.children_start_index() + branch
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("refined", &self.is_refined())
            .field("phantom", &self.is_phantom())
            .field("children_start", &self.children_start_index())
            .finish()
    }
}

/// A transient snapshot of a single cell.
///
/// Bundles the node flags, the octree geometry, the cell's Morton key and
/// its stream index. Construction is cheap and the view does not borrow the
/// octree.
#[derive(Clone, Copy, Debug)]
pub struct CellView {
    stream_index: usize,
    node: Node,
    geometry: OctreeGeometry,
    key: MortonKey,
}

impl CellView {
    pub(crate) fn new(
        node: Node,
        geometry: OctreeGeometry,
        key: MortonKey,
        stream_index: usize,
    ) -> Self {
        Self {
            stream_index,
            node,
            geometry,
            key,
        }
    }

    /// The Morton key of the cell.
    pub fn morton_key(&self) -> MortonKey {
        self.key
    }

    /// Whether the cell is the root.
    pub fn is_root(&self) -> bool {
        self.key.is_root()
    }

    /// Whether the cell's node is refined.
    pub fn is_refined(&self) -> bool {
        self.node.is_refined()
    }

    /// Whether the cell's node is a phantom.
    pub fn is_phantom(&self) -> bool {
        self.node.is_phantom()
    }

    /// The cell's refinement level.
    pub fn level(&self) -> usize {
        self.key.level()
    }

    /// Position of the cell's node in the level-grouped node stream.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// The Cartesian center of the cell.
    pub fn center(&self) -> [f64; 3] {
        self.geometry.cell_center(self.key)
    }

    /// The Cartesian bounding box of the cell.
    pub fn bounding_box(&self) -> BoundingBox {
        self.geometry.cell_bounding_box(self.key)
    }
}

/// A linear octree over a cubic domain.
///
/// Constructed once, from a textual descriptor or the uniform-grid factory,
/// and immutable afterwards. Any number of readers may share a store.
#[derive(Clone, Debug)]
pub struct CellOctree {
    nodes: Vec<Node>,
    /// `(start, count)` of each level's range in `nodes`.
    levels: Vec<(usize, usize)>,
    geometry: OctreeGeometry,
}

impl Default for CellOctree {
    /// A tree holding a single unrefined, non-phantom root.
    fn default() -> Self {
        Self {
            nodes: vec![Node::default()],
            levels: vec![(0, 1)],
            geometry: OctreeGeometry::default(),
        }
    }
}

// Rejects descriptors with foreign characters or a node count that cannot
// come from one root plus eight children per refined node.
fn validate_descriptor(descriptor: &str) -> Result<()> {
    let mut num_refined: usize = 0;
    let mut num_total: usize = 0;

    for c in descriptor.chars() {
        match c {
            '|' => continue,
            '.' | 'P' => num_total += 1,
            'R' | 'X' => {
                num_refined += 1;
                num_total += 1;
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "invalid character {c:?} in descriptor"
                )))
            }
        }
    }

    if num_total != 8 * num_refined + 1 {
        return Err(Error::InvalidArgument(format!(
            "descriptor holds {num_total} nodes but {num_refined} refined nodes require {}",
            8 * num_refined + 1
        )));
    }

    Ok(())
}

impl CellOctree {
    /// A tree with the given geometry holding a single unrefined root.
    pub fn with_geometry(geometry: OctreeGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Build a tree from a textual descriptor.
    ///
    /// Each node is one of `.` (unrefined), `R` (refined), `P` (unrefined
    /// phantom) or `X` (refined phantom); `|` separates levels. Every `|`
    /// must be followed by exactly eight nodes per refined node of the
    /// previous level, in the order the refined nodes appeared.
    ///
    /// Fails with [`Error::InvalidArgument`] on any malformed descriptor.
    pub fn from_descriptor(descriptor: &str) -> Result<Self> {
        if descriptor.is_empty() {
            return Err(Error::InvalidArgument("descriptor is empty".to_string()));
        }
        validate_descriptor(descriptor)?;

        let mut nodes: Vec<Node> = Vec::new();
        let mut levels: Vec<(usize, usize)> = Vec::new();
        let mut pending_refined: Vec<usize> = Vec::new();
        let mut level_start = 0;
        let mut expected_count = 1;

        for c in descriptor.chars() {
            if c == '|' {
                let count = nodes.len() - level_start;
                if count != expected_count {
                    return Err(Error::InvalidArgument(format!(
                        "level {} holds {count} nodes, expected {expected_count}",
                        levels.len()
                    )));
                }
                if pending_refined.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "level separator after level {} which has no refined nodes",
                        levels.len()
                    )));
                }

                levels.push((level_start, count));
                expected_count = 8 * pending_refined.len();
                level_start = nodes.len();

                // The i-th refined node of the closed level owns the i-th
                // 8-group of the new level.
                for (group, &node_index) in pending_refined.iter().enumerate() {
                    nodes[node_index].set_children_start_index(level_start + 8 * group);
                }
                pending_refined.clear();
            } else {
                let refined = c == 'R' || c == 'X';
                let phantom = c == 'P' || c == 'X';
                nodes.push(Node::new(refined, phantom, 0));
                if refined {
                    pending_refined.push(nodes.len() - 1);
                }
            }
        }

        let count = nodes.len() - level_start;
        if count != expected_count {
            return Err(Error::InvalidArgument(format!(
                "level {} holds {count} nodes, expected {expected_count}",
                levels.len()
            )));
        }
        if !pending_refined.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "{} refined nodes on the finest level are missing their children",
                pending_refined.len()
            )));
        }
        levels.push((level_start, count));

        debug!(
            nodes = nodes.len(),
            levels = levels.len(),
            "constructed octree from descriptor"
        );

        Ok(Self {
            nodes,
            levels,
            geometry: OctreeGeometry::default(),
        })
    }

    /// Build a uniformly refined tree of the given leaf level over the unit
    /// cube.
    ///
    /// Levels above the leaf level consist of refined phantoms only, so the
    /// leaves are the only real cells.
    pub fn create_uniform_grid(level: usize) -> Arc<Self> {
        Self::create_uniform_grid_with_geometry(OctreeGeometry::default(), level)
    }

    /// Build a uniformly refined tree of the given leaf level with the given
    /// geometry.
    pub fn create_uniform_grid_with_geometry(geometry: OctreeGeometry, level: usize) -> Arc<Self> {
        let mut levels = Vec::with_capacity(level + 1);
        let (mut start, mut count) = (0usize, 1usize);
        levels.push((start, count));
        for _ in 0..level {
            (start, count) = (start + count, count << 3);
            levels.push((start, count));
        }

        let num_nodes = start + count;
        let mut nodes = Vec::with_capacity(num_nodes);

        let mut children_start = 1;
        while children_start < num_nodes {
            nodes.push(Node::new(true, true, children_start));
            children_start += 8;
        }
        nodes.resize(num_nodes, Node::default());

        debug!(level, nodes = num_nodes, "constructed uniform grid");

        Arc::new(Self {
            nodes,
            levels,
            geometry,
        })
    }

    /// Total number of nodes in the stream, phantoms included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes on the given level; `0` if the level does not exist.
    pub fn num_nodes_at(&self, level: usize) -> usize {
        match self.levels.get(level) {
            Some(&(_, count)) => count,
            None => 0,
        }
    }

    /// Number of levels, counting the root level.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of non-phantom nodes on the given level.
    pub fn num_non_phantom_nodes_at(&self, level: usize) -> usize {
        self.level_nodes(level)
            .iter()
            .filter(|node| !node.is_phantom())
            .count()
    }

    /// Number of non-phantom nodes on each of the given levels.
    pub fn num_non_phantom_nodes_in(&self, levels: &[usize]) -> usize {
        levels
            .iter()
            .map(|&level| self.num_non_phantom_nodes_at(level))
            .sum()
    }

    /// Number of non-phantom nodes in the whole tree.
    pub fn num_non_phantom_nodes(&self) -> usize {
        (0..self.levels.len())
            .map(|level| self.num_non_phantom_nodes_at(level))
            .sum()
    }

    /// The complete level-grouped node stream.
    pub fn nodes_stream(&self) -> &[Node] {
        &self.nodes
    }

    /// The node stream of a single level; empty if the level does not exist.
    pub fn level_nodes(&self, level: usize) -> &[Node] {
        match self.levels.get(level) {
            Some(&(start, count)) => &self.nodes[start..start + count],
            None => &[],
        }
    }

    /// The `(start, count)` table of the level ranges.
    pub fn levels(&self) -> &[(usize, usize)] {
        &self.levels
    }

    /// The Cartesian embedding of the tree.
    pub fn geometry(&self) -> &OctreeGeometry {
        &self.geometry
    }

    /// Look up the cell named by a Morton key.
    ///
    /// A cell exists iff every node along the key's path from the root is
    /// refined and the final node is not a phantom. Returns `None` otherwise;
    /// a phantom root hides the root cell itself.
    pub fn get_cell(&self, key: MortonKey) -> Option<CellView> {
        let root = self.nodes[0];
        if key.is_root() {
            if root.is_phantom() {
                return None;
            }
            return Some(CellView::new(root, self.geometry, key, 0));
        }

        if key.level() >= self.num_levels() {
            return None;
        }

        let mut index = 0;
        let mut current = root;
        for choice in key.path() {
            if !current.is_refined() {
                return None;
            }
            index = current.child_index(choice as usize);
            current = *self.nodes.get(index)?;
        }

        if current.is_phantom() {
            return None;
        }
        Some(CellView::new(current, self.geometry, key, index))
    }

    /// Whether the cell named by a Morton key exists.
    pub fn cell_exists(&self, key: MortonKey) -> bool {
        self.get_cell(key).is_some()
    }

    /// The root cell, unless the root is a phantom.
    pub fn root_cell(&self) -> Option<CellView> {
        self.get_cell(MortonKey::root())
    }
}
