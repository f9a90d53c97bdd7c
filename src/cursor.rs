//! An explicit position in the octree as a per-level path of stream indices.

use crate::morton::MortonKey;
use crate::octree::{CellOctree, CellView, Node};
use crate::types::{Error, MortonBits, Result};

/// A cursor into a [`CellOctree`].
///
/// The cursor's path holds one stream index per level from the root (always
/// index `0`) down to the current node; the empty path denotes the end
/// position. For each consecutive pair `(p, c)` the node at `p` is refined
/// and `c` lies within its children group.
#[derive(Clone, Debug)]
pub struct OctreeCursor<'a> {
    octree: &'a CellOctree,
    path: Vec<usize>,
}

impl<'a> OctreeCursor<'a> {
    /// A cursor positioned at the root.
    pub fn new(octree: &'a CellOctree) -> Self {
        Self {
            octree,
            path: vec![0],
        }
    }

    /// A cursor with an explicit path; an empty path creates an end cursor.
    pub fn with_path(octree: &'a CellOctree, path: Vec<usize>) -> Self {
        Self { octree, path }
    }

    /// The octree this cursor walks.
    pub fn octree(&self) -> &'a CellOctree {
        self.octree
    }

    /// The per-level stream indices from the root to the current node.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Whether the cursor is at the end position.
    pub fn end(&self) -> bool {
        self.path.is_empty()
    }

    /// The level of the current node; meaningless at the end position.
    pub fn current_level(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// The stream index of the current node, `None` at the end position.
    pub fn current_stream_index(&self) -> Option<usize> {
        self.path.last().copied()
    }

    /// The current node.
    ///
    /// Fails with [`Error::LogicError`] at the end position and with
    /// [`Error::OutOfRange`] when the path points outside the octree.
    pub fn current_node(&self) -> Result<Node> {
        let Some(&stream_index) = self.path.last() else {
            return Err(Error::LogicError("no current node, path is empty".to_string()));
        };

        let level = self.current_level();
        let Some(&(level_start, level_size)) = self.octree.levels().get(level) else {
            return Err(Error::OutOfRange(format!(
                "current level {level} exceeds the maximum level {}",
                self.octree.num_levels() - 1
            )));
        };

        let index_in_level = stream_index.wrapping_sub(level_start);
        if index_in_level >= level_size {
            return Err(Error::OutOfRange(format!(
                "current index {index_in_level} exceeds the size {level_size} of level {level}"
            )));
        }

        Ok(self.octree.nodes_stream()[stream_index])
    }

    /// A view of the current cell, `None` at the end position or when the
    /// current node does not name a real cell.
    pub fn current_cell(&self) -> Option<CellView> {
        if self.end() {
            return None;
        }
        self.octree.get_cell(self.morton_index())
    }

    /// Whether the current node is the first of its sibling group. True at
    /// the root and at the end position.
    pub fn first_sibling(&self) -> bool {
        match self.path.last() {
            Some(&stream_index) if self.path.len() > 1 => stream_index & 7 == 1,
            _ => true,
        }
    }

    /// Whether the current node is the last of its sibling group. True at
    /// the root and at the end position.
    pub fn last_sibling(&self) -> bool {
        match self.path.last() {
            Some(&stream_index) if self.path.len() > 1 => stream_index & 7 == 0,
            _ => true,
        }
    }

    /// Index of the current node within its sibling group; `0` at the root.
    pub fn sibling_index(&self) -> usize {
        match self.path.last() {
            Some(&stream_index) if self.path.len() > 1 => stream_index.wrapping_sub(1) & 7,
            _ => 0,
        }
    }

    /// Reconstruct the Morton key of the current node from the path.
    ///
    /// Nodes above the root sit in 8-groups starting at stream indices of the
    /// form `8k + 1`, so the low three bits of `index - 1` are the child
    /// selector.
    pub fn morton_index(&self) -> MortonKey {
        let mut bits: MortonBits = 1;
        for &stream_index in self.path.iter().skip(1) {
            bits = (bits << 3) | (stream_index.wrapping_sub(1) & 7) as MortonBits;
        }
        MortonKey::new(bits)
    }

    /// Move to the parent node; a no-op at the end position.
    pub fn ascend(&mut self) {
        self.path.pop();
    }

    /// Move to the first child of the current node, if it has children.
    pub fn descend(&mut self) {
        if let Ok(node) = self.current_node() {
            if node.is_refined() {
                self.path.push(node.children_start_index());
            }
        }
    }

    /// Move to the child on the given branch of the current node, if it has
    /// children.
    ///
    /// Fails with [`Error::OutOfRange`] for a branch of 8 or more.
    pub fn descend_to(&mut self, branch: usize) -> Result<()> {
        if branch >= 8 {
            return Err(Error::OutOfRange(format!(
                "child index {branch} exceeds the range of 0 to 7"
            )));
        }

        if let Ok(node) = self.current_node() {
            if node.is_refined() {
                self.path.push(node.child_index(branch));
            }
        }
        Ok(())
    }

    /// Move to the previous sibling unless the current node is the first of
    /// its group.
    pub fn previous_sibling(&mut self) {
        if !self.first_sibling() {
            if let Some(last) = self.path.last_mut() {
                *last -= 1;
            }
        }
    }

    /// Move to the next sibling unless the current node is the last of its
    /// group.
    pub fn next_sibling(&mut self) {
        if !self.last_sibling() {
            if let Some(last) = self.path.last_mut() {
                *last += 1;
            }
        }
    }

    /// Move to the sibling with the given index within the current group.
    ///
    /// Fails with [`Error::OutOfRange`] for an index of 8 or more, or for a
    /// nonzero index at the root.
    pub fn to_sibling(&mut self, sibling_index: usize) -> Result<()> {
        if self.path.len() == 1 {
            if sibling_index != 0 {
                return Err(Error::OutOfRange(format!(
                    "nonzero sibling index {sibling_index} not allowed at the root"
                )));
            }
            return Ok(());
        }
        if sibling_index >= 8 {
            return Err(Error::OutOfRange(format!(
                "sibling index {sibling_index} exceeds the range of 0 to 7"
            )));
        }

        if let [.., parent_index, last] = &mut self.path[..] {
            let parent = self.octree.nodes_stream()[*parent_index];
            *last = parent.child_index(sibling_index);
        }
        Ok(())
    }

    /// Advance the stream index of the current node by one, moving the cursor
    /// to the end position when it leaves the current level's range.
    pub fn advance_stream_index(&mut self) {
        let level = self.current_level();
        let Some(last) = self.path.last_mut() else {
            return;
        };

        *last += 1;
        let (level_start, level_size) = self.octree.levels()[level];
        if *last - level_start >= level_size {
            self.to_end();
        }
    }

    /// Rebuild the path for the given stream index at the current level.
    ///
    /// At each upper level the nodes are scanned linearly for the refined
    /// parent whose children group contains the working index. A no-op at
    /// the end position.
    ///
    /// Fails with [`Error::LogicError`] when the current level does not exist
    /// or no parent can be found, and with [`Error::OutOfRange`] when the
    /// stream index lies outside the current level.
    pub fn update_path(&mut self, stream_index: usize) -> Result<()> {
        if self.end() {
            return Ok(());
        }

        let level = self.current_level();
        let Some(&(level_start, level_size)) = self.octree.levels().get(level) else {
            return Err(Error::LogicError(format!(
                "current level {level} exceeds the maximum level {}",
                self.octree.num_levels() - 1
            )));
        };

        let index_in_level = stream_index.wrapping_sub(level_start);
        if index_in_level >= level_size {
            return Err(Error::OutOfRange(format!(
                "stream index {stream_index} lies outside level {level}"
            )));
        }

        let mut working_index = stream_index;
        for current_level in (1..=level).rev() {
            self.path[current_level] = working_index;

            let parent_start = self.octree.levels()[current_level - 1].0;
            let parent_index = self
                .octree
                .level_nodes(current_level - 1)
                .iter()
                .position(|node| {
                    node.is_refined() && {
                        let children_start = node.children_start_index();
                        (children_start..children_start + 8).contains(&working_index)
                    }
                })
                .map(|offset| parent_start + offset);

            let Some(parent_index) = parent_index else {
                return Err(Error::LogicError(format!(
                    "no parent found for stream index {working_index} on level {current_level}"
                )));
            };

            working_index = parent_index;
        }

        Ok(())
    }

    /// Move the cursor to the end position.
    pub fn to_end(&mut self) {
        self.path.clear();
    }
}

impl PartialEq for OctreeCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.octree, other.octree)
            && self.path.len() == other.path.len()
            && (self.end() || self.path.last() == other.path.last())
    }
}
