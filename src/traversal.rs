//! Traversal strategies over a [`CellOctree`].
//!
//! A policy is a capability `advance(cursor)`; both bundled policies are
//! loops over cursor primitives, so traversal needs no recursion even at the
//! maximum depth. Phantom subtrees are skipped.

use crate::cursor::OctreeCursor;
use crate::octree::{CellOctree, CellView};

/// A strategy for advancing a cursor to the next cell of a traversal.
pub trait TraversalPolicy {
    /// Advance the cursor to the next non-phantom cell, or to the end
    /// position when the traversal is exhausted.
    fn advance(&self, cursor: &mut OctreeCursor<'_>);
}

/// Pre-order depth-first traversal over the full tree.
#[derive(Clone, Copy, Debug, Default)]
pub struct DfsPolicy;

impl TraversalPolicy for DfsPolicy {
    fn advance(&self, cursor: &mut OctreeCursor<'_>) {
        loop {
            if cursor.end() {
                return;
            }
            let Ok(node) = cursor.current_node() else {
                return;
            };

            if node.is_refined() {
                // Children first.
                cursor.descend();
            } else if !cursor.last_sibling() {
                cursor.next_sibling();
            } else {
                // No children and no further siblings: climb until an
                // ancestor still has one.
                loop {
                    cursor.ascend();
                    if cursor.end() {
                        return;
                    }
                    if !cursor.last_sibling() {
                        cursor.next_sibling();
                        break;
                    }
                }
            }

            match cursor.current_node() {
                Ok(node) if node.is_phantom() => continue,
                _ => return,
            }
        }
    }
}

/// Horizontal traversal over the cells of a single level.
#[derive(Clone, Copy, Debug, Default)]
pub struct HorizontalPolicy;

impl TraversalPolicy for HorizontalPolicy {
    fn advance(&self, cursor: &mut OctreeCursor<'_>) {
        let Some(initial_index) = cursor.current_stream_index() else {
            return;
        };
        // Nodes above the root sit in 8-groups starting at index 8k + 1. The
        // wrap at the root is harmless: the level-0 range ends immediately.
        let initial_group = initial_index.wrapping_sub(1) >> 3;

        loop {
            cursor.advance_stream_index();

            let Some(stream_index) = cursor.current_stream_index() else {
                return;
            };

            match cursor.current_node() {
                Ok(node) if !node.is_phantom() => {
                    // Crossing into another sibling group invalidates the
                    // upper levels of the path.
                    if stream_index.wrapping_sub(1) >> 3 != initial_group
                        && cursor.update_path(stream_index).is_err()
                    {
                        cursor.to_end();
                    }
                    return;
                }
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    }
}

/// A forward iterator over the non-phantom cells of a traversal.
pub struct CellsIter<'a, P: TraversalPolicy> {
    cursor: OctreeCursor<'a>,
    policy: P,
}

impl<'a, P: TraversalPolicy> CellsIter<'a, P> {
    /// Create an iterator from a start cursor, skipping leading phantoms.
    pub fn new(mut cursor: OctreeCursor<'a>, policy: P) -> Self {
        while let Ok(node) = cursor.current_node() {
            if !node.is_phantom() {
                break;
            }
            policy.advance(&mut cursor);
        }
        Self { cursor, policy }
    }
}

impl<P: TraversalPolicy> Iterator for CellsIter<'_, P> {
    type Item = CellView;

    fn next(&mut self) -> Option<CellView> {
        let cell = self.cursor.current_cell()?;
        self.policy.advance(&mut self.cursor);
        Some(cell)
    }
}

/// A range of octree cells under a traversal policy.
pub struct CellsRange<'a, P: TraversalPolicy> {
    start: OctreeCursor<'a>,
    policy: P,
}

impl<'a, P: TraversalPolicy> CellsRange<'a, P> {
    /// Create a range starting at the given cursor.
    pub fn new(start: OctreeCursor<'a>, policy: P) -> Self {
        Self { start, policy }
    }

    /// Iterate the range without consuming it.
    pub fn iter(&self) -> CellsIter<'a, P>
    where
        P: Copy,
    {
        CellsIter::new(self.start.clone(), self.policy)
    }
}

impl<'a, P: TraversalPolicy> IntoIterator for CellsRange<'a, P> {
    type Item = CellView;
    type IntoIter = CellsIter<'a, P>;

    fn into_iter(self) -> CellsIter<'a, P> {
        CellsIter::new(self.start, self.policy)
    }
}

impl CellOctree {
    /// The pre-order depth-first range over all non-phantom cells.
    pub fn pre_order_depth_first_range(&self) -> CellsRange<'_, DfsPolicy> {
        CellsRange::new(OctreeCursor::new(self), DfsPolicy)
    }

    /// The horizontal range over the non-phantom cells of a single level.
    ///
    /// A level outside the tree yields an empty range.
    pub fn horizontal_range(&self, level: usize) -> CellsRange<'_, HorizontalPolicy> {
        if level >= self.num_levels() {
            let mut end = OctreeCursor::new(self);
            end.to_end();
            return CellsRange::new(end, HorizontalPolicy);
        }

        // Anchor the start cursor on the first node of the level, with the
        // upper path entries naming its ancestors.
        let start_index = self.levels()[level].0;
        let mut start = OctreeCursor::with_path(self, vec![0; level + 1]);
        if start.update_path(start_index).is_err() {
            start.to_end();
        }

        CellsRange::new(start, HorizontalPolicy)
    }
}
