//! A linear-octree spatial indexing and adjacency engine.
//!
//! This library provides a compact, level-grouped octree over a cubic domain
//! in three-dimensional Euclidean space, together with utility routines for
//! the Morton keys used for indexing it.
//!
//! An octree is a tree data structure in which each internal node has exactly
//! eight children; octrees are most often used to partition a
//! three-dimensional space by recursively subdividing it into eight octants.
//! Here every node is packed into a single 64-bit word carrying its
//! refinement flag, its phantom flag and the stream index of its children
//! group, and every cell is named by a [`MortonKey`]: a path-encoded 64-bit
//! integer supporting constant-time ancestor and descendant tests.
//!
//! Phantom nodes occupy slots in their 8-group for structural reasons but do
//! not represent real cells; both traversal strategies skip them. On top of
//! the tree, a [`CellGrid`] enumerates the non-phantom cells of selected
//! levels into a dense ordinal index space and precomputes constant-time
//! neighbor tables for a user-supplied set of offsets, optionally under
//! torus periodicity.
//!
//! ## Using the library
//!
//! A new octree is built either from a textual descriptor or from the
//! uniform-grid factory, and a grid is derived from it with a builder:
//!
//! ```
//! use amr_octree::{CellGrid, CellOctree, Periodicity};
//!
//! let octree = CellOctree::create_uniform_grid(3);
//! let grid = CellGrid::create(octree)
//!     .levels(&[3])
//!     .neighborhood(&[[-1, 0, 0], [1, 0, 0]])
//!     .periodicity(Periodicity::Torus([true, true, true]))
//!     .build();
//!
//! for cell in &grid {
//!     let east = cell.neighbor([1, 0, 0]).unwrap();
//!     assert!(east.is_some());
//! }
//! ```
//!
//! Octree stores and grids are immutable after construction; stores are
//! shared by reference count, so any number of grids and readers may use one
//! store without synchronization. Cursors, iterators and cell views are
//! transient observers.
#![cfg_attr(feature = "strict", deny(warnings), deny(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod constants;
pub mod cursor;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod morton;
pub mod octree;
pub mod traversal;
pub mod types;

pub use crate::constants::{MAX_DEPTH, NO_NEIGHBOR, NOT_ENUMERATED, NUM_CHILDREN};
pub use crate::cursor::OctreeCursor;
pub use crate::geometry::{BoundingBox, OctreeGeometry, PeriodicBox};
pub use crate::grid::{CellGrid, CellGridBuilder, GridCell, Periodicity};
pub use crate::morton::MortonKey;
pub use crate::octree::{CellOctree, CellView, Node};
pub use crate::traversal::{CellsIter, CellsRange, DfsPolicy, HorizontalPolicy, TraversalPolicy};
pub use crate::types::{AdjacencyOffset, Error, Result};
