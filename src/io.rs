//! Exporter plumbing for HyperTreeGrid-style file writers.
//!
//! The octree core does not define an on-disk format. [`HtgPayload`] carries
//! the level structure in the bit-exact layout a tree-grid exporter consumes,
//! [`HtgSink`] names the writer interface, and [`VtkSink`] is a concrete
//! legacy-VTK writer for inspection with standard tooling.

use std::path::{Path, PathBuf};

use itertools::repeat_n;

use crate::grid::CellGrid;
use crate::morton::MortonKey;
use crate::octree::{CellOctree, Node};
use crate::types::{Error, Result};

/// The level structure of an octree in exporter layout.
///
/// Descriptor bits are packed big-endian within each byte (bit 7 is the
/// first node of the group) and cover only the non-finest levels; mask bits
/// follow the same ordering and cover every node.
#[derive(Clone, Debug, PartialEq)]
pub struct HtgPayload {
    /// Domain extent along x as `[min, max]`.
    pub x_coords: [f64; 2],
    /// Domain extent along y as `[min, max]`.
    pub y_coords: [f64; 2],
    /// Domain extent along z as `[min, max]`.
    pub z_coords: [f64; 2],
    /// Number of nodes on each level.
    pub nodes_per_depth: Vec<usize>,
    /// One bit per non-finest node: is the node refined?
    pub descriptor: Vec<u8>,
    /// One bit per node: is the node's entire subtree phantom?
    pub mask: Vec<u8>,
    /// Depth of each node, in stream order.
    pub levels: Vec<u64>,
}

fn subtree_is_phantom(nodes: &[Node], node: Node) -> bool {
    if !node.is_phantom() {
        return false;
    }

    if node.is_refined() {
        let start = node.children_start_index();
        return nodes[start..start + 8]
            .iter()
            .all(|&child| subtree_is_phantom(nodes, child));
    }

    true
}

impl HtgPayload {
    /// Assemble the payload for the given octree.
    pub fn from_octree(octree: &CellOctree) -> Self {
        let nodes = octree.nodes_stream();
        let total_count = nodes.len();
        let finest_count = octree.levels()[octree.num_levels() - 1].1;
        let not_finest_count = total_count - finest_count;

        let root_min = octree.geometry().cell_min_corner(MortonKey::root());
        let root_max = octree.geometry().cell_max_corner(MortonKey::root());

        let nodes_per_depth = octree.levels().iter().map(|&(_, count)| count).collect();

        let levels = octree
            .levels()
            .iter()
            .enumerate()
            .flat_map(|(level, &(_, count))| repeat_n(level as u64, count))
            .collect();

        let mut descriptor = vec![0u8; not_finest_count.div_ceil(8)];
        let mut mask = vec![0u8; total_count.div_ceil(8)];

        for (order_index, &node) in nodes.iter().enumerate() {
            if !node.is_refined() && !node.is_phantom() {
                continue;
            }

            let byte_index = order_index >> 3;
            let bit_index = 7 - (order_index & 7);

            if node.is_refined() {
                descriptor[byte_index] |= 1 << bit_index;
            }
            if subtree_is_phantom(nodes, node) {
                mask[byte_index] |= 1 << bit_index;
            }
        }

        Self {
            x_coords: [root_min[0], root_max[0]],
            y_coords: [root_min[1], root_max[1]],
            z_coords: [root_min[2], root_max[2]],
            nodes_per_depth,
            descriptor,
            mask,
            levels,
        }
    }
}

/// A writer consuming the octree's level structure and per-node data.
///
/// The HDF5-backed grid file writer is an external collaborator implementing
/// this interface; [`VtkSink`] is the bundled concrete implementation.
pub trait HtgSink {
    /// Write the tree structure payload.
    fn write_tree(&mut self, payload: &HtgPayload) -> Result<()>;

    /// Write one named per-node data array, aligned to the node stream.
    fn write_cell_data(&mut self, name: &str, data: &[f64]) -> Result<()>;

    /// Flush the sink.
    fn finish(&mut self) -> Result<()>;
}

/// Exporter for per-cell payload vectors of a [`CellGrid`].
///
/// Writes the tree payload on creation. Payload vectors shorter than the
/// total node count are prepended with zeros so they align with the node
/// stream the sink writes.
pub struct CellGridExporter<'a, S: HtgSink> {
    grid: &'a CellGrid,
    sink: S,
}

impl<'a, S: HtgSink> CellGridExporter<'a, S> {
    /// Create an exporter over the grid, writing the tree payload to the sink.
    pub fn new(grid: &'a CellGrid, mut sink: S) -> Result<Self> {
        sink.write_tree(&HtgPayload::from_octree(grid.octree()))?;
        Ok(Self { grid, sink })
    }

    /// Write one named payload vector, zero-padding it to the node count.
    pub fn write_grid_vector(mut self, name: &str, mut data: Vec<f64>) -> Result<Self> {
        let total_count = self.grid.octree().num_nodes();
        if data.len() < total_count {
            let padding = total_count - data.len();
            data.splice(0..0, std::iter::repeat(0.0).take(padding));
        }

        self.sink.write_cell_data(name, &data)?;
        Ok(self)
    }

    /// Flush the sink.
    pub fn finish(mut self) -> Result<()> {
        self.sink.finish()
    }
}

// Morton key of every node in the stream, derived level by level; parents
// precede their children in stream order.
fn morton_keys_by_stream(octree: &CellOctree) -> Vec<MortonKey> {
    let mut keys = vec![MortonKey::root(); octree.num_nodes()];

    for (stream_index, node) in octree.nodes_stream().iter().enumerate() {
        if node.is_refined() {
            let key = keys[stream_index];
            let children_start = node.children_start_index();
            for branch in 0..8 {
                keys[children_start + branch] = key.child(branch as u64);
            }
        }
    }

    keys
}

/// A legacy-VTK ASCII writer.
///
/// Emits one hexahedron per node of the stream, so per-node data arrays stay
/// aligned; the tree payload contributes the per-node "level" array.
pub struct VtkSink {
    path: PathBuf,
    points: Vec<f64>,
    connectivity: Vec<u64>,
    offsets: Vec<u64>,
    num_cells: usize,
    cell_data: Vec<(String, Vec<f64>)>,
}

impl VtkSink {
    /// Create a sink writing the given octree's cells to `path`.
    pub fn create(octree: &CellOctree, path: impl Into<PathBuf>) -> Self {
        let keys = morton_keys_by_stream(octree);
        let num_cells = keys.len();

        // Each box has 8 corners with 3 coordinates each, hence 24 floats per
        // node. We don't mind doubly counted vertices from adjacent boxes.
        let mut points = Vec::with_capacity(24 * num_cells);
        let mut connectivity = Vec::with_capacity(8 * num_cells);
        let mut offsets = Vec::with_capacity(num_cells);

        let mut count = 0u64;
        for (key_index, &key) in keys.iter().enumerate() {
            let corners = octree.geometry().cell_bounding_box(key).corners();

            offsets.push(8 * (1 + key_index) as u64);
            points.extend_from_slice(bytemuck::cast_slice(&corners));

            for _ in 0..8 {
                connectivity.push(count);
                count += 1;
            }
        }

        Self {
            path: path.into(),
            points,
            connectivity,
            offsets,
            num_cells,
            cell_data: Vec::new(),
        }
    }
}

impl HtgSink for VtkSink {
    fn write_tree(&mut self, payload: &HtgPayload) -> Result<()> {
        // Legacy VTK has no tree encoding; the level array carries the depth
        // structure instead.
        let levels = payload.levels.iter().map(|&level| level as f64).collect();
        self.cell_data.push(("level".to_string(), levels));
        Ok(())
    }

    fn write_cell_data(&mut self, name: &str, data: &[f64]) -> Result<()> {
        if data.len() != self.num_cells {
            return Err(Error::InvalidArgument(format!(
                "cell data {name:?} holds {} values for {} cells",
                data.len(),
                self.num_cells
            )));
        }

        self.cell_data.push((name.to_string(), data.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        use vtkio::model::*;

        let cell_attributes = self
            .cell_data
            .drain(..)
            .map(|(name, data)| Attribute::scalars(name, 1).with_data(data))
            .collect();

        let vtk_file = vtkio::Vtk {
            version: Version::new((1, 0)),
            title: String::new(),
            byte_order: ByteOrder::LittleEndian,
            file_path: None,
            data: DataSet::inline(UnstructuredGridPiece {
                points: IOBuffer::F64(std::mem::take(&mut self.points)),
                cells: Cells {
                    cell_verts: VertexNumbers::XML {
                        connectivity: std::mem::take(&mut self.connectivity),
                        offsets: std::mem::take(&mut self.offsets),
                    },
                    types: vec![CellType::Hexahedron; self.num_cells],
                },
                data: Attributes {
                    point: vec![],
                    cell: cell_attributes,
                },
            }),
        };

        vtk_file
            .export_ascii(&self.path)
            .map_err(|e| crate::types::Error::Io(format!("cannot write {}: {e:?}", self.path.display())))
    }
}

/// Write an octree's structure and per-node level array to a VTK file.
pub fn export_octree(octree: &CellOctree, path: impl AsRef<Path>) -> Result<()> {
    let mut sink = VtkSink::create(octree, path.as_ref());
    sink.write_tree(&HtgPayload::from_octree(octree))?;
    sink.finish()
}

/// Create a [`CellGridExporter`] writing the grid's octree and payload
/// vectors to a VTK file.
pub fn export_cell_grid<'a>(
    grid: &'a CellGrid,
    path: impl AsRef<Path>,
) -> Result<CellGridExporter<'a, VtkSink>> {
    CellGridExporter::new(grid, VtkSink::create(grid.octree(), path.as_ref()))
}
