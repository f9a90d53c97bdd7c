//! Geometry information: the Cartesian embedding of an octree and
//! axis-aligned box utilities.

use crate::morton::MortonKey;

/// Cartesian embedding of an octree: an origin point and the side length of
/// the cubic domain.
///
/// All cell geometry is a pure function of `(origin, side_length, key)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeGeometry {
    origin: [f64; 3],
    side_length: f64,
}

impl Default for OctreeGeometry {
    /// The unit cube at the origin.
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            side_length: 1.0,
        }
    }
}

impl OctreeGeometry {
    /// Create a new geometry from an origin and a side length.
    pub fn new(origin: [f64; 3], side_length: f64) -> Self {
        Self {
            origin,
            side_length,
        }
    }

    /// The origin of the octree domain.
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// The side length of the octree domain.
    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    /// The side length of cells at the given level.
    pub fn dx(&self, level: usize) -> f64 {
        self.side_length / (1u64 << level) as f64
    }

    /// The extents of a cell at the given level.
    pub fn cell_extents(&self, level: usize) -> [f64; 3] {
        let d = self.dx(level);
        [d, d, d]
    }

    /// The minimum (left-front-bottom) corner of the given cell.
    pub fn cell_min_corner(&self, key: MortonKey) -> [f64; 3] {
        let length = self.dx(key.level());
        let coords = key.grid_coordinates();

        [
            self.origin[0] + length * coords[0] as f64,
            self.origin[1] + length * coords[1] as f64,
            self.origin[2] + length * coords[2] as f64,
        ]
    }

    /// The maximum (right-back-top) corner of the given cell.
    pub fn cell_max_corner(&self, key: MortonKey) -> [f64; 3] {
        let min = self.cell_min_corner(key);
        let extents = self.cell_extents(key.level());

        [min[0] + extents[0], min[1] + extents[1], min[2] + extents[2]]
    }

    /// The center of the given cell.
    pub fn cell_center(&self, key: MortonKey) -> [f64; 3] {
        let min = self.cell_min_corner(key);
        let max = self.cell_max_corner(key);

        [
            0.5 * (min[0] + max[0]),
            0.5 * (min[1] + max[1]),
            0.5 * (min[2] + max[2]),
        ]
    }

    /// The axis-aligned bounding box of the given cell.
    pub fn cell_bounding_box(&self, key: MortonKey) -> BoundingBox {
        BoundingBox::from_corners(self.cell_min_corner(key), self.cell_max_corner(key))
    }
}

/// An axis-aligned box in physical space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    coords: [f64; 6],
}

impl BoundingBox {
    /// Create a new box.
    ///
    /// The coordinates are given by `[xmin, ymin, zmin, xmax, ymax, zmax]`.
    pub fn new(coords: [f64; 6]) -> Self {
        Self { coords }
    }

    /// Create a new box from its minimum and maximum corners.
    pub fn from_corners(min_corner: [f64; 3], max_corner: [f64; 3]) -> Self {
        Self {
            coords: [
                min_corner[0],
                min_corner[1],
                min_corner[2],
                max_corner[0],
                max_corner[1],
                max_corner[2],
            ],
        }
    }

    /// Return coordinates as `[xmin, ymin, zmin, xmax, ymax, zmax]`.
    pub fn coordinates(&self) -> [f64; 6] {
        self.coords
    }

    /// The minimum corner of the box.
    pub fn min_corner(&self) -> [f64; 3] {
        let [xmin, ymin, zmin, _, _, _] = self.coords;
        [xmin, ymin, zmin]
    }

    /// The maximum corner of the box.
    pub fn max_corner(&self) -> [f64; 3] {
        let [_, _, _, xmax, ymax, zmax] = self.coords;
        [xmax, ymax, zmax]
    }

    /// The center of the box.
    pub fn center(&self) -> [f64; 3] {
        let min = self.min_corner();
        let max = self.max_corner();
        [
            0.5 * (min[0] + max[0]),
            0.5 * (min[1] + max[1]),
            0.5 * (min[2] + max[2]),
        ]
    }

    /// The extents of the box along each axis.
    pub fn extents(&self) -> [f64; 3] {
        let [xmin, ymin, zmin, xmax, ymax, zmax] = self.coords;
        [xmax - xmin, ymax - ymin, zmax - zmin]
    }

    /// The volume of the box.
    pub fn volume(&self) -> f64 {
        let [ex, ey, ez] = self.extents();
        ex * ey * ez
    }

    /// Map a point from the reference box `[0, 1]^3` to this box.
    pub fn reference_to_physical(&self, point: [f64; 3]) -> [f64; 3] {
        let [xmin, ymin, zmin, xmax, ymax, zmax] = self.coords;

        [
            xmin + (xmax - xmin) * point[0],
            ymin + (ymax - ymin) * point[1],
            zmin + (zmax - zmin) * point[2],
        ]
    }

    /// Map a point from this box to the reference box `[0, 1]^3`.
    pub fn physical_to_reference(&self, point: [f64; 3]) -> [f64; 3] {
        let [xmin, ymin, zmin, xmax, ymax, zmax] = self.coords;

        [
            (point[0] - xmin) / (xmax - xmin),
            (point[1] - ymin) / (ymax - ymin),
            (point[2] - zmin) / (zmax - zmin),
        ]
    }

    /// Return an ordered list of corners of the box.
    ///
    /// The ordering of the corners on the unit cube is
    /// [0, 0, 0]
    /// [1, 0, 0]
    /// [1, 1, 0]
    /// [0, 1, 0]
    /// [0, 0, 1]
    /// [1, 0, 1]
    /// [1, 1, 1]
    /// [0, 1, 1]
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let reference_points = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];

        reference_points.map(|point| self.reference_to_physical(point))
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [xmin, ymin, zmin, xmax, ymax, zmax] = self.coords;

        write!(
            f,
            "(xmin: {}, ymin: {}, zmin: {}, xmax: {}, ymax: {}, zmax: {})",
            xmin, ymin, zmin, xmax, ymax, zmax
        )
    }
}

/// Partially periodic cuboid volume exposing periodic point mapping and
/// distance computations.
///
/// Independent of the octree itself; distances use the minimum-image
/// convention on each periodic axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeriodicBox {
    min_corner: [f64; 3],
    max_corner: [f64; 3],
    periodicity: [bool; 3],
}

impl PeriodicBox {
    /// Create a periodic box from its corners and per-axis periodicity flags.
    pub fn new(min_corner: [f64; 3], max_corner: [f64; 3], periodicity: [bool; 3]) -> Self {
        Self {
            min_corner,
            max_corner,
            periodicity,
        }
    }

    /// The box's minimum (left-front-bottom) corner.
    pub fn min_corner(&self) -> [f64; 3] {
        self.min_corner
    }

    /// The box's maximum (right-back-top) corner.
    pub fn max_corner(&self) -> [f64; 3] {
        self.max_corner
    }

    /// The box's periodicity in x-, y- and z-direction.
    pub fn periodicity(&self) -> [bool; 3] {
        self.periodicity
    }

    /// Map a point in 3D space to its image with respect to this periodic box.
    ///
    /// Non-periodic axes pass through unchanged.
    pub fn map_into_box(&self, point: [f64; 3]) -> [f64; 3] {
        let map_to_interval = |t: f64, lower: f64, upper: f64| {
            let interval_size = upper - lower;
            let t_normalized = (t - lower) / interval_size;
            let t_in_unit_interval = t_normalized - t_normalized.floor();
            lower + t_in_unit_interval * interval_size
        };

        let mut mapped = point;
        for axis in 0..3 {
            if self.periodicity[axis] {
                mapped[axis] =
                    map_to_interval(point[axis], self.min_corner[axis], self.max_corner[axis]);
            }
        }
        mapped
    }

    /// Compute the square Euclidean distance of two points with respect to
    /// the periodic box.
    ///
    /// Results are undefined for points outside of the box. Transform them
    /// into the box using [`map_into_box`](Self::map_into_box) first.
    pub fn sqr_distance(&self, point_a: [f64; 3], point_b: [f64; 3]) -> f64 {
        let periodic_distance = |axis: usize| {
            if !self.periodicity[axis] {
                return point_a[axis] - point_b[axis];
            }

            let lower = self.min_corner[axis];
            let upper = self.max_corner[axis];
            let p0 = point_a[axis];
            let p1 = point_b[axis];

            [
                (p0 - p1).abs(),
                (p0 - (lower - (upper - p1))).abs(),
                (p0 - (upper + (p1 - lower))).abs(),
            ]
            .into_iter()
            .fold(f64::MAX, f64::min)
        };

        let dx = periodic_distance(0);
        let dy = periodic_distance(1);
        let dz = periodic_distance(2);

        dx * dx + dy * dy + dz * dz
    }

    /// Compute the Euclidean distance of two points with respect to the
    /// periodic box.
    pub fn distance(&self, point_a: [f64; 3], point_b: [f64; 3]) -> f64 {
        self.sqr_distance(self.map_into_box(point_a), self.map_into_box(point_b))
            .sqrt()
    }
}
