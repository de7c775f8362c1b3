//! Geometry helpers shared by the shadow and model code.
//!
//! World space throughout the crate is "pixel mercator": x and y are mercator
//! coordinates multiplied by the world size, z is in meters. Light matrices are
//! computed in `f64`; [`to_gpu_matrix`] is the single place where they are
//! narrowed to `f32` for upload.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};

use crate::transform::UnwrappedTileId;

/// Mean earth radius in meters.
pub const EARTH_RADIUS: f64 = 6371008.8;
/// Earth circumference at the equator in meters.
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS;
/// Tile-local coordinate extent used by vector and model tiles.
pub const EXTENT: f64 = 8192.0;
/// Size of a tile in pixels at its own zoom level.
pub const TILE_SIZE: f64 = 512.0;

pub fn circumference_at_latitude(lat: f64) -> f64 {
    EARTH_CIRCUMFERENCE * lat.to_radians().cos()
}

pub fn mercator_x_from_lng(lng: f64) -> f64 {
    (180.0 + lng) / 360.0
}

pub fn mercator_y_from_lat(lat: f64) -> f64 {
    (180.0
        - (180.0 / std::f64::consts::PI)
            * (std::f64::consts::FRAC_PI_4 + lat * std::f64::consts::PI / 360.0)
                .tan()
                .ln())
        / 360.0
}

pub fn mercator_z_from_altitude(altitude: f64, lat: f64) -> f64 {
    altitude / circumference_at_latitude(lat)
}

/// Narrow a double precision matrix to the layout uploaded to the GPU.
pub fn to_gpu_matrix(m: &Matrix4<f64>) -> [[f32; 4]; 4] {
    let mut out = [[0.0f32; 4]; 4];
    for (c, column) in out.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = m[c][r] as f32;
        }
    }
    out
}

/// Apply `m` to a point and divide by `w`.
pub fn transform_point(m: &Matrix4<f64>, p: Vector3<f64>) -> Vector3<f64> {
    let v = m * p.extend(1.0);
    let w = if v.w == 0.0 { 1.0 } else { v.w };
    Vector3::new(v.x / w, v.y / w, v.z / w)
}

/// Result of a volume overlap test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    Outside,
    Intersects,
    Contains,
}

/// Axis aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Aabb {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Bounds of a tile in mercator units, z in meters.
    pub fn from_tile(tile: &UnwrappedTileId, min_elevation: f64, max_elevation: f64) -> Self {
        let tiles = 2f64.powi(tile.canonical.z as i32);
        let x = tile.canonical.x as f64 + tile.wrap as f64 * tiles;
        let y = tile.canonical.y as f64;
        Self {
            min: Vector3::new(x / tiles, y / tiles, min_elevation),
            max: Vector3::new((x + 1.0) / tiles, (y + 1.0) / tiles, max_elevation),
        }
    }

    pub fn corners(&self) -> [Vector3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vector3::new(a.x, a.y, a.z),
            Vector3::new(b.x, a.y, a.z),
            Vector3::new(b.x, b.y, a.z),
            Vector3::new(a.x, b.y, a.z),
            Vector3::new(a.x, a.y, b.z),
            Vector3::new(b.x, a.y, b.z),
            Vector3::new(b.x, b.y, b.z),
            Vector3::new(a.x, b.y, b.z),
        ]
    }

    pub fn intersects_frustum(&self, frustum: &Frustum) -> Intersection {
        let corners = self.corners();
        let mut fully_inside = true;
        for plane in &frustum.planes {
            let normal = plane.truncate();
            let inside = corners
                .iter()
                .filter(|p| normal.dot(**p) + plane.w >= 0.0)
                .count();
            if inside == 0 {
                return Intersection::Outside;
            }
            if inside != corners.len() {
                fully_inside = false;
            }
        }
        if fully_inside {
            return Intersection::Contains;
        }
        // Planes alone accept boxes that sit next to a frustum corner
        for axis in 0..3 {
            let (mut lo, mut hi) = (f64::MAX, f64::MIN);
            for point in &frustum.points {
                let projected = point[axis] - self.min[axis];
                lo = lo.min(projected);
                hi = hi.max(projected);
            }
            if hi < 0.0 || lo > self.max[axis] - self.min[axis] {
                return Intersection::Outside;
            }
        }
        Intersection::Intersects
    }
}

/// A convex view volume described by its 8 corners and 6 inward-facing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    pub points: [Vector3<f64>; 8],
    /// `xyz` is the unit normal pointing into the volume, `w` the plane offset.
    pub planes: [Vector4<f64>; 6],
}

impl Frustum {
    /// Corners of the canonical clip volume: near face first, then far face.
    const CLIP_CORNERS: [[f64; 3]; 8] = [
        [-1.0, 1.0, -1.0],
        [1.0, 1.0, -1.0],
        [1.0, -1.0, -1.0],
        [-1.0, -1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, -1.0, 1.0],
        [-1.0, -1.0, 1.0],
    ];

    const PLANE_POINTS: [[usize; 3]; 6] = [
        [0, 1, 2], // near
        [6, 5, 4], // far
        [0, 3, 7], // left
        [2, 1, 5], // right
        [3, 2, 6], // bottom
        [0, 4, 5], // top
    ];

    /// Unproject the clip volume through `inv_proj`.
    ///
    /// x and y are divided by `world_size` and scaled by `2^zoom`; z is either
    /// kept in meters (`z_in_meters`) or scaled like x and y.
    pub fn from_inv_projection_matrix(
        inv_proj: &Matrix4<f64>,
        world_size: f64,
        zoom: f64,
        z_in_meters: bool,
    ) -> Self {
        let scale = 2f64.powf(zoom);
        let points = Self::CLIP_CORNERS.map(|[x, y, z]| {
            let s = inv_proj * Vector4::new(x, y, z, 1.0);
            let k = 1.0 / s.w / world_size * scale;
            let kz = if z_in_meters { 1.0 / s.w } else { k };
            Vector3::new(s.x * k, s.y * k, s.z * kz)
        });
        Self::from_points(points)
    }

    pub fn from_points(points: [Vector3<f64>; 8]) -> Self {
        let centroid = points.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, p| acc + *p) / 8.0;
        let planes = Self::PLANE_POINTS.map(|[i0, i1, i2]| {
            let a = points[i0] - points[i1];
            let b = points[i2] - points[i1];
            let cross = a.cross(b);
            let mut n = if cross.magnitude2() > 0.0 {
                cross.normalize()
            } else {
                cross
            };
            let mut d = -n.dot(points[i1]);
            // Orient every plane towards the inside of the volume
            if n.dot(centroid) + d < 0.0 {
                n = -n;
                d = -d;
            }
            n.extend(d)
        });
        Self { points, planes }
    }

    pub fn contains_point(&self, p: Vector3<f64>) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(p) + plane.w >= -1e-9)
    }
}
