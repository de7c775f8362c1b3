//! Map transform collaborator.
//!
//! The embedding renderer owns camera state, tile math and projections. This
//! module only describes what the shadow and model code needs from it.

use cgmath::{Matrix4, Vector2, Vector3};

use crate::math::{self, EXTENT, TILE_SIZE};

/// Tile address without world wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalTileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Tile address including the world copy it is rendered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnwrappedTileId {
    pub wrap: i32,
    pub canonical: CanonicalTileId,
}

impl UnwrappedTileId {
    pub fn new(wrap: i32, z: u8, x: u32, y: u32) -> Self {
        Self {
            wrap,
            canonical: CanonicalTileId { z, x, y },
        }
    }
}

/// Map projection the transform renders with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Mercator,
    Globe,
    Equirectangular,
}

impl ProjectionKind {
    /// Whether world z is expressed in meters rather than pixels.
    pub fn z_axis_in_meters(&self) -> bool {
        !matches!(self, ProjectionKind::Globe)
    }
}

/// Viewport padding in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EdgeInsets {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl EdgeInsets {
    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }

    pub fn is_symmetric(&self) -> bool {
        self.left == self.right && self.top == self.bottom
    }
}

/// Geographic position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Mercator coordinate in `[0, 1]` with z = 0.
    pub fn to_mercator(&self) -> Vector3<f64> {
        Vector3::new(
            math::mercator_x_from_lng(self.lng),
            math::mercator_y_from_lat(self.lat),
            0.0,
        )
    }
}

/// Camera, projection and tile math provided by the map.
///
/// World space is pixel mercator with z in meters (see [`crate::math`]).
pub trait MapTransform {
    fn zoom(&self) -> f64;

    fn scale(&self) -> f64 {
        2f64.powf(self.zoom())
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * self.scale()
    }

    /// Viewport width in pixels.
    fn width(&self) -> f64;

    /// Viewport height in pixels.
    fn height(&self) -> f64;

    fn aspect(&self) -> f64 {
        self.width() / self.height()
    }

    /// Vertical field of view in radians.
    fn fov(&self) -> f64;

    fn center_lat(&self) -> f64;

    /// Offset of the perspective center caused by padding, in pixels.
    fn center_offset(&self) -> Vector2<f64>;

    fn edge_insets(&self) -> EdgeInsets;

    fn camera_to_center_distance(&self) -> f64;

    fn projection(&self) -> ProjectionKind;

    fn is_orthographic(&self) -> bool {
        false
    }

    fn pixels_per_meter(&self, lat: f64, world_size: f64) -> f64 {
        math::mercator_z_from_altitude(1.0, lat) * world_size
    }

    fn mercator_z_from_zoom(&self, zoom: f64) -> f64 {
        self.camera_to_center_distance() / (TILE_SIZE * 2f64.powf(zoom))
    }

    /// Camera position in normalized mercator units.
    fn camera_position(&self) -> Vector3<f64>;

    /// Camera space to normalized mercator space.
    fn camera_to_world_mercator(&self) -> Matrix4<f64>;

    /// World space to camera space, with z scaled by `z_unit`.
    fn world_to_camera(&self, world_size: f64, z_unit: f64) -> Matrix4<f64>;

    fn camera_to_clip_perspective(&self, fov: f64, aspect: f64, near: f64, far: f64) -> Matrix4<f64> {
        crate::camera::FreeCamera::camera_to_clip_perspective(fov, aspect, near, far)
    }

    /// World space to clip space for the current camera.
    fn projection_matrix(&self) -> Matrix4<f64>;

    /// Tile-local coordinates (`0..EXTENT`) to world space.
    fn calculate_pos_matrix(&self, tile: &UnwrappedTileId, world_size: f64) -> Matrix4<f64> {
        let canonical = tile.canonical;
        let tiles = 2f64.powi(canonical.z as i32);
        let tile_size = world_size / tiles;
        let unwrapped_x = canonical.x as f64 + tiles * tile.wrap as f64;
        Matrix4::from_translation(Vector3::new(
            unwrapped_x * tile_size,
            canonical.y as f64 * tile_size,
            0.0,
        )) * Matrix4::from_nonuniform_scale(tile_size / EXTENT, tile_size / EXTENT, 1.0)
    }

    /// Tile-local coordinates to clip space.
    fn calculate_proj_matrix(&self, tile: &UnwrappedTileId) -> Matrix4<f64> {
        self.projection_matrix() * self.calculate_pos_matrix(tile, self.world_size())
    }
}
