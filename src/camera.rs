//! Free camera used to build light views.
//!
//! The camera lives in normalized mercator space. Its view matrix takes world
//! coordinates (x and y scaled by the world size, z in meters) into a y-down
//! camera space where z is scaled into the same units as x and y.

use cgmath::{Matrix4, Quaternion, Rad, Rotation, Rotation3, Vector3};

/// Orientation looking down `-z` after applying `-pitch` around x and
/// `-bearing` around z.
pub fn orientation_from_pitch_bearing(pitch: f64, bearing: f64) -> Quaternion<f64> {
    Quaternion::from_angle_z(Rad(-bearing)) * Quaternion::from_angle_x(Rad(-pitch))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreeCamera {
    /// Position in normalized mercator units.
    pub position: Vector3<f64>,
    pub orientation: Quaternion<f64>,
}

impl Default for FreeCamera {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
        }
    }
}

impl FreeCamera {
    pub fn new(position: Vector3<f64>, pitch: f64, bearing: f64) -> Self {
        Self {
            position,
            orientation: orientation_from_pitch_bearing(pitch, bearing),
        }
    }

    pub fn set_pitch_bearing(&mut self, pitch: f64, bearing: f64) {
        self.orientation = orientation_from_pitch_bearing(pitch, bearing);
    }

    /// Direction the camera looks at.
    pub fn forward(&self) -> Vector3<f64> {
        self.orientation.rotate_vector(Vector3::new(0.0, 0.0, -1.0))
    }

    pub fn world_to_camera(&self, world_size: f64, z_unit: f64) -> Matrix4<f64> {
        let flip_y = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0);
        let rotation = Matrix4::from(self.orientation.conjugate());
        let translation = Matrix4::from_translation(-self.position * world_size);
        let z_scale = Matrix4::from_nonuniform_scale(1.0, 1.0, z_unit);
        flip_y * rotation * translation * z_scale
    }

    pub fn camera_to_world(&self, world_size: f64, z_unit: f64) -> Matrix4<f64> {
        let flip_y = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0);
        let rotation = Matrix4::from(self.orientation);
        let translation = Matrix4::from_translation(self.position * world_size);
        let z_scale = Matrix4::from_nonuniform_scale(1.0, 1.0, 1.0 / z_unit);
        z_scale * translation * rotation * flip_y
    }

    pub fn camera_to_clip_perspective(fov: f64, aspect: f64, near: f64, far: f64) -> Matrix4<f64> {
        cgmath::perspective(Rad(fov), aspect, near, far)
    }

    pub fn camera_to_clip_orthographic(
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    ) -> Matrix4<f64> {
        cgmath::ortho(left, right, bottom, top, near, far)
    }
}
