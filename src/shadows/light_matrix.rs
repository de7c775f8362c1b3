//! Light-matrix builder.
//!
//! Builds a world-to-light-clip matrix for one cascade. The shadow volume is the
//! minimal bounding sphere of the camera frustum slice, which does not change
//! when the camera rotates, and the resulting matrix is snapped to the shadow
//! map texel grid so translating the camera does not make shadows shimmer.
//!
//! All math is `f64`. Narrow with [`crate::math::to_gpu_matrix`] for upload.

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};

use crate::{
    camera::FreeCamera,
    math::{Frustum, mercator_z_from_altitude, transform_point},
    shadows::cascade::MIN_SHADOW_MAP_RESOLUTION,
    transform::MapTransform,
};

/// Below this the light is treated as horizontal when extending the far plane.
pub const MIN_LIGHT_DIRECTION_Z: f64 = 1e-3;

/// Bounding sphere of a cascade in normalized mercator units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowVolume {
    pub center: Vector3<f64>,
    pub radius: f64,
}

/// Minimal bounding sphere of the frustum slice `[near, far]`.
///
/// Returns the depth of the sphere center along the view axis and its radius,
/// both in the units of `near` and `far`. `k` is the ratio between the distance
/// of a slice corner from the view axis and its depth.
pub fn frustum_bounding_sphere(fov: f64, aspect: f64, near: f64, far: f64) -> (f64, f64) {
    let k = (1.0 + aspect * aspect).sqrt() * (fov * 0.5).tan();
    let k2 = k * k;
    let far_minus_near = far - near;
    let far_plus_near = far + near;

    if k2 > far_minus_near / far_plus_near {
        (far, far * k)
    } else {
        let center_depth = 0.5 * far_plus_near * (1.0 + k2);
        let radius = 0.5
            * (far_minus_near * far_minus_near
                + 2.0 * (far * far + near * near) * k2
                + far_plus_near * far_plus_near * k2 * k2)
                .sqrt();
        (center_depth, radius)
    }
}

/// Shadow volume of one cascade, widened by the rounding margin of the map.
pub fn shadow_volume(transform: &dyn MapTransform, near: f64, far: f64, resolution: u32) -> ShadowVolume {
    let ws = transform.world_size();
    let (center_depth, radius) =
        frustum_bounding_sphere(transform.fov(), transform.aspect(), near, far);

    let center = transform_point(
        &transform.camera_to_world_mercator(),
        Vector3::new(0.0, 0.0, -center_depth / ws),
    );
    let mut radius = radius / ws;

    // Off-center padding makes the frustum asymmetric; grow the sphere to the
    // actual corners in that case.
    let padding = transform.edge_insets();
    if !padding.is_zero() && !padding.is_symmetric() {
        if let Some(corners) = padded_frustum_corners(transform, near, far) {
            for p in corners {
                radius = radius.max((center - p).magnitude());
            }
        }
    }

    let resolution = resolution.max(MIN_SHADOW_MAP_RESOLUTION) as f64;
    radius *= resolution / (resolution - 1.0);

    ShadowVolume { center, radius }
}

/// Corners of the padded camera frustum slice in normalized mercator units.
fn padded_frustum_corners(transform: &dyn MapTransform, near: f64, far: f64) -> Option<[Vector3<f64>; 8]> {
    let ws = transform.world_size();
    let lat = transform.center_lat();
    let z_unit = if transform.projection().z_axis_in_meters() {
        transform.pixels_per_meter(lat, ws)
    } else {
        1.0
    };
    let world_to_camera = transform.world_to_camera(ws, z_unit);
    let mut camera_to_clip = transform.camera_to_clip_perspective(
        transform.fov(),
        transform.width() / transform.height(),
        near,
        far,
    );
    let offset = transform.center_offset();
    camera_to_clip.z.x = -offset.x * 2.0 / transform.width();
    camera_to_clip.z.y = offset.y * 2.0 / transform.height();

    let inv = (camera_to_clip * world_to_camera).invert()?;
    let frustum = Frustum::from_inv_projection_matrix(&inv, ws, transform.zoom(), true);
    let scale = transform.scale();
    Some(frustum.points.map(|p| {
        Vector3::new(p.x / scale, p.y / scale, mercator_z_from_altitude(p.z, lat))
    }))
}

/// Sphere center quantized to 1e-6 mercator units, in world pixels at z = 0.
pub fn aligned_center(center: Vector3<f64>, world_size: f64) -> Vector3<f64> {
    Vector3::new(
        (center.x * 1e6).floor() / 1e6 * world_size,
        (center.y * 1e6).floor() / 1e6 * world_size,
        0.0,
    )
}

/// World-to-light-clip matrix for the cascade slice `[near, far]`.
///
/// `shadow_direction` points from the light into the scene and must be
/// normalized. `vertical_range` is the elevation span of visible terrain in
/// meters. Identical inputs always produce bit-identical output.
pub fn create_light_matrix(
    transform: &dyn MapTransform,
    shadow_direction: Vector3<f64>,
    near: f64,
    far: f64,
    resolution: u32,
    vertical_range: f64,
) -> Matrix4<f64> {
    let ws = transform.world_size();
    let volume = shadow_volume(transform, near, far, resolution);
    let pixels_per_meter = transform.pixels_per_meter(transform.center_lat(), ws);

    let pitch = shadow_direction.z.clamp(-1.0, 1.0).acos();
    let bearing = (-shadow_direction.x).atan2(-shadow_direction.y);
    let camera = FreeCamera::new(volume.center, pitch, bearing);
    let light_world_to_view = camera.world_to_camera(ws, pixels_per_meter);

    let radius_px = volume.radius * ws;
    let near_z = (transform.mercator_z_from_zoom(17.0) * ws * -2.0).min(radius_px * -2.0);
    let far_z = if shadow_direction.z.abs() < MIN_LIGHT_DIRECTION_Z {
        radius_px
    } else {
        (radius_px + vertical_range * pixels_per_meter) / shadow_direction.z
    };

    let light_view_to_clip =
        FreeCamera::camera_to_clip_orthographic(-radius_px, radius_px, -radius_px, radius_px, near_z, far_z);
    let light_world_to_clip = light_view_to_clip * light_world_to_view;

    snap_to_texel_grid(light_world_to_clip, aligned_center(volume.center, ws), resolution)
}

/// Prepend the translation that moves `anchor` onto a texel corner.
pub fn snap_to_texel_grid(matrix: Matrix4<f64>, anchor: Vector3<f64>, resolution: u32) -> Matrix4<f64> {
    let half_resolution = 0.5 * resolution as f64;
    let projected = transform_point(&matrix, anchor) * half_resolution;
    let rounded = Vector3::new(projected.x.floor(), projected.y.floor(), projected.z.floor());
    let offset = (projected - rounded) * (-1.0 / half_resolution);
    Matrix4::from_translation(offset) * matrix
}

/// Unit vector pointing from the light into the scene.
///
/// `azimuthal` and `polar` are in degrees; the polar angle is clamped to
/// `max_polar` so shadows never get infinitely long.
pub fn shadow_direction_from_properties(azimuthal: f64, polar: f64, max_polar: f64) -> Vector3<f64> {
    let azimuthal = (azimuthal + 90.0).to_radians();
    let polar = polar.clamp(0.0, max_polar).to_radians();
    Vector3::new(
        azimuthal.cos() * polar.sin(),
        azimuthal.sin() * polar.sin(),
        polar.cos(),
    )
}
