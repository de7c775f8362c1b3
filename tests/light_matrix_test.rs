mod common;

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};
use model_shadows::{
    camera::FreeCamera,
    math::transform_point,
    shadows::light_matrix::{
        aligned_center, create_light_matrix, frustum_bounding_sphere, shadow_direction_from_properties,
        shadow_volume,
    },
    transform::{EdgeInsets, LngLat, MapTransform},
};

use crate::common::test_utils::{TestTransform, approx_eq, init_logger};

const RESOLUTION: u32 = 2048;

fn berlin() -> TestTransform {
    TestTransform::new(LngLat::new(13.4050, 52.5200), 15.5, 45.0, 20.0)
}

fn sun() -> Vector3<f64> {
    shadow_direction_from_properties(210.0, 30.0, 75.0)
}

fn snapped_anchor(transform: &TestTransform, matrix: &Matrix4<f64>, near: f64, far: f64) -> Vector3<f64> {
    let volume = shadow_volume(transform, near, far, RESOLUTION);
    let anchor = aligned_center(volume.center, transform.world_size());
    transform_point(matrix, anchor) * (0.5 * RESOLUTION as f64)
}

#[test]
fn light_matrix_is_deterministic() {
    init_logger();
    let transform = berlin();
    let a = create_light_matrix(&transform, sun(), 12.0, 1000.0, RESOLUTION, 150.0);
    let b = create_light_matrix(&transform, sun(), 12.0, 1000.0, RESOLUTION, 150.0);
    assert_eq!(a, b);
    for c in 0..4 {
        for r in 0..4 {
            assert_eq!(a[c][r].to_bits(), b[c][r].to_bits());
        }
    }
}

#[test]
fn snapped_center_lands_on_texel_grid() {
    let transform = berlin();
    let (near, far) = (12.0, 1000.0);
    let matrix = create_light_matrix(&transform, sun(), near, far, RESOLUTION, 0.0);
    let p = snapped_anchor(&transform, &matrix, near, far);
    assert!(approx_eq(p.x, p.x.round(), 1e-6), "x = {}", p.x);
    assert!(approx_eq(p.y, p.y.round(), 1e-6), "y = {}", p.y);
}

fn on_grid(p: Vector3<f64>) -> bool {
    approx_eq(p.x, p.x.round(), 1e-6) && approx_eq(p.y, p.y.round(), 1e-6)
}

#[test]
fn camera_motion_keeps_the_anchor_on_the_texel_grid() {
    let mut transform = berlin();
    let (near, far) = (12.0, 1000.0);
    let half = 0.5 * RESOLUTION as f64;

    // park the volume center mid-way inside its alignment cell so moves of a
    // few texels never change the aligned anchor
    let volume = shadow_volume(&transform, near, far, RESOLUTION);
    let to_cell_middle = |v: f64| ((v * 1e6).floor() + 0.5) / 1e6 - v;
    transform.translate_camera(to_cell_middle(volume.center.x), to_cell_middle(volume.center.y));

    let ws = transform.world_size();
    let volume = shadow_volume(&transform, near, far, RESOLUTION);
    let texel = 2.0 * volume.radius / RESOLUTION as f64;
    let anchor = aligned_center(volume.center, ws);
    let before = create_light_matrix(&transform, sun(), near, far, RESOLUTION, 0.0);
    let p0 = transform_point(&before, anchor) * half;
    assert!(on_grid(p0), "{p0:?}");

    let mut texel_changes = 0;
    for step in 1..=40 {
        let f = step as f64 * 0.05;
        let mut moved = transform.clone();
        moved.translate_camera(f * texel, -f * texel);
        let moved_volume = shadow_volume(&moved, near, far, RESOLUTION);
        assert_eq!(aligned_center(moved_volume.center, ws), anchor);

        let after = create_light_matrix(&moved, sun(), near, far, RESOLUTION, 0.0);
        let p1 = transform_point(&after, anchor) * half;
        assert!(on_grid(p1), "step {step}: {p1:?}");
        // the world-fixed anchor only ever jumps by whole texels
        let delta = p1 - p0;
        assert!(on_grid(delta), "step {step}: {delta:?}");
        if delta.x.round() != 0.0 || delta.y.round() != 0.0 {
            texel_changes += 1;
        }
    }
    assert!(texel_changes > 0);
}

#[test]
fn degenerate_resolution_keeps_the_volume_finite() {
    let transform = berlin();
    let smallest = shadow_volume(&transform, 12.0, 1000.0, 2);
    for resolution in [0, 1] {
        let volume = shadow_volume(&transform, 12.0, 1000.0, resolution);
        assert!(volume.radius.is_finite());
        assert_eq!(volume.radius, smallest.radius);
    }
}

fn slice_corners(fov: f64, aspect: f64, depth: f64) -> [Vector3<f64>; 4] {
    let h = depth * (fov * 0.5).tan();
    let w = h * aspect;
    [
        Vector3::new(-w, -h, -depth),
        Vector3::new(w, -h, -depth),
        Vector3::new(w, h, -depth),
        Vector3::new(-w, h, -depth),
    ]
}

#[test]
fn bounding_sphere_contains_the_frustum_slice() {
    let transform = berlin();
    let (fov, aspect) = (transform.fov(), transform.aspect());
    // thin slice centers on the far plane, deep slice uses the balanced formula
    for (near, far) in [(100.0, 110.0), (1.0, 1000.0), (12.0, 1300.0)] {
        let (center_depth, radius) = frustum_bounding_sphere(fov, aspect, near, far);
        let center = Vector3::new(0.0, 0.0, -center_depth);
        for depth in [near, far] {
            for corner in slice_corners(fov, aspect, depth) {
                let d = (corner - center).magnitude();
                assert!(d <= radius * (1.0 + 1e-9), "corner at {d} outside radius {radius}");
            }
        }
    }
}

#[test]
fn thin_slice_sphere_is_centered_on_far_plane() {
    let transform = berlin();
    let (center_depth, radius) = frustum_bounding_sphere(transform.fov(), transform.aspect(), 100.0, 110.0);
    assert_eq!(center_depth, 110.0);
    let k = (1.0 + transform.aspect().powi(2)).sqrt() * (transform.fov() * 0.5).tan();
    assert!(approx_eq(radius, 110.0 * k, 1e-9));
}

#[test]
fn volume_is_rotation_invariant() {
    let a = TestTransform::new(LngLat::new(13.4050, 52.5200), 15.5, 45.0, 0.0);
    let b = TestTransform::new(LngLat::new(13.4050, 52.5200), 15.5, 45.0, 90.0);
    let va = shadow_volume(&a, 12.0, 1000.0, RESOLUTION);
    let vb = shadow_volume(&b, 12.0, 1000.0, RESOLUTION);
    assert!(approx_eq(va.radius, vb.radius, 1e-15));
}

#[test]
fn asymmetric_padding_never_shrinks_the_volume() {
    let plain = berlin();
    let padded = berlin().with_padding(EdgeInsets {
        top: 250.0,
        bottom: 0.0,
        left: 100.0,
        right: 0.0,
    });
    let a = shadow_volume(&plain, 12.0, 1000.0, RESOLUTION);
    let b = shadow_volume(&padded, 12.0, 1000.0, RESOLUTION);
    assert!(b.radius.is_finite());
    assert!(b.radius >= a.radius);
}

#[test]
fn horizontal_light_does_not_blow_up() {
    let transform = berlin();
    let m = create_light_matrix(&transform, Vector3::new(1.0, 0.0, 0.0), 12.0, 1000.0, RESOLUTION, 500.0);
    for c in 0..4 {
        for r in 0..4 {
            assert!(m[c][r].is_finite());
        }
    }
    assert!(m.invert().is_some());
}

#[test]
fn shadow_direction_clamps_polar_angle() {
    let steep = shadow_direction_from_properties(0.0, 89.0, 75.0);
    assert!(approx_eq(steep.magnitude(), 1.0, 1e-12));
    assert!(approx_eq(steep.z, 75f64.to_radians().cos(), 1e-12));

    let zenith = shadow_direction_from_properties(123.0, 0.0, 75.0);
    assert!(approx_eq(zenith.z, 1.0, 1e-12));
}

#[test]
fn camera_to_world_inverts_world_to_camera() {
    let camera = FreeCamera::new(Vector3::new(0.3, 0.6, 0.01), 0.7, 1.2);
    let m = camera.camera_to_world(1024.0, 3.0) * camera.world_to_camera(1024.0, 3.0);
    let identity = Matrix4::<f64>::identity();
    for c in 0..4 {
        for r in 0..4 {
            assert!(approx_eq(m[c][r], identity[c][r], 1e-9));
        }
    }
}

#[test]
fn zero_pitch_camera_looks_straight_down() {
    let camera = FreeCamera::new(Vector3::new(0.5, 0.5, 0.1), 0.0, 1.0);
    let forward = camera.forward();
    assert!(approx_eq(forward.x, 0.0, 1e-12));
    assert!(approx_eq(forward.y, 0.0, 1e-12));
    assert!(approx_eq(forward.z, -1.0, 1e-12));
}
