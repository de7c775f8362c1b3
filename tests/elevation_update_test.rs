mod common;

use model_shadows::{
    data_structures::instance::{InstanceBucket, InstanceRaw, InstancedDataArray, ModelInstances},
    elevation::update_bucket_elevation,
    terrain::{DemTileKey, Terrain},
    transform::{ProjectionKind, UnwrappedTileId},
};

use crate::common::test_utils::{MockTerrain, init_logger};

fn tile() -> UnwrappedTileId {
    UnwrappedTileId::new(0, 14, 8192, 5447)
}

fn bucket() -> InstanceBucket {
    let mut bucket = InstanceBucket::new(tile(), ProjectionKind::Mercator);
    let mut trees = ModelInstances::default();
    trees.push(InstanceRaw::at(100, 200), 0.0);
    trees.push(InstanceRaw::at(4000, 4000), 2.5);
    bucket.instances_per_model.insert("tree".to_owned(), trees);

    let mut rocks = ModelInstances::default();
    rocks.push(InstanceRaw::at(8000, 10), -1.0);
    bucket.instances_per_model.insert("rock".to_owned(), rocks);
    bucket
}

fn elevations(bucket: &InstanceBucket, model: &str) -> Vec<f32> {
    bucket.instances_per_model[model]
        .instanced_data
        .elements()
        .unwrap()
        .iter()
        .map(InstanceRaw::elevation)
        .collect()
}

#[test]
fn elevation_lane_is_exaggerated_terrain_plus_baseline() {
    init_logger();
    let terrain = MockTerrain::new(1.5, 100.0);
    let mut bucket = bucket();
    bucket.dirty = false;

    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());

    assert_eq!(elevations(&bucket, "tree"), vec![150.0, 152.5]);
    assert_eq!(elevations(&bucket, "rock"), vec![149.0]);
    assert_eq!(terrain.samples.get(), 3);
    assert_eq!(bucket.terrain_elevation_min, 150.0);
    assert_eq!(bucket.terrain_elevation_max, 150.0);
    assert_eq!(bucket.valid_for_exaggeration, Some(1.5));
    assert_eq!(bucket.valid_for_dem_tile, terrain.dem);
    assert!(bucket.dirty);
}

#[test]
fn unchanged_terrain_is_not_resampled() {
    let terrain = MockTerrain::new(1.0, 42.0);
    let mut bucket = bucket();

    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    let samples = terrain.samples.get();
    let before = bucket.clone();
    bucket.dirty = false;

    assert!(!update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(terrain.samples.get(), samples);
    assert!(!bucket.dirty);
    assert_eq!(bucket.instances_per_model, before.instances_per_model);
}

#[test]
fn exaggeration_change_resamples() {
    let mut terrain = MockTerrain::new(1.0, 10.0);
    let mut bucket = bucket();
    update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap();

    terrain.exaggeration = 3.0;
    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(elevations(&bucket, "tree"), vec![30.0, 32.5]);
}

#[test]
fn reloaded_dem_tile_resamples() {
    let mut terrain = MockTerrain::new(1.0, 10.0);
    let mut bucket = bucket();
    update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap();
    let samples = terrain.samples.get();

    terrain.dem = Some(DemTileKey {
        timestamp: 2,
        ..terrain.dem.unwrap()
    });
    terrain.elevation = 20.0;
    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(terrain.samples.get(), samples + 3);
    assert_eq!(elevations(&bucket, "rock"), vec![19.0]);
}

#[test]
fn missing_dem_tile_falls_back_to_baseline() {
    let mut terrain = MockTerrain::new(2.0, 500.0);
    terrain.dem = None;
    let mut bucket = bucket();

    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(terrain.samples.get(), 0);
    assert_eq!(bucket.valid_for_exaggeration, Some(0.0));
    assert_eq!(bucket.valid_for_dem_tile, None);
    assert_eq!(elevations(&bucket, "tree"), vec![0.0, 2.5]);
    assert_eq!(elevations(&bucket, "rock"), vec![-1.0]);
    assert_eq!(bucket.terrain_elevation_min, 0.0);
    assert_eq!(bucket.terrain_elevation_max, 0.0);

    bucket.dirty = false;
    assert!(!update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert!(!bucket.dirty);
}

#[test]
fn unsampleable_dem_tile_is_not_retried_every_frame() {
    let mut terrain = MockTerrain::new(1.0, 80.0);
    terrain.sampler_available = false;
    let mut bucket = bucket();

    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(elevations(&bucket, "tree"), vec![0.0, 2.5]);
    assert_eq!(bucket.valid_for_exaggeration, Some(1.0));
    assert_eq!(bucket.valid_for_dem_tile, terrain.dem);

    bucket.dirty = false;
    assert!(!update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert!(!bucket.dirty);

    // a reloaded tile is tried again
    terrain.sampler_available = true;
    terrain.dem = Some(DemTileKey {
        timestamp: 2,
        ..terrain.dem.unwrap()
    });
    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(elevations(&bucket, "tree"), vec![80.0, 82.5]);
}

#[test]
fn no_terrain_counts_as_zero_exaggeration() {
    let mut bucket = bucket();
    assert!(update_bucket_elevation(&mut bucket, None).unwrap());
    assert!(!update_bucket_elevation(&mut bucket, None).unwrap());

    // same state whether terrain is absent or flat
    let flat = MockTerrain::new(0.0, 300.0);
    assert!(!update_bucket_elevation(&mut bucket, Some(&flat as &dyn Terrain)).unwrap());
    assert_eq!(flat.samples.get(), 0);
}

#[test]
fn invalidated_bucket_is_recomputed() {
    let terrain = MockTerrain::new(1.0, 5.0);
    let mut bucket = bucket();
    update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap();
    bucket.invalidate_elevation();
    assert!(update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap());
    assert_eq!(terrain.samples.get(), 6);
}

#[test]
fn wrong_stride_is_an_error() {
    let terrain = MockTerrain::new(1.0, 5.0);
    let mut bucket = InstanceBucket::new(tile(), ProjectionKind::Mercator);
    bucket.instances_per_model.insert(
        "bad".to_owned(),
        ModelInstances {
            instanced_data: InstancedDataArray::from_raw(vec![0.0; 24], 48),
            evaluated_elevation: vec![0.0, 0.0],
        },
    );
    let err = update_bucket_elevation(&mut bucket, Some(&terrain)).unwrap_err();
    assert!(err.to_string().contains("stride"), "{err}");
    assert_eq!(bucket.instances_per_model["bad"].instanced_data.len(), 2);
}
