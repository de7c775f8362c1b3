//! Lazy terrain elevation for instanced models.
//!
//! Instances store their elevation in a dedicated lane. It only has to be
//! resampled when the terrain exaggeration or the DEM tile backing the bucket
//! changes; every other frame reuses the stored values.

use crate::{
    data_structures::instance::{InstanceBucket, LANE_ELEVATION},
    terrain::Terrain,
};

/// Bring the elevation lane of every instance in `bucket` up to date.
///
/// Returns `true` when the lanes were recomputed and the bucket was marked
/// dirty, `false` when the cached values are still valid.
pub fn update_bucket_elevation(bucket: &mut InstanceBucket, terrain: Option<&dyn Terrain>) -> anyhow::Result<bool> {
    let mut exaggeration = terrain.map_or(0.0, |terrain| terrain.exaggeration());
    let mut dem = None;
    if exaggeration > 0.0 {
        dem = terrain.and_then(|terrain| terrain.find_dem_tile_for(&bucket.tile_id));
        if dem.is_none() {
            exaggeration = 0.0;
        }
    }

    if bucket.valid_for_exaggeration == Some(exaggeration)
        && (exaggeration == 0.0 || dem == bucket.valid_for_dem_tile)
    {
        return Ok(false);
    }

    // cache key; a DEM tile that yields no sampler stays valid until it changes
    let requested = exaggeration;
    let sampler = match (terrain, dem.as_ref()) {
        (Some(terrain), Some(dem)) if exaggeration > 0.0 => terrain.create_sampler(dem, &bucket.tile_id),
        _ => None,
    };
    if sampler.is_none() {
        log::debug!("no elevation sampler for tile {:?}, using baseline elevation", bucket.tile_id);
        exaggeration = 0.0;
    }

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for (model_id, instances) in bucket.instances_per_model.iter_mut() {
        let baselines = &instances.evaluated_elevation;
        let elements = instances.instanced_data.elements_mut()?;
        for (i, instance) in elements.iter_mut().enumerate() {
            let terrain_elevation = match &sampler {
                Some(sampler) => {
                    let (x, y) = instance.tile_position();
                    exaggeration * sampler.get_elevation_at(x, y, true)
                }
                None => 0.0,
            };
            let baseline = baselines.get(i).copied().unwrap_or_else(|| {
                log::debug!("model {model_id} has no baseline elevation for instance {i}");
                0.0
            });
            instance.data[LANE_ELEVATION] = (terrain_elevation + baseline as f64) as f32;
            min = min.min(terrain_elevation);
            max = max.max(terrain_elevation);
        }
    }

    if min > max {
        min = 0.0;
        max = 0.0;
    }
    bucket.terrain_elevation_min = min;
    bucket.terrain_elevation_max = max;
    bucket.valid_for_exaggeration = Some(requested);
    bucket.valid_for_dem_tile = if requested > 0.0 { dem } else { None };
    bucket.dirty = true;
    Ok(true)
}
