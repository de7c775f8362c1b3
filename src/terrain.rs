//! Terrain collaborator interfaces.

use crate::transform::UnwrappedTileId;

/// Identity of a DEM tile: its id plus the time its data was loaded.
///
/// A reloaded tile gets a new timestamp, so cached samples of the old data are
/// never mistaken for the new ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DemTileKey {
    pub tile_id: UnwrappedTileId,
    pub timestamp: u64,
}

/// Elevation lookup in the tile-local coordinates of the tile it was created for.
pub trait DemSampler {
    /// Elevation in meters. With `clamp` coordinates outside the tile are
    /// clamped to its border.
    fn get_elevation_at(&self, x: i32, y: i32, clamp: bool) -> f64;
}

pub trait Terrain {
    fn exaggeration(&self) -> f64;

    /// DEM tile covering `tile`, if one is loaded.
    fn find_dem_tile_for(&self, tile: &UnwrappedTileId) -> Option<DemTileKey>;

    /// Sampler mapping `tile`'s coordinates onto `dem`.
    fn create_sampler(
        &self,
        dem: &DemTileKey,
        tile: &UnwrappedTileId,
    ) -> Option<Box<dyn DemSampler + '_>>;

    /// Minimum and maximum elevation over the visible DEM tiles, in meters.
    fn visible_elevation_bounds(&self) -> Option<(f64, f64)>;
}
