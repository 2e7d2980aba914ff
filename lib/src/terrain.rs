//! Terrain height providers.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DrapeError, Result};
use crate::geometry::{Ellipsoid, GeodeticPoint2, GeodeticPoint3};
use crate::layer::LayerDescriptor;
use crate::quantized_mesh_tile::{
    load_quantized_mesh_tile, tile_for_point, QuantizedMeshTile, TilingScheme, MAX_TILE_LEVEL,
};

/// Source of ground heights above the ellipsoid.
#[allow(async_fn_in_trait)]
pub trait TerrainProvider {
    fn ellipsoid(&self) -> &Ellipsoid;

    /// Ground height in metres for each point, in the same order.
    async fn sample_heights(&self, level: u32, points: &[GeodeticPoint2]) -> Result<Vec<f64>>;
}

/// Query `provider` for the positions' ground heights and return the
/// positions with their heights replaced by those.
pub async fn sample_terrain<P: TerrainProvider>(
    provider: &P,
    level: u32,
    positions: &[GeodeticPoint3],
) -> Result<Vec<GeodeticPoint3>> {
    let horizontals: Vec<GeodeticPoint2> = positions.iter().map(GeodeticPoint3::horizontal).collect();
    let heights = provider.sample_heights(level, &horizontals).await?;

    if heights.len() != positions.len() {
        return Err(DrapeError::TerrainQuery {
            level,
            message: format!(
                "provider returned {} heights for {} positions",
                heights.len(),
                positions.len()
            ),
        });
    }

    Ok(positions
        .iter()
        .zip(heights)
        .map(|(position, height)| position.with_height(height))
        .collect())
}

/// Smooth ellipsoid, zero height everywhere
#[derive(Debug, Clone, Default)]
pub struct EllipsoidTerrain {
    ellipsoid: Ellipsoid,
}

impl EllipsoidTerrain {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }
}

impl TerrainProvider for EllipsoidTerrain {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    async fn sample_heights(&self, _level: u32, points: &[GeodeticPoint2]) -> Result<Vec<f64>> {
        Ok(vec![0.0; points.len()])
    }
}

type TileKey = (u32, u32, u32);

/// Tiles kept in memory per terrain unless configured otherwise
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 256;

/// Decoded tiles, oldest evicted first once `capacity` is reached
struct TileCache {
    tiles: HashMap<TileKey, Arc<QuantizedMeshTile>>,
    order: VecDeque<TileKey>,
    capacity: usize,
}

impl TileCache {
    fn new(capacity: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &TileKey) -> Option<Arc<QuantizedMeshTile>> {
        self.tiles.get(key).map(Arc::clone)
    }

    fn insert(&mut self, key: TileKey, tile: Arc<QuantizedMeshTile>) {
        if self.tiles.insert(key, tile).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.tiles.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }
}

/// Quantized-mesh tiles below a directory described by `layer.json`
pub struct QuantizedMeshTerrain {
    root: PathBuf,
    layer: LayerDescriptor,
    tiling_scheme: TilingScheme,
    ellipsoid: Ellipsoid,
    cache: Mutex<TileCache>,
}

impl QuantizedMeshTerrain {
    /// Open a terrain directory. Without a `layer.json` the defaults apply.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let layer_path = root.join("layer.json");
        let layer = if layer_path.exists() {
            LayerDescriptor::from_path(&layer_path)?
        } else {
            debug!(root = %root.display(), "no layer.json, using default layer");
            LayerDescriptor::default()
        };
        Self::with_layer(root, layer)
    }

    pub fn with_layer(root: impl Into<PathBuf>, layer: LayerDescriptor) -> Result<Self> {
        layer.check_supported()?;
        let tiling_scheme = layer.tiling_scheme()?;
        let root = root.into();

        info!(
            root = %root.display(),
            name = ?layer.name,
            scheme = ?tiling_scheme,
            max_level = ?layer.max_level(),
            "opened quantized-mesh terrain"
        );

        Ok(Self {
            root,
            layer,
            tiling_scheme,
            ellipsoid: Ellipsoid::wgs84(),
            cache: Mutex::new(TileCache::new(DEFAULT_TILE_CACHE_CAPACITY)),
        })
    }

    /// Keep at most `capacity` decoded tiles in memory
    pub fn with_cache_capacity(self, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(TileCache::new(capacity)),
            ..self
        }
    }

    pub fn layer(&self) -> &LayerDescriptor {
        &self.layer
    }

    pub fn cached_tiles(&self) -> usize {
        self.cache.lock().len()
    }

    fn tile(&self, zoom: u32, x: u32, y: u32) -> Result<Arc<QuantizedMeshTile>> {
        if let Some(tile) = self.cache.lock().get(&(zoom, x, y)) {
            return Ok(tile);
        }

        let path = self.layer.tile_path(&self.root, zoom, x, y);
        let tile = load_quantized_mesh_tile(&path, zoom, x, y, self.tiling_scheme).map_err(|e| match e {
            DrapeError::Fetch { path, source } => DrapeError::TerrainQuery {
                level: zoom,
                message: format!("missing tile {}: {source}", path.display()),
            },
            other => other,
        })?;

        let tile = Arc::new(tile);
        self.cache.lock().insert((zoom, x, y), Arc::clone(&tile));
        Ok(tile)
    }

    /// Height at one point from the most detailed available tile at or
    /// below `level`. Levels past the layer maximum (or `MAX_TILE_LEVEL`)
    /// are clamped.
    pub fn sample_height(&self, level: u32, point: &GeodeticPoint2) -> Result<f64> {
        let max_level = self
            .layer
            .max_level()
            .map_or(MAX_TILE_LEVEL, |max| max.min(MAX_TILE_LEVEL));
        if level > max_level {
            debug!(requested = level, max_level, "clamping terrain level");
        }
        let level = level.min(max_level);

        for zoom in (0..=level).rev() {
            let (x, y) = tile_for_point(point, zoom, &self.tiling_scheme);
            if !self.layer.is_available(zoom, x, y) {
                continue;
            }
            if zoom != level {
                debug!(requested = level, zoom, x, y, "falling back to coarser terrain level");
            }

            let tile = self.tile(zoom, x, y)?;
            return tile.interpolate_height(point).ok_or_else(|| {
                let degrees = point.to_degrees();
                DrapeError::TerrainQuery {
                    level: zoom,
                    message: format!(
                        "no triangle of tile {zoom}/{x}/{y} covers ({}, {})",
                        degrees.0.x, degrees.0.y
                    ),
                }
            });
        }

        let degrees = point.to_degrees();
        Err(DrapeError::TerrainQuery {
            level,
            message: format!("no tile available for ({}, {})", degrees.0.x, degrees.0.y),
        })
    }
}

impl TerrainProvider for QuantizedMeshTerrain {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    async fn sample_heights(&self, level: u32, points: &[GeodeticPoint2]) -> Result<Vec<f64>> {
        points.iter().map(|point| self.sample_height(level, point)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeodeticHeight;
    use crate::layer::TileRange;
    use crate::test_utils::{encode_tile, ramp_tile_parts, scratch_dir, write_ramp_terrain, ShortTerrain};
    use approx::assert_abs_diff_eq;
    use futures::executor::block_on;

    #[test]
    fn test_ellipsoid_terrain_is_flat() {
        let terrain = EllipsoidTerrain::default();
        let positions = vec![
            GeodeticPoint3::from_degrees(10.0, 20.0, 55.0),
            GeodeticPoint3::from_degrees(-70.0, -10.0, 0.0),
        ];
        let sampled = block_on(sample_terrain(&terrain, 11, &positions)).unwrap();
        assert_eq!(sampled.len(), 2);
        assert_eq!(sampled[0].horizontal(), positions[0].horizontal());
        assert!(sampled.iter().all(|p| p.height() == 0.0));
    }

    #[test]
    fn test_quantized_mesh_terrain_falls_back_to_available_level() {
        let root = write_ramp_terrain("terrain_fallback", 100.0, 300.0);
        let terrain = QuantizedMeshTerrain::open(&root).unwrap();
        assert_eq!(terrain.layer().max_level(), Some(1));

        // level 1 has no tiles east of the prime meridian, so level 0 answers
        let points = [GeodeticPoint2::from_degrees(45.0, 10.0), GeodeticPoint2::from_degrees(135.0, -10.0)];
        let heights = block_on(terrain.sample_heights(11, &points)).unwrap();
        assert_abs_diff_eq!(heights[0], 150.0, epsilon = 1e-6);
        assert_abs_diff_eq!(heights[1], 250.0, epsilon = 1e-6);
        assert_eq!(terrain.cached_tiles(), 1);
    }

    #[test]
    fn test_level_past_tile_addressing_is_clamped() {
        // no layer.json, so the layer declares no maximum
        let terrain = QuantizedMeshTerrain::open(scratch_dir("terrain_deep_level")).unwrap();
        let point = GeodeticPoint2::from_degrees(10.0, 10.0);

        let result = terrain.sample_height(40, &point);
        assert!(matches!(
            result,
            Err(DrapeError::TerrainQuery { level, .. }) if level == MAX_TILE_LEVEL
        ));
        assert!(block_on(terrain.sample_heights(u32::MAX, &[point])).is_err());
    }

    #[test]
    fn test_tile_cache_is_bounded() {
        let root = write_ramp_terrain("terrain_cache_bound", 0.0, 10.0);
        let (u, v, height, triangles) = ramp_tile_parts();
        std::fs::create_dir_all(root.join("0").join("0")).unwrap();
        std::fs::write(
            root.join("0").join("0").join("0.terrain"),
            encode_tile(&u, &v, &height, &triangles, 0.0, 10.0, &[]),
        )
        .unwrap();

        let terrain = QuantizedMeshTerrain::open(&root).unwrap().with_cache_capacity(1);
        let west = GeodeticPoint2::from_degrees(-90.0, 0.0);
        let east = GeodeticPoint2::from_degrees(90.0, 0.0);

        assert_abs_diff_eq!(terrain.sample_height(0, &west).unwrap(), 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(terrain.sample_height(0, &east).unwrap(), 5.0, epsilon = 1e-6);
        assert_eq!(terrain.cached_tiles(), 1);
        assert_abs_diff_eq!(terrain.sample_height(0, &west).unwrap(), 5.0, epsilon = 1e-6);
        assert_eq!(terrain.cached_tiles(), 1);
    }

    #[test]
    fn test_missing_tile_is_a_query_error() {
        let root = write_ramp_terrain("terrain_missing", 0.0, 10.0);
        let terrain = QuantizedMeshTerrain::open(&root).unwrap();

        // the western level 0 tile is listed but was never written
        let result = terrain.sample_height(0, &GeodeticPoint2::from_degrees(-45.0, 0.0));
        assert!(matches!(result, Err(DrapeError::TerrainQuery { level: 0, .. })));
    }

    #[test]
    fn test_unavailable_everywhere() {
        let layer = LayerDescriptor {
            available: vec![vec![TileRange { start_x: 1, start_y: 0, end_x: 1, end_y: 0 }]],
            ..Default::default()
        };
        let terrain = QuantizedMeshTerrain::with_layer(scratch_dir("terrain_empty"), layer).unwrap();
        let result = terrain.sample_height(5, &GeodeticPoint2::from_degrees(-45.0, 0.0));
        assert!(matches!(result, Err(DrapeError::TerrainQuery { .. })));
    }

    #[test]
    fn test_open_without_layer_json() {
        let terrain = QuantizedMeshTerrain::open(scratch_dir("terrain_default")).unwrap();
        assert_eq!(terrain.layer(), &LayerDescriptor::default());
    }

    #[test]
    fn test_mercator_layer_is_rejected() {
        let layer = LayerDescriptor {
            projection: "EPSG:3857".to_string(),
            ..Default::default()
        };
        let result = QuantizedMeshTerrain::with_layer(scratch_dir("terrain_mercator"), layer);
        assert!(matches!(result, Err(DrapeError::UnsupportedLayer(_))));
    }

    #[test]
    fn test_height_count_mismatch() {
        let positions = vec![GeodeticPoint3::from_degrees(1.0, 1.0, 0.0)];
        let result = block_on(sample_terrain(&ShortTerrain::default(), 3, &positions));
        assert!(matches!(result, Err(DrapeError::TerrainQuery { level: 3, .. })));
    }
}
