use binrw::BinRead;
use flate2::read::GzDecoder;
use nalgebra::Point2;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::{
    error::{DrapeError, Result},
    geometry::{lerp, GeodeticLatLon, GeodeticPoint2, GeodeticPoint3, GeodeticRectangle, Triangle},
    interpolator::interpolate_height_barycentric,
    QuantizedMesh, UV_MAX_U16,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Deepest level the tile addressing supports; column counts overflow `u32` past it
pub const MAX_TILE_LEVEL: u32 = 30;

/// Row numbering of a geographic tile pyramid. `Tms` counts rows from the
/// south, `Slippy` from the north. Both have 2x1 tiles at level 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TilingScheme {
    #[default]
    Tms,
    Slippy,
}

pub struct QuantizedMeshTile {
    pub quantized_mesh: QuantizedMesh,
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
    pub bounding_rectangle: GeodeticRectangle,
    pub tiling_scheme: TilingScheme,
    heights: Vec<f64>,
}

impl QuantizedMeshTile {
    pub fn new(
        quantized_mesh: QuantizedMesh,
        zoom: u32,
        x: u32,
        y: u32,
        tiling_scheme: TilingScheme,
    ) -> Self {
        let heights = quantized_mesh.interpolated_height_vertices();
        Self {
            quantized_mesh,
            zoom,
            x,
            y,
            bounding_rectangle: tile_to_bounding_rectangle(&tiling_scheme, x, y, zoom),
            tiling_scheme,
            heights,
        }
    }

    pub fn vertex_as_geodetic_point3(&self, vertex_index: usize) -> GeodeticPoint3 {
        let vertex_data = &self.quantized_mesh.vertex_data;
        let u_value = f64::from(vertex_data.u[vertex_index]);
        let v_value = f64::from(vertex_data.v[vertex_index]);

        let ll = &self.bounding_rectangle.lower_left;
        let ur = &self.bounding_rectangle.upper_right;
        let uv_max = f64::from(UV_MAX_U16);

        let lon = lerp(ll.lon(), ur.lon(), u_value / uv_max);
        let lat = lerp(ll.lat(), ur.lat(), v_value / uv_max);

        GeodeticPoint3::new(lon, lat, self.heights[vertex_index])
    }

    pub fn vertices_as_geodetic_point3(&self) -> Vec<GeodeticPoint3> {
        (0..self.quantized_mesh.vertex_data.vertex_count as usize)
            .map(|i| self.vertex_as_geodetic_point3(i))
            .collect()
    }

    /// Position of `point` in the tile's quantized UV space, clamped to the tile.
    pub fn uv_for_point(&self, point: &GeodeticPoint2) -> Point2<f64> {
        let rect = &self.bounding_rectangle;
        let uv_max = f64::from(UV_MAX_U16);

        let u = (point.lon() - rect.lower_left.lon()) / rect.width() * uv_max;
        let v = (point.lat() - rect.lower_left.lat()) / rect.height() * uv_max;

        Point2::new(u.clamp(0.0, uv_max), v.clamp(0.0, uv_max))
    }

    /// Terrain height in metres at `point`, interpolated over the mesh
    /// triangle that contains it.
    pub fn interpolate_height(&self, point: &GeodeticPoint2) -> Option<f64> {
        let uv = self.uv_for_point(point);
        let vertex_data = &self.quantized_mesh.vertex_data;

        for indices in vertex_data.triangle_index.iter() {
            let [i0, i1, i2] = indices.map(|i| i as usize);
            if i0.max(i1).max(i2) >= self.heights.len() {
                continue;
            }

            let triangle = Triangle {
                vertices: [
                    Point2::new(f64::from(vertex_data.u[i0]), f64::from(vertex_data.v[i0])),
                    Point2::new(f64::from(vertex_data.u[i1]), f64::from(vertex_data.v[i1])),
                    Point2::new(f64::from(vertex_data.u[i2]), f64::from(vertex_data.v[i2])),
                ],
            };

            if !triangle.bounding_rect().contains(&uv) {
                continue;
            }

            let heights = [self.heights[i0], self.heights[i1], self.heights[i2]];
            if let Some(height) = interpolate_height_barycentric(&uv, &triangle, &heights) {
                return Some(height);
            }
        }
        None
    }
}

/// Number of tiles across (x) and down (y) at `zoom` (at most `MAX_TILE_LEVEL`)
pub fn tiles_per_side(zoom: u32) -> (u32, u32) {
    (2 << zoom, 1 << zoom)
}

fn tile_size_degrees(zoom: u32) -> f64 {
    180.0 / f64::from(1u32 << zoom)
}

/// Convert a geographic tile to its bounding rectangle (radians).
pub fn tile_to_bounding_rectangle(
    tiling_scheme: &TilingScheme,
    x: u32,
    y: u32,
    zoom: u32,
) -> GeodeticRectangle {
    let (_, rows) = tiles_per_side(zoom);
    let tile_size_deg = tile_size_degrees(zoom);

    let row_from_south = match tiling_scheme {
        TilingScheme::Tms => y,
        TilingScheme::Slippy => rows.saturating_sub(1).saturating_sub(y),
    };

    let min_lon = f64::from(x) * tile_size_deg - 180.0;
    let max_lon = f64::from(x + 1) * tile_size_deg - 180.0;
    let min_lat = f64::from(row_from_south) * tile_size_deg - 90.0;
    let max_lat = f64::from(row_from_south + 1) * tile_size_deg - 90.0;

    GeodeticRectangle {
        lower_left: GeodeticPoint2::from_degrees(min_lon, min_lat),
        upper_right: GeodeticPoint2::from_degrees(max_lon, max_lat),
    }
}

/// Tile (x, y) containing `point` at `zoom`. Points on the antimeridian or
/// the poles fall in the last column/row.
pub fn tile_for_point(point: &GeodeticPoint2, zoom: u32, tiling_scheme: &TilingScheme) -> (u32, u32) {
    let (columns, rows) = tiles_per_side(zoom);
    let tile_size_deg = tile_size_degrees(zoom);
    let degrees = point.to_degrees();

    let column = ((degrees.lon() + 180.0) / tile_size_deg).floor().max(0.0) as u32;
    let row_from_south = ((degrees.lat() + 90.0) / tile_size_deg).floor().max(0.0) as u32;

    let x = column.min(columns - 1);
    let row_from_south = row_from_south.min(rows - 1);
    let y = match tiling_scheme {
        TilingScheme::Tms => row_from_south,
        TilingScheme::Slippy => rows - 1 - row_from_south,
    };
    (x, y)
}

/// Tiles covering `point` at every level up to `max_zoom`, as (x, y, zoom)
pub fn tiles_for_point(
    point: &GeodeticPoint2,
    max_zoom: u32,
    tiling_scheme: &TilingScheme,
) -> Vec<(u32, u32, u32)> {
    (0..=max_zoom)
        .map(|zoom| {
            let (x, y) = tile_for_point(point, zoom, tiling_scheme);
            (x, y, zoom)
        })
        .collect()
}

/// Decode a quantized mesh, inflating it first when it is gzip compressed.
pub fn decode_quantized_mesh(bytes: Vec<u8>, path: &Path) -> Result<QuantizedMesh> {
    let bytes = if bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| DrapeError::TileDecode {
                path: path.to_path_buf(),
                message: format!("gzip: {e}"),
            })?;
        inflated
    } else {
        bytes
    };

    QuantizedMesh::read_le(&mut Cursor::new(bytes)).map_err(|e| DrapeError::TileDecode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn load_quantized_mesh_tile(
    path: &Path,
    zoom: u32,
    x: u32,
    y: u32,
    tiling_scheme: TilingScheme,
) -> Result<QuantizedMeshTile> {
    let bytes = std::fs::read(path).map_err(|source| DrapeError::Fetch {
        path: path.to_path_buf(),
        source,
    })?;

    let qm = decode_quantized_mesh(bytes, path)?;

    tracing::debug!(
        path = %path.display(),
        zoom,
        x,
        y,
        vertices = qm.vertex_data.vertex_count,
        triangles = qm.vertex_data.triangle_count,
        extensions = ?qm.extension_ids(),
        "decoded terrain tile"
    );

    Ok(QuantizedMeshTile::new(qm, zoom, x, y, tiling_scheme))
}
