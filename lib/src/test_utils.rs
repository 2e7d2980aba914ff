// Shared fixtures for the unit tests: a quantized-mesh encoder, synthetic
// meshes, KML documents and terrain providers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{DrapeError, Result};
use crate::geometry::{Ellipsoid, GeodeticLatLon, GeodeticPoint2};
use crate::quantized_mesh_tile::{decode_quantized_mesh, QuantizedMeshTile, TilingScheme};
use crate::terrain::TerrainProvider;
use crate::UV_MAX_U16;

pub type TileParts = (Vec<u16>, Vec<u16>, Vec<u16>, Vec<[u32; 3]>);

fn zigzag_delta_encode(values: &[u16]) -> Vec<u16> {
    let mut previous = 0i32;
    values
        .iter()
        .map(|&value| {
            let delta = i32::from(value) - previous;
            previous = i32::from(value);
            ((delta << 1) ^ (delta >> 31)) as u16
        })
        .collect()
}

fn high_watermark_encode(indices: &[u32]) -> Vec<u32> {
    let mut highest = 0;
    indices
        .iter()
        .map(|&index| {
            let code = highest - index;
            if index == highest {
                highest += 1;
            }
            code
        })
        .collect()
}

fn push_u16s(out: &mut Vec<u8>, values: impl IntoIterator<Item = u16>) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn push_edge(out: &mut Vec<u8>, indices: Vec<u16>) {
    out.extend_from_slice(&(indices.len() as u32).to_le_bytes());
    push_u16s(out, indices);
}

/// Encode a small mesh (16-bit indices) as quantized-mesh bytes. Edge lists
/// are derived from vertices lying on the tile border.
pub fn encode_tile(
    u: &[u16],
    v: &[u16],
    height: &[u16],
    triangles: &[[u32; 3]],
    min_height: f32,
    max_height: f32,
    extensions: &[(u8, Vec<u8>)],
) -> Vec<u8> {
    let mut out = Vec::new();

    // center, min/max height, bounding sphere, horizon occlusion point
    for value in [0.0f64; 3] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&min_height.to_le_bytes());
    out.extend_from_slice(&max_height.to_le_bytes());
    for value in [0.0f64, 0.0, 0.0, 6_378_137.0, 0.0, 0.0, 0.0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    assert_eq!(out.len(), 88);

    out.extend_from_slice(&(u.len() as u32).to_le_bytes());
    push_u16s(&mut out, zigzag_delta_encode(u));
    push_u16s(&mut out, zigzag_delta_encode(v));
    push_u16s(&mut out, zigzag_delta_encode(height));
    if out.len() % 2 != 0 {
        out.push(0);
    }

    out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    let flat: Vec<u32> = triangles.iter().flatten().copied().collect();
    push_u16s(&mut out, high_watermark_encode(&flat).into_iter().map(|i| i as u16));

    let on_edge = |test: &dyn Fn(usize) -> bool| -> Vec<u16> {
        (0..u.len()).filter(|&i| test(i)).map(|i| i as u16).collect()
    };
    push_edge(&mut out, on_edge(&|i| u[i] == 0));
    push_edge(&mut out, on_edge(&|i| v[i] == 0));
    push_edge(&mut out, on_edge(&|i| u[i] == UV_MAX_U16));
    push_edge(&mut out, on_edge(&|i| v[i] == UV_MAX_U16));

    for (id, data) in extensions {
        out.push(*id);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

/// Two triangles covering the tile, height rising linearly from west to east
pub fn ramp_tile_parts() -> TileParts {
    let max = UV_MAX_U16;
    (
        vec![0, max, 0, max],
        vec![0, 0, max, max],
        vec![0, max, 0, max],
        vec![[0, 1, 2], [2, 1, 3]],
    )
}

/// Four triangles around a raised centre vertex (index 2)
pub fn pyramid_tile_parts() -> TileParts {
    let max = UV_MAX_U16;
    let mid = max / 2;
    (
        vec![0, max, mid, max, 0],
        vec![0, 0, mid, max, max],
        vec![0, 0, max, 0, 0],
        vec![[0, 1, 2], [1, 3, 2], [3, 4, 2], [4, 0, 2]],
    )
}

/// Eastern level 0 tile (0..180 degrees east) with a west-east ramp
pub fn ramp_tile(min_height: f32, max_height: f32) -> QuantizedMeshTile {
    let (u, v, height, triangles) = ramp_tile_parts();
    let bytes = encode_tile(&u, &v, &height, &triangles, min_height, max_height, &[]);
    let qm = decode_quantized_mesh(bytes, std::path::Path::new("ramp.terrain")).unwrap();
    QuantizedMeshTile::new(qm, 0, 1, 0, TilingScheme::Tms)
}

/// Fresh, empty directory for one test
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("kmldrape-tests")
        .join(format!("{name}-{}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Terrain directory whose layer lists both level 0 tiles and the western
/// half of level 1, but only holds the eastern level 0 ramp tile.
pub fn write_ramp_terrain(name: &str, min_height: f32, max_height: f32) -> PathBuf {
    let root = scratch_dir(name);
    std::fs::write(
        root.join("layer.json"),
        r#"{
            "tilejson": "2.1.0",
            "format": "quantized-mesh-1.0",
            "scheme": "tms",
            "tiles": ["{z}/{x}/{y}.terrain"],
            "available": [
                [{"startX": 0, "startY": 0, "endX": 1, "endY": 0}],
                [{"startX": 0, "startY": 0, "endX": 1, "endY": 1}]
            ]
        }"#,
    )
    .unwrap();

    let (u, v, height, triangles) = ramp_tile_parts();
    let tile_dir = root.join("0").join("1");
    std::fs::create_dir_all(&tile_dir).unwrap();
    std::fs::write(
        tile_dir.join("0.terrain"),
        encode_tile(&u, &v, &height, &triangles, min_height, max_height, &[]),
    )
    .unwrap();
    root
}

// KML fixtures

pub fn kml_document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Test document</name>
    {body}
  </Document>
</kml>"#
    )
}

pub fn polygon_placemark(id: Option<&str>, altitude_mode: &str, outer: &str, holes: &[&str]) -> String {
    let id = id.map(|id| format!(r#" id="{id}""#)).unwrap_or_default();
    let holes: String = holes
        .iter()
        .map(|hole| {
            format!("<innerBoundaryIs><LinearRing><coordinates>{hole}</coordinates></LinearRing></innerBoundaryIs>")
        })
        .collect();
    format!(
        r#"<Placemark{id}>
      <name>Area</name>
      <Polygon>
        <altitudeMode>{altitude_mode}</altitudeMode>
        <outerBoundaryIs><LinearRing><coordinates>{outer}</coordinates></LinearRing></outerBoundaryIs>
        {holes}
      </Polygon>
    </Placemark>"#
    )
}

// Terrain providers

/// Ground height `100 + 10 * longitude (degrees)`. Counts queries, and can be
/// told to reject any query containing a point east of a longitude.
#[derive(Debug, Default)]
pub struct RampTerrain {
    ellipsoid: Ellipsoid,
    fail_east_of: Option<f64>,
    calls: AtomicUsize,
}

impl RampTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_east_of(longitude: f64) -> Self {
        Self {
            fail_east_of: Some(longitude),
            ..Self::default()
        }
    }

    pub fn height_at(lon_degrees: f64) -> f64 {
        100.0 + 10.0 * lon_degrees
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TerrainProvider for RampTerrain {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    async fn sample_heights(&self, level: u32, points: &[GeodeticPoint2]) -> Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let degrees: Vec<GeodeticPoint2> = points.iter().map(GeodeticPoint2::to_degrees).collect();

        if let Some(limit) = self.fail_east_of {
            if degrees.iter().any(|p| p.lon() > limit) {
                return Err(DrapeError::TerrainQuery {
                    level,
                    message: format!("no terrain east of {limit}"),
                });
            }
        }
        Ok(degrees.iter().map(|p| Self::height_at(p.lon())).collect())
    }
}

/// Answers every query with no heights at all
#[derive(Debug, Default)]
pub struct ShortTerrain {
    ellipsoid: Ellipsoid,
}

impl TerrainProvider for ShortTerrain {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    async fn sample_heights(&self, _level: u32, _points: &[GeodeticPoint2]) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }
}
