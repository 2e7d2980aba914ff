use binrw::helpers::until_eof;
use binrw::{binread, BinRead, BinResult};
use nalgebra::Point3;

use crate::geometry::lerp;

pub mod classifier;
pub mod csv_writer;
pub mod drape;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod interpolator;
pub mod kml_reader;
pub mod kml_writer;
pub mod layer;
pub mod quantized_mesh_tile;
pub mod terrain;
pub mod viewer;
pub mod xml;

#[cfg(test)]
pub mod test_utils;

pub use error::{DrapeError, Result};

/// Quantized vertex coordinates run from 0 to `UV_MAX_U16` inclusive
pub const UV_MAX_U16: u16 = 32767;

// Quantized Mesh Binary Handling

#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct BoundingSphere {
    #[br(parse_with = parse_point3)]
    pub center: Point3<f64>,
    pub radius: f64,
}

#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct QuantizedMeshHeader {
    #[br(parse_with = parse_point3)]
    pub center: Point3<f64>,

    pub min_height: f32,

    pub max_height: f32,

    pub bounding_sphere: BoundingSphere,

    #[br(parse_with = parse_point3)]
    pub horizon_occlusion_point: Point3<f64>,
}

#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct VertexData {
    pub vertex_count: u32,

    #[br(count = vertex_count)]
    #[br(map = |i: Vec<u16>| i.vertex_vec_decode())]
    pub u: Vec<u16>,

    #[br(count = vertex_count)]
    #[br(map = |i: Vec<u16>| i.vertex_vec_decode())]
    pub v: Vec<u16>,

    #[br(count = vertex_count)]
    #[br(map = |i: Vec<u16>| i.vertex_vec_decode())]
    pub height: Vec<u16>,

    // index data is padded to its own element size
    #[br(align_before = if vertex_count > 65536 { 4 } else { 2 })]
    pub triangle_count: u32,

    #[br(parse_with = parse_triangle_indices, args(triangle_count as usize, vertex_count > 65536))]
    pub triangle_index: Vec<[u32; 3]>,

    #[br(args { long: vertex_count > 65536 })]
    pub edge_indices: EdgeIndices,
}

#[binread]
#[derive(Debug, Clone, Default)]
#[br(little)]
#[br(import { long: bool })]
pub struct EdgeIndices {
    pub west_vertex_count: u32,
    #[br(parse_with = read_u16_u32_as_u32, args(west_vertex_count as usize, long))]
    pub west_indices: Vec<u32>,

    pub south_vertex_count: u32,
    #[br(parse_with = read_u16_u32_as_u32, args(south_vertex_count as usize, long))]
    pub south_indices: Vec<u32>,

    pub east_vertex_count: u32,
    #[br(parse_with = read_u16_u32_as_u32, args(east_vertex_count as usize, long))]
    pub east_indices: Vec<u32>,

    pub north_vertex_count: u32,
    #[br(parse_with = read_u16_u32_as_u32, args(north_vertex_count as usize, long))]
    pub north_indices: Vec<u32>,
}

#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct Extension {
    pub extension_id: u8,

    pub extension_length: u32, // bytes

    #[br(count = extension_length)]
    pub extension_data: Vec<u8>,
}

#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct QuantizedMesh {
    pub header: QuantizedMeshHeader,
    pub vertex_data: VertexData,

    #[br(parse_with = until_eof)]
    pub extensions: Vec<Extension>,
}

impl QuantizedMesh {
    /// Vertex heights in metres
    pub fn interpolated_height_vertices(&self) -> Vec<f64> {
        let min_height = f64::from(self.header.min_height);
        let max_height = f64::from(self.header.max_height);
        self.vertex_data
            .height
            .iter()
            .map(|&h| lerp(min_height, max_height, f64::from(h) / f64::from(UV_MAX_U16)))
            .collect()
    }

    pub fn extension_ids(&self) -> Vec<u8> {
        self.extensions.iter().map(|e| e.extension_id).collect()
    }
}

pub fn zigzag_decode(n: i32) -> i32 {
    (n >> 1) ^ (-(n & 1))
}

trait VertexVecDecode {
    fn vertex_vec_decode(&self) -> Vec<u16>;
}

impl VertexVecDecode for Vec<u16> {
    // values are zig-zag encoded deltas from the previous vertex
    fn vertex_vec_decode(&self) -> Vec<u16> {
        let mut res: Vec<u16> = Vec::with_capacity(self.len());
        let mut val: i32 = 0;

        for &i in self.iter() {
            val += zigzag_decode(i32::from(i));
            res.push(val as u16);
        }
        res
    }
}

/// Decode high-watermark encoded indices. Returns `None` when a code refers
/// past the highest vertex seen so far.
pub fn high_watermark_decode(encoded: &[u32]) -> Option<Vec<u32>> {
    let mut decoded: Vec<u32> = Vec::with_capacity(encoded.len());
    let mut highest: u32 = 0;

    for &code in encoded.iter() {
        decoded.push(highest.checked_sub(code)?);
        if code == 0 {
            highest += 1;
        }
    }
    Some(decoded)
}

#[binrw::parser(reader, endian)]
fn parse_point3() -> BinResult<Point3<f64>> {
    Ok(Point3::new(
        <_>::read_options(reader, endian, ())?,
        <_>::read_options(reader, endian, ())?,
        <_>::read_options(reader, endian, ())?,
    ))
}

#[binrw::parser(reader, endian)]
fn parse_triangle_indices(triangle_count: usize, long: bool) -> BinResult<Vec<[u32; 3]>> {
    let encoded = read_u16_u32_as_u32(reader, endian, (triangle_count * 3, long))?;
    let pos = reader.stream_position()?;

    let decoded = high_watermark_decode(&encoded).ok_or_else(|| binrw::Error::AssertFail {
        pos,
        message: "triangle index exceeds high watermark".to_string(),
    })?;

    Ok(decoded.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect())
}

#[binrw::parser(reader, endian)]
pub fn read_u16_u32_as_u32(count: usize, long: bool) -> binrw::BinResult<Vec<u32>> {
    // count comes from the tile, grow as values are actually read
    let mut result = Vec::new();

    for _ in 0..count {
        if long {
            result.push(u32::read_options(reader, endian, ())?);
        } else {
            result.push(u32::from(u16::read_options(reader, endian, ())?));
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{encode_tile, ramp_tile_parts};
    use std::io::Cursor;

    #[test]
    fn test_zigzag_decode() {
        assert_eq!(zigzag_decode(0), 0);
        assert_eq!(zigzag_decode(1), -1);
        assert_eq!(zigzag_decode(2), 1);
        assert_eq!(zigzag_decode(3), -2);
    }

    #[test]
    fn test_vertex_vec_decode_accumulates_deltas() {
        // +10, -4, +32761
        let encoded: Vec<u16> = vec![20, 7, 65522];
        assert_eq!(encoded.vertex_vec_decode(), vec![10, 6, 32767]);
    }

    #[test]
    fn test_high_watermark_decode() {
        // triangles [0,1,2], [2,1,3]
        let encoded = vec![0, 0, 0, 1, 2, 0];
        assert_eq!(high_watermark_decode(&encoded), Some(vec![0, 1, 2, 2, 1, 3]));
    }

    #[test]
    fn test_high_watermark_decode_rejects_forward_reference() {
        assert_eq!(high_watermark_decode(&[0, 2]), None);
    }

    #[test]
    fn test_read_encoded_tile() {
        let (u, v, height, triangles) = ramp_tile_parts();
        let bytes = encode_tile(&u, &v, &height, &triangles, 100.0, 300.0, &[(4, b"{}".to_vec())]);

        let qm = QuantizedMesh::read_le(&mut Cursor::new(bytes)).expect("tile decodes");

        assert_eq!(qm.vertex_data.vertex_count, 4);
        assert_eq!(qm.vertex_data.u, u);
        assert_eq!(qm.vertex_data.v, v);
        assert_eq!(qm.vertex_data.triangle_index, triangles);
        assert_eq!(qm.header.min_height, 100.0);
        assert_eq!(qm.extension_ids(), vec![4]);
        assert_eq!(qm.vertex_data.edge_indices.west_vertex_count, 2);
        assert_eq!(qm.vertex_data.edge_indices.north_indices, vec![2, 3]);

        let heights = qm.interpolated_height_vertices();
        assert_eq!(heights[0], 100.0);
        assert_eq!(heights[1], 300.0);
    }
}
