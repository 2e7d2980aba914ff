use criterion::{criterion_group, criterion_main, Criterion};
use kmldrape::{
    geometry::{GeodeticPoint2, Triangle},
    interpolator::interpolate_height_barycentric,
    quantized_mesh_tile::{QuantizedMeshTile, TilingScheme},
    BoundingSphere, EdgeIndices, QuantizedMesh, QuantizedMeshHeader, VertexData, UV_MAX_U16,
};
use nalgebra::{Point2, Point3};

// regular grid of `cells` x `cells` squares, two triangles each
fn grid_tile(cells: u32) -> QuantizedMeshTile {
    let step = f64::from(UV_MAX_U16) / f64::from(cells);
    let side = cells + 1;

    let mut u = Vec::new();
    let mut v = Vec::new();
    let mut height = Vec::new();
    for row in 0..side {
        for col in 0..side {
            u.push((f64::from(col) * step).round() as u16);
            v.push((f64::from(row) * step).round() as u16);
            height.push(((col * 7 + row * 13) % 100 * 300) as u16);
        }
    }

    let mut triangle_index = Vec::new();
    for row in 0..cells {
        for col in 0..cells {
            let sw = row * side + col;
            let se = sw + 1;
            let nw = sw + side;
            let ne = nw + 1;
            triangle_index.push([sw, se, nw]);
            triangle_index.push([nw, se, ne]);
        }
    }

    let quantized_mesh = QuantizedMesh {
        header: QuantizedMeshHeader {
            center: Point3::origin(),
            min_height: 0.0,
            max_height: 4000.0,
            bounding_sphere: BoundingSphere {
                center: Point3::origin(),
                radius: 6_378_137.0,
            },
            horizon_occlusion_point: Point3::origin(),
        },
        vertex_data: VertexData {
            vertex_count: side * side,
            u,
            v,
            height,
            triangle_count: triangle_index.len() as u32,
            triangle_index,
            edge_indices: EdgeIndices::default(),
        },
        extensions: vec![],
    };

    QuantizedMeshTile::new(quantized_mesh, 11, 3370, 1436, TilingScheme::Tms)
}

fn benchmark(c: &mut Criterion) {
    let triangle = Triangle {
        vertices: [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(0.0, 10.0)],
    };
    let heights = [0.0, 10.0, 20.0];

    // Create a grid of points that overlap the triangle
    let points: Vec<Point2<f64>> = (0..11)
        .flat_map(|x| (0..11).map(move |y| Point2::new(f64::from(x), f64::from(y))))
        .collect();

    c.bench_function("interpolate_height_barycentric", |b| {
        b.iter(|| {
            for point in &points {
                let _ = interpolate_height_barycentric(point, &triangle, &heights);
            }
        })
    });

    let tile = grid_tile(64);
    let (west, south, east, north) = tile.bounding_rectangle.to_degrees();
    let samples: Vec<GeodeticPoint2> = (0..32)
        .flat_map(|i| {
            (0..32).map(move |j| {
                GeodeticPoint2::from_degrees(
                    west + (east - west) * (f64::from(i) + 0.5) / 32.0,
                    south + (north - south) * (f64::from(j) + 0.5) / 32.0,
                )
            })
        })
        .collect();

    c.bench_function("tile_interpolate_height", |b| {
        b.iter(|| {
            for point in &samples {
                let _ = tile.interpolate_height(point);
            }
        })
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
