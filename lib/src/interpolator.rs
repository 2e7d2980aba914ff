use nalgebra::{Matrix2, Point2};

use crate::geometry::Triangle;

/// Points this far outside a triangle edge (in barycentric units) still count
/// as inside, so samples on a shared edge always hit one of the triangles.
pub const EDGE_TOLERANCE: f64 = 1e-12;

/// Barycentric coordinates of `point` with respect to `triangle`, or `None`
/// when the triangle is degenerate.
pub fn barycentric_coordinates(point: &Point2<f64>, triangle: &Triangle) -> Option<[f64; 3]> {
    let v0 = triangle.vertices[0];
    let v1 = triangle.vertices[1];
    let v2 = triangle.vertices[2];

    // Translate points so that v0 is the origin
    let p_prime = point - v0;
    let v1_prime = v1 - v0;
    let v2_prime = v2 - v0;

    // Create the 2x2 matrix A with v1_prime and v2_prime as columns
    let a = Matrix2::new(v1_prime.x, v2_prime.x, v1_prime.y, v2_prime.y);

    let lambda = a.try_inverse()? * p_prime;
    Some([1.0 - lambda.x - lambda.y, lambda.x, lambda.y])
}

pub fn interpolate_height_barycentric(
    point: &Point2<f64>,
    triangle: &Triangle,
    heights: &[f64; 3],
) -> Option<f64> {
    let [lambda0, lambda1, lambda2] = barycentric_coordinates(point, triangle)?;

    if lambda0 >= -EDGE_TOLERANCE && lambda1 >= -EDGE_TOLERANCE && lambda2 >= -EDGE_TOLERANCE {
        Some(lambda0 * heights[0] + lambda1 * heights[1] + lambda2 * heights[2])
    } else {
        None
    }
}
