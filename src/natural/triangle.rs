use crate::geometry::barycentric;
use crate::triangulation::Triangulation;

use super::NaturalCoordinates;

/// Barycentric coordinates of `point` in triangle `t`.
pub(super) fn coordinates(tri: &Triangulation, t: usize, point: [f64; 2]) -> NaturalCoordinates {
    let [a, b, c] = tri.triangle(t);
    let lambda = barycentric(point, tri.point(a), tri.point(b), tri.point(c));

    // Negative weights only come from rounding at the triangle's edges
    let coordinates = lambda.iter().map(|w| w.max(0.0)).collect();
    NaturalCoordinates {
        coordinates,
        indices: vec![a, b, c],
        point,
    }
}
