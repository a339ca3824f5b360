//! Sibson and Laplace coordinates from a simulated insertion.
//!
//! Both schemes start from the envelope of the query point's cavity.
//! Inserting the point would connect it to every envelope vertex, and the
//! circumcenters of those new triangles are the vertices of its Voronoi cell.
//! * Laplace weighs each envelope vertex by the length of the cell facet it
//!   would share with the point, over its distance to the point.
//! * Sibson weighs it by the area its own cell would lose, which is the
//!   polygon bounded by the new facet and by the old Voronoi vertices of
//!   that site that fall inside the new cell (the circumcenters of the
//!   cavity triangles around it).
use crate::error::{InterpolationError, Result};
use crate::geometry::{circumcenter, dist, polygon_area};
use crate::triangulation::{Triangulation, NONE};

use super::{NaturalCoordinates, NeighbourCache};

/// Simulate the insertion of `point` (found in triangle `t0`), leaving its
/// envelope in `cache.envelope` and the new Voronoi vertices in
/// `cache.voronoi`, where `voronoi[i]` is the circumcenter of
/// `(point, envelope[i].from, envelope[i].to)`.
fn insert_virtually(
    tri: &Triangulation,
    t0: usize,
    point: [f64; 2],
    cache: &mut NeighbourCache,
) -> Result<()> {
    tri.cavity(point, t0, &mut cache.cavity, &mut cache.stack);
    tri.envelope(&cache.cavity, &mut cache.envelope)?;

    cache.voronoi.clear();
    cache.voronoi.extend(
        cache
            .envelope
            .iter()
            .map(|e| circumcenter(point, tri.point(e.from), tri.point(e.to))),
    );

    Ok(())
}

/// Sibson (area-stealing) coordinates, not yet normalized.
pub(super) fn sibson(
    tri: &Triangulation,
    t0: usize,
    point: [f64; 2],
    cache: &mut NeighbourCache,
) -> Result<NaturalCoordinates> {
    insert_virtually(tri, t0, point, cache)?;

    let m = cache.envelope.len();
    let mut coordinates = Vec::with_capacity(m);
    let mut indices = Vec::with_capacity(m);
    for i in 0..m {
        let edge = cache.envelope[i];
        let u = edge.from;
        let prev = cache.envelope[(i + m - 1) % m].from;

        cache.polygon.clear();
        cache.polygon.push(cache.voronoi[i]);

        // Fan of cavity triangles around u, counter-clockwise from the one
        // holding (u, next) to the one holding (prev, u)
        let mut t = edge.triangle;
        for _ in 0..cache.cavity.len() {
            let [a, b, c] = tri.triangle(t);
            cache
                .polygon
                .push(circumcenter(tri.point(a), tri.point(b), tri.point(c)));

            let k = position(tri.triangle(t), u)?;
            if tri.triangle(t)[(k + 2) % 3] == prev {
                break;
            }
            t = tri.neighbour(t, (k + 1) % 3);
            if t == NONE {
                return Err(malformed());
            }
        }

        cache.polygon.push(cache.voronoi[(i + m - 1) % m]);

        coordinates.push(polygon_area(&cache.polygon).abs());
        indices.push(u);
    }

    NaturalCoordinates::new(coordinates, indices, point)
}

/// Laplace (non-Sibsonian) coordinates, not yet normalized.
pub(super) fn laplace(
    tri: &Triangulation,
    t0: usize,
    point: [f64; 2],
    cache: &mut NeighbourCache,
) -> Result<NaturalCoordinates> {
    insert_virtually(tri, t0, point, cache)?;

    let m = cache.envelope.len();
    let voronoi = &cache.voronoi;
    let (coordinates, indices) = cache
        .envelope
        .iter()
        .enumerate()
        .map(|(i, edge)| {
            let facet = dist(voronoi[i], voronoi[(i + m - 1) % m]);
            (facet / dist(point, tri.point(edge.from)), edge.from)
        })
        .unzip();

    NaturalCoordinates::new(coordinates, indices, point)
}

/// Local index of vertex `v` in a triangle.
#[inline]
fn position(triangle: [usize; 3], v: usize) -> Result<usize> {
    triangle.iter().position(|&w| w == v).ok_or_else(malformed)
}

fn malformed() -> InterpolationError {
    InterpolationError::DegenerateTriangulation("cavity fan around a site is broken".to_owned())
}
