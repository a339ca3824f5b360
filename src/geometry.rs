//! Planar predicates and constructions shared by the triangulation
//! and the coordinate schemes.
//!
//! Points are plain `[x, y]` pairs. None of these functions are robust
//! in the exact-arithmetic sense; callers apply their own tolerances
//! where a decision depends on the sign of a predicate.

/// Twice the signed area of the triangle `(a, b, c)`.
/// Positive when the vertices are in counter-clockwise order.
#[inline]
pub fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// In-circle determinant for a counter-clockwise triangle `(a, b, c)`.
/// Positive when `d` lies strictly inside the circumcircle.
#[inline]
pub fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    ad * (bdx * cdy - cdx * bdy) + bd * (cdx * ady - adx * cdy) + cd * (adx * bdy - bdx * ady)
}

/// Circumcenter of the triangle `(a, b, c)`, computed relative to `a`
/// to limit cancellation. Degenerate triangles give non-finite output.
#[inline]
pub fn circumcenter(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 2] {
    let (bx, by) = (b[0] - a[0], b[1] - a[1]);
    let (cx, cy) = (c[0] - a[0], c[1] - a[1]);
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let d = 2.0 * (bx * cy - by * cx);

    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;

    [a[0] + ux, a[1] + uy]
}

#[inline]
pub fn dist_sqr(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

#[inline]
pub fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    dist_sqr(a, b).sqrt()
}

/// Signed area of a simple polygon (shoelace formula).
pub fn polygon_area(polygon: &[[f64; 2]]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }

    // Shift to the first vertex so that far-away polygons
    // do not lose precision in the cross products
    let origin = polygon[0];
    let mut acc = 0.0;
    for i in 1..n - 1 {
        acc += orient(origin, polygon[i], polygon[i + 1]);
    }

    acc / 2.0
}

/// Parameter `t` of the orthogonal projection of `p` onto the segment `a -> b`,
/// clamped to `[0, 1]`. A zero-length segment projects to `t = 0`.
#[inline]
pub fn project_onto_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (ex, ey) = (b[0] - a[0], b[1] - a[1]);
    let len2 = ex * ex + ey * ey;
    if len2 == 0.0 {
        return 0.0;
    }
    let t = ((p[0] - a[0]) * ex + (p[1] - a[1]) * ey) / len2;
    t.clamp(0.0, 1.0)
}

/// Squared distance from `p` to the segment `a -> b`.
#[inline]
pub fn segment_dist_sqr(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let t = project_onto_segment(p, a, b);
    let q = [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])];
    dist_sqr(p, q)
}

/// Barycentric coordinates of `p` with respect to the triangle `(a, b, c)`.
#[inline]
pub fn barycentric(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 3] {
    let area = orient(a, b, c);
    let la = orient(p, b, c) / area;
    let lb = orient(a, p, c) / area;
    [la, lb, 1.0 - la - lb]
}
