//! Read-only Delaunay triangulation of the data sites.
//!
//! Construction is delegated to `delaunator`; this module derives the
//! adjacency the natural-neighbour schemes need (triangle neighbours,
//! vertex one-rings, hull edges) and answers location queries against it.
//!
//! "Inserting" a query point is never done for real. Instead the
//! Bowyer-Watson cavity of the point is discovered by walking the triangles
//! whose circumcircle contains it, which leaves the triangulation untouched
//! and makes every query safe to run from several workers at once.
use std::collections::HashMap;

use rand::Rng;

use crate::error::{InterpolationError, Result};
use crate::geometry::{dist_sqr, in_circle, orient, project_onto_segment, segment_dist_sqr};

/// Marker for a missing triangle (across a hull edge).
pub const NONE: usize = usize::MAX;

/// Result of walking the triangulation towards a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// The point is inside (or on the boundary of) this triangle.
    Inside(usize),
    /// The point is strictly outside the hull; the walk left through
    /// the edge opposite local vertex `edge` of `triangle`.
    Outside { triangle: usize, edge: usize },
}

/// One edge of a cavity boundary, oriented counter-clockwise around the
/// cavity, together with the cavity triangle it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeEdge {
    pub from: usize,
    pub to: usize,
    pub triangle: usize,
}

/// A planar Delaunay triangulation with counter-clockwise triangles.
#[derive(Clone, Debug)]
pub struct Triangulation {
    /// Site locations, indexed like the data values
    points: Vec<[f64; 2]>,

    /// Vertex indices of each triangle, counter-clockwise
    triangles: Vec<[usize; 3]>,

    /// `neighbours[t][k]` is the triangle across the edge opposite
    /// local vertex `k` of triangle `t`, or `NONE` on the hull
    neighbours: Vec<[usize; 3]>,

    /// One triangle incident to each vertex
    vertex_triangle: Vec<usize>,

    /// Sorted one-ring of each vertex
    rings: Vec<Vec<usize>>,

    /// Hull edges, oriented with the triangulation on their left
    hull_edges: Vec<[usize; 2]>,

    on_hull: Vec<bool>,

    /// Largest extent of the bounding box, used to scale tolerances
    scale: f64,
}

impl Triangulation {
    /// Triangulate a set of sites.
    ///
    /// # Errors
    /// * If there are fewer than three sites, or all sites are collinear
    /// * If two sites coincide (the duplicate would never be reachable)
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self> {
        let n = points.len();
        if n < 3 {
            return Err(InterpolationError::DegenerateTriangulation(format!(
                "need at least 3 sites, got {n}"
            )));
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(InterpolationError::InvalidParameter(
                "site coordinates must be finite".to_owned(),
            ));
        }

        let delaunator_points: Vec<delaunator::Point> = points
            .iter()
            .map(|p| delaunator::Point { x: p[0], y: p[1] })
            .collect();
        let delaunay = delaunator::triangulate(&delaunator_points);
        if delaunay.triangles.is_empty() {
            return Err(InterpolationError::DegenerateTriangulation(
                "all sites are collinear".to_owned(),
            ));
        }

        // Normalize every triangle to counter-clockwise order
        let triangles: Vec<[usize; 3]> = delaunay
            .triangles
            .chunks_exact(3)
            .map(|t| {
                if orient(points[t[0]], points[t[1]], points[t[2]]) < 0.0 {
                    [t[0], t[2], t[1]]
                } else {
                    [t[0], t[1], t[2]]
                }
            })
            .collect();

        // Directed edge -> triangle; the neighbour across an edge owns its reverse
        let mut edges: HashMap<(usize, usize), usize> = HashMap::with_capacity(3 * triangles.len());
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                edges.insert((tri[(k + 1) % 3], tri[(k + 2) % 3]), t);
            }
        }

        let mut neighbours = vec![[NONE; 3]; triangles.len()];
        let mut vertex_triangle = vec![NONE; n];
        let mut rings: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut hull_edges = Vec::new();
        let mut on_hull = vec![false; n];
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                let (u, v) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
                vertex_triangle[tri[k]] = t;
                rings[u].push(v);
                rings[v].push(u);
                match edges.get(&(v, u)) {
                    Some(&other) => neighbours[t][k] = other,
                    None => {
                        hull_edges.push([u, v]);
                        on_hull[u] = true;
                        on_hull[v] = true;
                    }
                }
            }
        }
        for ring in rings.iter_mut() {
            ring.sort_unstable();
            ring.dedup();
        }

        if let Some(i) = vertex_triangle.iter().position(|&t| t == NONE) {
            return Err(InterpolationError::DuplicatePoint(i));
        }

        let (mut lo, mut hi) = ([f64::MAX; 2], [f64::MIN; 2]);
        for p in points.iter() {
            for ((l, h), &v) in lo.iter_mut().zip(hi.iter_mut()).zip(p.iter()) {
                *l = l.min(v);
                *h = h.max(v);
            }
        }
        let scale = (hi[0] - lo[0]).max(hi[1] - lo[1]).max(f64::MIN_POSITIVE);

        log::debug!(
            "Triangulated {} sites into {} triangles with {} hull edges",
            n,
            triangles.len(),
            hull_edges.len()
        );

        Ok(Self {
            points,
            triangles,
            neighbours,
            vertex_triangle,
            rings,
            hull_edges,
            on_hull,
            scale,
        })
    }

    /// Triangulate sites given as separate coordinate arrays.
    pub fn from_xy(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(InterpolationError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        Self::new(x.iter().zip(y.iter()).map(|(&x, &y)| [x, y]).collect())
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn point(&self, i: usize) -> [f64; 2] {
        self.points[i]
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    #[inline]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        self.triangles[t]
    }

    /// Triangle across the edge opposite local vertex `k` of `t`.
    #[inline]
    pub fn neighbour(&self, t: usize, k: usize) -> usize {
        self.neighbours[t][k]
    }

    /// Vertices sharing an edge with `i`.
    #[inline]
    pub fn ring(&self, i: usize) -> &[usize] {
        &self.rings[i]
    }

    #[inline]
    pub fn is_on_hull(&self, i: usize) -> bool {
        self.on_hull[i]
    }

    pub fn hull_edges(&self) -> &[[usize; 2]] {
        &self.hull_edges
    }

    /// Largest extent of the sites' bounding box.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Whether the edge opposite local vertex `k` of `t` is a hull edge.
    #[inline]
    pub fn is_hull_edge(&self, t: usize, k: usize) -> bool {
        self.neighbours[t][k] == NONE
    }

    /// Endpoints of the edge opposite local vertex `k` of `t`, counter-clockwise.
    #[inline]
    pub fn edge(&self, t: usize, k: usize) -> (usize, usize) {
        let tri = self.triangles[t];
        (tri[(k + 1) % 3], tri[(k + 2) % 3])
    }

    /// Does `p` lie strictly inside the circumcircle of triangle `t`?
    #[inline]
    pub fn circumcircle_contains(&self, t: usize, p: [f64; 2]) -> bool {
        let [a, b, c] = self.triangles[t];
        in_circle(self.points[a], self.points[b], self.points[c], p) > 0.0
    }

    /// Visibility walk ("jump-and-march") from triangle `start` towards `p`.
    ///
    /// When several edges separate the current triangle from `p`, the one to
    /// cross is picked at random, which rules out the cycles a deterministic
    /// walk can fall into on degenerate input. An out-of-range start (such as
    /// `NONE`) begins at the triangle of vertex 0.
    pub fn locate<R: Rng>(&self, p: [f64; 2], start: usize, rng: &mut R) -> Location {
        let mut t = if start < self.triangles.len() {
            start
        } else {
            self.vertex_triangle[0]
        };

        // On a Delaunay triangulation the walk visits each triangle at most once
        let max_steps = 4 * self.triangles.len() + 8;
        for _ in 0..max_steps {
            let offset = rng.random_range(0..3);
            let mut next = None;
            for j in 0..3 {
                let k = (offset + j) % 3;
                let (u, v) = self.edge(t, k);
                if orient(self.points[u], self.points[v], p) < 0.0 {
                    next = Some(k);
                    break;
                }
            }

            match next {
                None => return Location::Inside(t),
                Some(k) => match self.neighbours[t][k] {
                    NONE => return Location::Outside { triangle: t, edge: k },
                    n => t = n,
                },
            }
        }

        log::trace!("Walk towards {p:?} did not settle; falling back to a full scan");
        self.locate_by_scan(p)
    }

    /// Brute-force location, only used when the walk fails to terminate.
    fn locate_by_scan(&self, p: [f64; 2]) -> Location {
        let mut best = (0, f64::MIN);
        for t in 0..self.triangles.len() {
            // Smallest edge orientation; non-negative means p is in t
            let worst = (0..3)
                .map(|k| {
                    let (u, v) = self.edge(t, k);
                    orient(self.points[u], self.points[v], p)
                })
                .fold(f64::MAX, f64::min);
            if worst >= 0.0 {
                return Location::Inside(t);
            }
            if worst > best.1 {
                best = (t, worst);
            }
        }

        // Nothing contains p; report the hull edge it is closest to
        let [a, b] = self.nearest_hull_edge(p);
        let t = self.vertex_triangle[a];
        for k in 0..3 {
            if self.edge(t, k) == (a, b) {
                return Location::Outside { triangle: t, edge: k };
            }
        }
        Location::Outside {
            triangle: best.0,
            edge: 0,
        }
    }

    /// If `p` lies on a hull edge of triangle `t` (within a relative
    /// tolerance, on either side), return that edge's endpoints.
    pub fn hull_edge_through(&self, t: usize, p: [f64; 2]) -> Option<(usize, usize)> {
        (0..3)
            .filter(|&k| self.is_hull_edge(t, k))
            .map(|k| self.edge(t, k))
            .find(|&(u, v)| {
                segment_dist_sqr(p, self.points[u], self.points[v])
                    <= (ON_EDGE_TOLERANCE * self.scale).powi(2)
            })
    }

    /// Vertex of triangle `t` that coincides with `p`, if any.
    pub fn vertex_at(&self, t: usize, p: [f64; 2]) -> Option<usize> {
        let tol2 = (COINCIDENT_TOLERANCE * self.scale).powi(2);
        self.triangles[t]
            .iter()
            .copied()
            .find(|&v| dist_sqr(self.points[v], p) <= tol2)
    }

    /// Collect the Bowyer-Watson cavity of `p`: the connected set of
    /// triangles, starting from the containing triangle `t0`, whose
    /// circumcircle strictly contains `p`.
    pub fn cavity(&self, p: [f64; 2], t0: usize, cavity: &mut Vec<usize>, stack: &mut Vec<usize>) {
        cavity.clear();
        stack.clear();
        cavity.push(t0);
        stack.push(t0);
        while let Some(t) = stack.pop() {
            for k in 0..3 {
                let n = self.neighbours[t][k];
                if n != NONE && !cavity.contains(&n) && self.circumcircle_contains(n, p) {
                    cavity.push(n);
                    stack.push(n);
                }
            }
        }
    }

    /// Boundary of a cavity as a closed counter-clockwise chain of edges,
    /// each `to` being the next edge's `from`.
    ///
    /// # Errors
    /// * If the boundary is not a single simple cycle, which only happens
    ///   when the cavity was not produced by [`Triangulation::cavity`]
    pub fn envelope(&self, cavity: &[usize], out: &mut Vec<EnvelopeEdge>) -> Result<()> {
        out.clear();
        for &t in cavity {
            for k in 0..3 {
                let n = self.neighbours[t][k];
                if n == NONE || !cavity.contains(&n) {
                    let (from, to) = self.edge(t, k);
                    out.push(EnvelopeEdge {
                        from,
                        to,
                        triangle: t,
                    });
                }
            }
        }

        // Chain the edges in place
        let m = out.len();
        for i in 1..m {
            let to = out[i - 1].to;
            match (i..m).find(|&j| out[j].from == to) {
                Some(j) => out.swap(i, j),
                None => {
                    return Err(InterpolationError::DegenerateTriangulation(
                        "cavity boundary is not a closed cycle".to_owned(),
                    ))
                }
            }
        }
        if m < 3 || out[m - 1].to != out[0].from {
            return Err(InterpolationError::DegenerateTriangulation(
                "cavity boundary is not a closed cycle".to_owned(),
            ));
        }

        // Start from the lowest site so that the result does not depend on
        // which triangle the walk reached first
        if let Some(start) = (0..m).min_by_key(|&i| out[i].from) {
            out.rotate_left(start);
        }

        Ok(())
    }

    /// Nearest site to `p`, by greedy descent on the Delaunay graph from `start`.
    /// On a Delaunay triangulation the local minimum is the global one.
    pub fn nearest_vertex(&self, p: [f64; 2], start: usize) -> usize {
        let mut current = if start < self.points.len() { start } else { 0 };
        let mut best = dist_sqr(self.points[current], p);
        loop {
            let mut moved = false;
            for &v in self.rings[current].iter() {
                let d = dist_sqr(self.points[v], p);
                if d < best {
                    best = d;
                    current = v;
                    moved = true;
                }
            }
            if !moved {
                return current;
            }
        }
    }

    /// Hull edge closest to `p`.
    pub fn nearest_hull_edge(&self, p: [f64; 2]) -> [usize; 2] {
        let mut best = (self.hull_edges[0], f64::MAX);
        for &[a, b] in self.hull_edges.iter() {
            let d = segment_dist_sqr(p, self.points[a], self.points[b]);
            if d < best.1 {
                best = ([a, b], d);
            }
        }
        best.0
    }

    /// Distance from `p` to the hull boundary.
    pub fn distance_to_hull(&self, p: [f64; 2]) -> f64 {
        let [a, b] = self.nearest_hull_edge(p);
        segment_dist_sqr(p, self.points[a], self.points[b]).sqrt()
    }

    /// Project `p` onto the closest hull edge, returning the edge
    /// endpoints and the (clamped) position along it.
    pub fn project_onto_hull(&self, p: [f64; 2]) -> (usize, usize, f64) {
        let [a, b] = self.nearest_hull_edge(p);
        let t = project_onto_segment(p, self.points[a], self.points[b]);
        (a, b, t)
    }
}

/// Relative distance under which a point is considered on a hull edge.
const ON_EDGE_TOLERANCE: f64 = 1e-12;

/// Relative distance under which a point is considered to be a site.
const COINCIDENT_TOLERANCE: f64 = 1e-12;
