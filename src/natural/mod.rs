//! Natural-neighbour coordinates of a query point.
//!
//! Every scheme reduces a query to a short list of `(weight, site)` pairs
//! whose weighted sum of data values is the interpolated value:
//!
//! | Scheme          | Sites used                 | Continuity at sites |
//! |-----------------|----------------------------|---------------------|
//! | `Sibson(0)`     | natural neighbours         | C(0)                |
//! | `Sibson(1)`     | natural neighbours + grads | C(1)                |
//! | `Laplace`       | natural neighbours         | C(0)                |
//! | `Triangle`      | containing triangle        | C(0)                |
//! | `Nearest`       | nearest site               | none                |
//!
//! The length of the result carries meaning:
//! * 0 sites: outside the hull with projection disabled (undefined)
//! * 1 site: the query coincides with a site
//! * 2 sites: on the hull, or projected onto it from outside
//! * 3 or more: a genuine blend
mod triangle;
mod voronoi;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{InterpolationError, Result};
use crate::geometry::project_onto_segment;
use crate::triangulation::{EnvelopeEdge, Location, Triangulation, NONE};

/// Seed used for location tie-breaking when the caller does not pick one.
pub(crate) const DEFAULT_SEED: u64 = 0x5eed_0f_5185_0f;

/// Coordinate scheme used to blend data values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationMethod {
    /// Sibson's area-stealing coordinates. `Sibson(1)` additionally blends
    /// in a gradient-based estimate to be C(1) at the sites.
    Sibson(u8),
    /// Barycentric coordinates of the containing triangle.
    Triangle,
    /// Value of the nearest site.
    Nearest,
    /// Laplace (non-Sibsonian) coordinates.
    Laplace,
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        InterpolationMethod::Sibson(0)
    }
}

impl InterpolationMethod {
    /// Check that the continuity order is supported.
    pub fn validate(&self) -> Result<()> {
        match self {
            InterpolationMethod::Sibson(d) if *d > 1 => Err(InterpolationError::InvalidParameter(
                format!("Sibson continuity must be 0 or 1, got {d}"),
            )),
            _ => Ok(()),
        }
    }

    /// Scheme used to resolve coordinates; `Sibson(1)` shares `Sibson(0)`'s.
    #[inline]
    pub(crate) fn coordinates(&self) -> InterpolationMethod {
        match self {
            InterpolationMethod::Sibson(_) => InterpolationMethod::Sibson(0),
            other => *other,
        }
    }
}

/// Weights and site indices blending data values into a value at `point`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NaturalCoordinates {
    coordinates: Vec<f64>,
    indices: Vec<usize>,
    point: [f64; 2],
}

impl NaturalCoordinates {
    pub fn new(coordinates: Vec<f64>, indices: Vec<usize>, point: [f64; 2]) -> Result<Self> {
        if coordinates.len() != indices.len() {
            return Err(InterpolationError::DimensionMismatch {
                expected: indices.len(),
                actual: coordinates.len(),
            });
        }
        Ok(Self {
            coordinates,
            indices,
            point,
        })
    }

    /// Query coincides with site `index`.
    pub(crate) fn exact(index: usize, point: [f64; 2]) -> Self {
        Self {
            coordinates: vec![1.0],
            indices: vec![index],
            point,
        }
    }

    /// Linear blend between `a` and `b`, `t` being the position along `a -> b`.
    pub(crate) fn two_point(a: usize, b: usize, t: f64, point: [f64; 2]) -> Self {
        Self {
            coordinates: vec![1.0 - t, t],
            indices: vec![a, b],
            point,
        }
    }

    /// Outside the hull with no extrapolation.
    pub(crate) fn undefined(point: [f64; 2]) -> Self {
        Self {
            coordinates: Vec::new(),
            indices: Vec::new(),
            point,
        }
    }

    #[inline]
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn point(&self) -> [f64; 2] {
        self.point
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The query is exactly a data site.
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.indices.len() == 1
    }

    /// `(weight, site)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.coordinates
            .iter()
            .copied()
            .zip(self.indices.iter().copied())
    }

    /// Weighted sum of site values; `+Infinity` when undefined.
    pub fn weighted_sum(&self, z: &[f64]) -> f64 {
        if self.is_empty() {
            return f64::INFINITY;
        }
        self.iter().map(|(w, k)| w * z[k]).sum()
    }

    /// Scale weights to sum to one.
    fn normalize(&mut self) {
        let total: f64 = self.coordinates.iter().sum();
        self.coordinates.iter_mut().for_each(|w| *w /= total);
    }
}

/// Per-worker scratch space for coordinate resolution.
///
/// Holds the last located triangle and nearest site, which only speed up
/// the next walk, plus buffers reused by every virtual insertion.
#[derive(Clone, Debug)]
pub struct NeighbourCache {
    last_triangle: usize,
    last_vertex: usize,
    rng: StdRng,
    cavity: Vec<usize>,
    stack: Vec<usize>,
    envelope: Vec<EnvelopeEdge>,
    voronoi: Vec<[f64; 2]>,
    polygon: Vec<[f64; 2]>,
}

impl Default for NeighbourCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl NeighbourCache {
    pub fn new(seed: u64) -> Self {
        Self {
            last_triangle: NONE,
            last_vertex: 0,
            rng: StdRng::seed_from_u64(seed),
            cavity: Vec::new(),
            stack: Vec::new(),
            envelope: Vec::new(),
            voronoi: Vec::new(),
            polygon: Vec::new(),
        }
    }

    /// Restart the tie-breaking sequence.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Resolve the natural coordinates of `point` under `method`.
///
/// Outside the hull, `project` selects between blending the endpoints of
/// the nearest hull edge and returning undefined (empty) coordinates.
/// The triangulation is never modified.
///
/// # Errors
/// * If `method` is an unsupported Sibson order
/// * If the cavity around `point` is malformed, which indicates a corrupt triangulation
pub fn compute_natural_coordinates(
    method: InterpolationMethod,
    tri: &Triangulation,
    point: [f64; 2],
    cache: &mut NeighbourCache,
    project: bool,
) -> Result<NaturalCoordinates> {
    method.validate()?;

    if method == InterpolationMethod::Nearest {
        if !project && outside_hull(tri, point, cache) {
            return Ok(extrapolate(tri, point, false));
        }
        let v = tri.nearest_vertex(point, cache.last_vertex);
        cache.last_vertex = v;
        return Ok(NaturalCoordinates::exact(v, point));
    }

    let t = match tri.locate(point, cache.last_triangle, &mut cache.rng) {
        Location::Inside(t) => t,
        Location::Outside { triangle, .. } => {
            cache.last_triangle = triangle;
            // Rounding can push points on the hull just outside of it
            if let Some((a, b)) = tri.hull_edge_through(triangle, point) {
                return Ok(on_edge(tri, a, b, point));
            }
            return Ok(extrapolate(tri, point, project));
        }
    };
    cache.last_triangle = t;

    if let Some(v) = tri.vertex_at(t, point) {
        return Ok(NaturalCoordinates::exact(v, point));
    }

    // Cavity circumcenters degenerate on the hull itself
    if let Some((a, b)) = tri.hull_edge_through(t, point) {
        return Ok(on_edge(tri, a, b, point));
    }

    let mut coordinates = match method.coordinates() {
        InterpolationMethod::Triangle => triangle::coordinates(tri, t, point),
        InterpolationMethod::Laplace => voronoi::laplace(tri, t, point, cache)?,
        _ => voronoi::sibson(tri, t, point, cache)?,
    };
    coordinates.normalize();

    Ok(coordinates)
}

/// Whether `point` lies strictly outside the hull, rather than inside it or
/// on it up to rounding.
fn outside_hull(tri: &Triangulation, point: [f64; 2], cache: &mut NeighbourCache) -> bool {
    match tri.locate(point, cache.last_triangle, &mut cache.rng) {
        Location::Inside(t) => {
            cache.last_triangle = t;
            false
        }
        Location::Outside { triangle, .. } => {
            cache.last_triangle = triangle;
            tri.hull_edge_through(triangle, point).is_none()
        }
    }
}

/// Coordinates for a point on the hull edge `a -> b`.
fn on_edge(tri: &Triangulation, a: usize, b: usize, point: [f64; 2]) -> NaturalCoordinates {
    let t = project_onto_segment(point, tri.point(a), tri.point(b));
    NaturalCoordinates::two_point(a, b, t, point)
}

/// Coordinates for a point outside the hull.
fn extrapolate(tri: &Triangulation, point: [f64; 2], project: bool) -> NaturalCoordinates {
    if !project {
        log::trace!("{point:?} is outside the hull; leaving it undefined");
        return NaturalCoordinates::undefined(point);
    }
    let (a, b, t) = tri.project_onto_hull(point);
    log::trace!("{point:?} is outside the hull; projecting onto edge ({a}, {b})");
    NaturalCoordinates::two_point(a, b, t, point)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{dist_sqr, segment_dist_sqr};
    use crate::testing::*;
    use crate::utils::*;

    const METHODS: [InterpolationMethod; 4] = [
        InterpolationMethod::Sibson(0),
        InterpolationMethod::Triangle,
        InterpolationMethod::Nearest,
        InterpolationMethod::Laplace,
    ];

    fn random_triangulation(n: usize) -> Triangulation {
        let mut rng = rng_fixed_seed();
        let x = randn::<f64>(&mut rng, n);
        let y = randn::<f64>(&mut rng, n);
        Triangulation::from_xy(&x, &y).unwrap()
    }

    /// Grid of query points at least `margin` inside the hull
    fn interior_queries(tri: &Triangulation, margin: f64) -> Vec<[f64; 2]> {
        let xs = linspace(0.0, 1.0, 25);
        let mut cache = NeighbourCache::default();
        meshgrid(vec![&xs, &xs])
            .iter()
            .map(|q| [q[0], q[1]])
            .filter(|&p| {
                let inside = matches!(
                    tri.locate(p, NONE, &mut cache.rng),
                    Location::Inside(_)
                );
                inside && tri.distance_to_hull(p) > margin
            })
            .collect()
    }

    #[test]
    fn test_partition_of_unity() {
        let tri = random_triangulation(80);
        let mut cache = NeighbourCache::default();
        let queries = interior_queries(&tri, 1e-3);
        assert!(queries.len() > 100);

        for method in METHODS {
            for &p in queries.iter() {
                let nc = compute_natural_coordinates(method, &tri, p, &mut cache, true).unwrap();
                let total: f64 = nc.coordinates().iter().sum();
                assert!((total - 1.0).abs() < 1e-10, "{method:?} at {p:?}: {total}");
                assert!(
                    nc.coordinates().iter().all(|&w| w >= -1e-12),
                    "{method:?} at {p:?}: {:?}",
                    nc.coordinates()
                );
                assert!(nc.indices().iter().all(|&k| k < tri.num_points()));
            }
        }
    }

    #[test]
    fn test_linear_precision() {
        // Sibson, Laplace and barycentric coordinates all reproduce the point itself
        let tri = random_triangulation(80);
        let mut cache = NeighbourCache::default();

        for method in [
            InterpolationMethod::Sibson(0),
            InterpolationMethod::Laplace,
            InterpolationMethod::Triangle,
        ] {
            for &p in interior_queries(&tri, 1e-2).iter() {
                let nc = compute_natural_coordinates(method, &tri, p, &mut cache, true).unwrap();
                let q = nc.iter().fold([0.0, 0.0], |acc, (w, k)| {
                    let pk = tri.point(k);
                    [acc[0] + w * pk[0], acc[1] + w * pk[1]]
                });
                assert!(dist_sqr(p, q).sqrt() < 1e-8, "{method:?} at {p:?} gave {q:?}");
            }
        }
    }

    #[test]
    fn test_sites_are_exact() {
        let tri = random_triangulation(40);
        let mut cache = NeighbourCache::default();
        for method in METHODS {
            for i in 0..tri.num_points() {
                let nc =
                    compute_natural_coordinates(method, &tri, tri.point(i), &mut cache, true)
                        .unwrap();
                assert!(nc.is_exact());
                assert_eq!(nc.indices(), &[i]);
                assert_eq!(nc.coordinates(), &[1.0]);
            }
        }
    }

    #[test]
    fn test_natural_neighbours_of_symmetric_configuration() {
        // The centre of a regular square sees its four corners equally
        let tri = Triangulation::new(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 2.0],
            [0.0, 2.0],
            [1.0, 4.0],
            [4.0, 1.0],
            [1.0, -2.0],
            [-2.0, 1.0],
        ])
        .unwrap();
        let mut cache = NeighbourCache::default();
        for method in [InterpolationMethod::Sibson(0), InterpolationMethod::Laplace] {
            let nc = compute_natural_coordinates(method, &tri, [1.0, 1.0], &mut cache, true)
                .unwrap();
            let mut indices = nc.indices().to_vec();
            indices.sort_unstable();
            assert_eq!(indices, vec![0, 1, 2, 3]);
            assert!(nc.coordinates().iter().all(|&w| (w - 0.25).abs() < 1e-12));
        }
    }

    #[test]
    fn test_extrapolation_policy() {
        let tri = Triangulation::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
            .unwrap();
        let mut cache = NeighbourCache::default();
        let p = [1.5, 0.25];

        for method in [
            InterpolationMethod::Sibson(0),
            InterpolationMethod::Triangle,
            InterpolationMethod::Laplace,
        ] {
            let nc = compute_natural_coordinates(method, &tri, p, &mut cache, true).unwrap();
            assert_eq!(nc.len(), 2);
            let mut pairs: Vec<(usize, f64)> = nc.iter().map(|(w, k)| (k, w)).collect();
            pairs.sort_by_key(|&(k, _)| k);
            assert_eq!(pairs[0].0, 1);
            assert_eq!(pairs[1].0, 2);
            assert!((pairs[0].1 - 0.75).abs() < 1e-14);
            assert!((pairs[1].1 - 0.25).abs() < 1e-14);

            let nc = compute_natural_coordinates(method, &tri, p, &mut cache, false).unwrap();
            assert!(nc.is_empty());
            assert_eq!(nc.weighted_sum(&[1.0, 2.0, 3.0, 4.0]), f64::INFINITY);
        }

        // Nearest snaps to a site when projecting, and is undefined otherwise
        let nc = compute_natural_coordinates(InterpolationMethod::Nearest, &tri, p, &mut cache, true)
            .unwrap();
        assert_eq!(nc.indices(), &[1]);
        let nc = compute_natural_coordinates(InterpolationMethod::Nearest, &tri, p, &mut cache, false)
            .unwrap();
        assert!(nc.is_empty());

        // Inside the hull and on its boundary, the policy does not apply
        for q in [[0.9, 0.2], [1.0, 0.5]] {
            let nc =
                compute_natural_coordinates(InterpolationMethod::Nearest, &tri, q, &mut cache, false)
                    .unwrap();
            assert_eq!(nc.len(), 1);
        }
    }

    #[test]
    fn test_on_hull_edge() {
        let tri = random_triangulation(30);
        let mut cache = NeighbourCache::default();
        for &[a, b] in tri.hull_edges() {
            let (pa, pb) = (tri.point(a), tri.point(b));
            let mid = [(pa[0] + pb[0]) / 2.0, (pa[1] + pb[1]) / 2.0];
            assert!(segment_dist_sqr(mid, pa, pb) < 1e-24);
            let nc = compute_natural_coordinates(
                InterpolationMethod::Sibson(0),
                &tri,
                mid,
                &mut cache,
                false,
            )
            .unwrap();
            assert_eq!(nc.len(), 2);
            let mut indices = nc.indices().to_vec();
            indices.sort_unstable();
            let mut expected = vec![a, b];
            expected.sort_unstable();
            assert_eq!(indices, expected);
            assert!(nc.coordinates().iter().all(|&w| (w - 0.5).abs() < 1e-9));
        }
    }

    #[test]
    fn test_invalid_sibson_order() {
        let tri = random_triangulation(10);
        let mut cache = NeighbourCache::default();
        assert!(matches!(
            compute_natural_coordinates(
                InterpolationMethod::Sibson(2),
                &tri,
                [0.5, 0.5],
                &mut cache,
                true
            ),
            Err(InterpolationError::InvalidParameter(_))
        ));
    }
}
