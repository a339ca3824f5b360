//! Natural-neighbour interpolant over scattered planar data.
//!
//! ```rust
//! use natinterp::{interpolate, InterpolantData, InterpolationMethod, InterpolationOptions};
//!
//! // Sites and values
//! let x = [0.0, 1.0, 0.0, 1.0, 0.4];
//! let y = [0.0, 0.0, 1.0, 1.0, 0.6];
//! let z = [0.0, 1.0, 1.0, 2.0, 1.0];
//!
//! let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();
//!
//! // One point, using worker 0's scratch space
//! let opts = InterpolationOptions::default();
//! let v = itp.evaluate(0.5, 0.5, 0, &opts).unwrap();
//! assert!((v - 1.0).abs() < 1e-12);
//!
//! // Many points, split across the worker pool
//! let opts = opts.with_method(InterpolationMethod::Laplace).with_parallel(true);
//! let out = itp.evaluate_many(&[0.25, 0.75], &[0.5, 0.5], &opts).unwrap();
//! assert_eq!(out.len(), 2);
//! ```
use crate::differentiation::{
    check_lengths, generate_derivatives, generate_gradients, DerivativeCache, DerivativeMethod,
    DifferentiationOptions,
};
use crate::error::{InterpolationError, Result};
use crate::geometry::dist;
use crate::natural::{
    compute_natural_coordinates, InterpolationMethod, NaturalCoordinates, NeighbourCache,
    DEFAULT_SEED,
};
use crate::parallel::{available_workers, for_each_chunk};
use crate::triangulation::Triangulation;

/// Optional derivative data attached to an interpolant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterpolantData {
    /// Gradient `(dz/dx, dz/dy)` at every site
    pub gradient: Option<Vec<[f64; 2]>>,
    /// Hessian `(d2z/dx2, d2z/dy2, d2z/dxdy)` at every site
    pub hessian: Option<Vec<[f64; 3]>>,
    /// Estimate gradients and Hessians from the data when none are given
    pub derivatives: bool,
}

/// How a query is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpolationOptions {
    pub method: InterpolationMethod,
    /// Split bulk evaluation across the worker pool
    pub parallel: bool,
    /// Project points outside the hull onto it rather than returning `+Infinity`
    pub project: bool,
    /// Seed for point-location tie-breaking
    pub seed: Option<u64>,
}

impl Default for InterpolationOptions {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::default(),
            parallel: false,
            project: true,
            seed: None,
        }
    }
}

impl InterpolationOptions {
    pub fn with_method(mut self, method: InterpolationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_project(mut self, project: bool) -> Self {
        self.project = project;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Scratch space owned by one worker.
#[derive(Clone, Debug, Default)]
pub struct WorkerCache {
    pub(crate) neighbours: NeighbourCache,
    pub(crate) derivatives: DerivativeCache,
}

/// Read-only view of the data an evaluation needs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Surface<'a> {
    pub(crate) tri: &'a Triangulation,
    pub(crate) z: &'a [f64],
    pub(crate) gradient: Option<&'a [[f64; 2]]>,
}

impl<'a> Surface<'a> {
    /// Blend data values with `nc` under `method`; `+Infinity` when `nc`
    /// is undefined.
    ///
    /// # Errors
    /// * If `method` is `Sibson(1)` and there are no gradients
    pub(crate) fn value(&self, method: InterpolationMethod, nc: &NaturalCoordinates) -> Result<f64> {
        match method {
            InterpolationMethod::Sibson(1) => {
                let gradient = self
                    .gradient
                    .ok_or(InterpolationError::MissingGradients("Sibson(1) interpolation"))?;
                Ok(self.sibson1(gradient, nc))
            }
            _ => Ok(nc.weighted_sum(self.z)),
        }
    }

    /// Sibson's C(1) blend of the Sibson value with the neighbours'
    /// first-order Taylor estimates.
    fn sibson1(&self, gradient: &[[f64; 2]], nc: &NaturalCoordinates) -> f64 {
        let sib0 = nc.weighted_sum(self.z);
        if nc.len() <= 2 {
            return sib0;
        }

        let p = nc.point();
        let (mut inv, mut zeta, mut alpha, mut beta) = (0.0, 0.0, 0.0, 0.0);
        for (lambda, k) in nc.iter() {
            let pk = self.tri.point(k);
            let r = dist(p, pk);
            if r == 0.0 {
                return self.z[k];
            }
            let taylor = self.z[k] + gradient[k][0] * (p[0] - pk[0]) + gradient[k][1] * (p[1] - pk[1]);
            inv += lambda / r;
            zeta += lambda / r * taylor;
            alpha += lambda * r;
            beta += lambda * r * r;
        }
        let zeta = zeta / inv;
        let alpha = alpha / inv;

        (alpha * sib0 + beta * zeta) / (alpha + beta)
    }
}

/// Interpolant over a triangulation of the data sites.
///
/// Holds one scratch cache per worker; single-point evaluation names the
/// worker whose cache it uses, bulk evaluation uses all of them.
#[derive(Clone, Debug)]
pub struct Interpolant {
    tri: Triangulation,
    z: Vec<f64>,
    gradient: Option<Vec<[f64; 2]>>,
    hessian: Option<Vec<[f64; 3]>>,
    caches: Vec<WorkerCache>,
}

/// Build an interpolant from sites `(x[i], y[i])` with values `z[i]`.
///
/// # Errors
/// * If `x`, `y`, `z` or the supplied derivatives differ in length
/// * If the sites are fewer than three, collinear or repeated
pub fn interpolate(x: &[f64], y: &[f64], z: &[f64], data: InterpolantData) -> Result<Interpolant> {
    if z.len() != x.len() {
        return Err(InterpolationError::DimensionMismatch {
            expected: x.len(),
            actual: z.len(),
        });
    }
    let tri = Triangulation::from_xy(x, y)?;
    Interpolant::new(tri, z.to_vec(), data)
}

/// Build an interpolant from sites given as `[x, y]` pairs.
///
/// # Errors
/// * As [`interpolate`]
pub fn interpolate_points(
    points: &[[f64; 2]],
    z: &[f64],
    data: InterpolantData,
) -> Result<Interpolant> {
    if z.len() != points.len() {
        return Err(InterpolationError::DimensionMismatch {
            expected: points.len(),
            actual: z.len(),
        });
    }
    let tri = Triangulation::new(points.to_vec())?;
    Interpolant::new(tri, z.to_vec(), data)
}

impl Interpolant {
    /// Wrap an existing triangulation.
    ///
    /// # Errors
    /// * If `z` or the supplied derivatives do not have one entry per site
    pub fn new(tri: Triangulation, z: Vec<f64>, data: InterpolantData) -> Result<Self> {
        let n = tri.num_points();
        let lengths = [
            Some(z.len()),
            data.gradient.as_ref().map(Vec::len),
            data.hessian.as_ref().map(Vec::len),
        ];
        if let Some(actual) = lengths.into_iter().flatten().find(|&len| len != n) {
            return Err(InterpolationError::DimensionMismatch { expected: n, actual });
        }

        let InterpolantData {
            mut gradient,
            mut hessian,
            derivatives,
        } = data;
        if derivatives && gradient.is_none() {
            let options = DifferentiationOptions::default().with_parallel(true);
            let (mut g, h) =
                generate_derivatives(&tri, &z, None, 2, DerivativeMethod::Direct, &options)?;

            // Sites too poorly surrounded for a quadratic fit still get a plane
            let degenerate = g.iter().filter(|gi| gi.iter().any(|v| v.is_infinite())).count();
            if degenerate > 0 {
                log::debug!("Falling back to first-order gradients at {degenerate} sites");
                let linear = generate_gradients(&tri, &z, None, DerivativeMethod::Direct, &options)?;
                for (gi, li) in g.iter_mut().zip(linear) {
                    if gi.iter().any(|v| v.is_infinite()) {
                        *gi = li;
                    }
                }
            }

            gradient = Some(g);
            hessian = hessian.or(h);
        }

        let workers = available_workers();
        log::debug!(
            "Built interpolant over {n} sites (gradients: {}, hessians: {}) with {workers} workers",
            gradient.is_some(),
            hessian.is_some()
        );

        Ok(Self {
            tri,
            z,
            gradient,
            hessian,
            caches: vec![WorkerCache::default(); workers],
        })
    }

    #[inline]
    pub fn triangulation(&self) -> &Triangulation {
        &self.tri
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.z
    }

    pub fn gradient(&self) -> Option<&[[f64; 2]]> {
        self.gradient.as_deref()
    }

    pub fn hessian(&self) -> Option<&[[f64; 3]]> {
        self.hessian.as_deref()
    }

    #[inline]
    pub fn has_gradients(&self) -> bool {
        self.gradient.is_some()
    }

    /// Number of worker caches, and so the valid range of worker ids.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.caches.len()
    }

    /// Shared data and the worker caches, borrowed separately.
    pub(crate) fn parts(&mut self) -> (Surface<'_>, &mut [WorkerCache]) {
        let surface = Surface {
            tri: &self.tri,
            z: &self.z,
            gradient: self.gradient.as_deref(),
        };
        (surface, &mut self.caches)
    }

    fn check(&self, options: &InterpolationOptions) -> Result<()> {
        options.method.validate()?;
        if options.method == InterpolationMethod::Sibson(1) && !self.has_gradients() {
            return Err(InterpolationError::MissingGradients(
                "Sibson(1) interpolation",
            ));
        }
        Ok(())
    }

    /// Natural coordinates of `(x, y)` under `options`, using `worker`'s cache.
    ///
    /// # Errors
    /// * If `worker` is out of range or the method is unsupported
    pub fn natural_coordinates(
        &mut self,
        x: f64,
        y: f64,
        worker: usize,
        options: &InterpolationOptions,
    ) -> Result<NaturalCoordinates> {
        options.method.validate()?;
        let (surface, caches) = self.parts();
        let workers = caches.len();
        let cache = caches
            .get_mut(worker)
            .ok_or(InterpolationError::InvalidWorker { worker, workers })?;
        compute_natural_coordinates(
            options.method.coordinates(),
            surface.tri,
            [x, y],
            &mut cache.neighbours,
            options.project,
        )
    }

    /// Value at `(x, y)`, using `worker`'s cache.
    ///
    /// # Errors
    /// * If `worker` is out of range
    /// * If the method is unsupported or needs gradients the interpolant lacks
    pub fn evaluate(
        &mut self,
        x: f64,
        y: f64,
        worker: usize,
        options: &InterpolationOptions,
    ) -> Result<f64> {
        self.check(options)?;
        let (surface, caches) = self.parts();
        let workers = caches.len();
        let cache = caches
            .get_mut(worker)
            .ok_or(InterpolationError::InvalidWorker { worker, workers })?;
        if let Some(seed) = options.seed {
            cache.neighbours.reseed(seed);
        }
        value_at(&surface, [x, y], options, &mut cache.neighbours)
    }

    /// Values at every `(xs[i], ys[i])`, written to `out`.
    ///
    /// # Errors
    /// * If the input and output lengths differ
    /// * If the method is unsupported or needs gradients the interpolant lacks
    pub fn evaluate_into(
        &mut self,
        out: &mut [f64],
        xs: &[f64],
        ys: &[f64],
        options: &InterpolationOptions,
    ) -> Result<()> {
        check_lengths(out.len(), xs, ys)?;
        self.check(options)?;
        let (surface, caches) = self.parts();
        let seed = options.seed.unwrap_or(DEFAULT_SEED);
        caches.iter_mut().for_each(|c| c.neighbours.reseed(seed));

        for_each_chunk(out, caches, options.parallel, |cache, start, chunk| {
            for (j, v) in chunk.iter_mut().enumerate() {
                let point = [xs[start + j], ys[start + j]];
                *v = value_at(&surface, point, options, &mut cache.neighbours)?;
            }
            Ok(())
        })
    }

    /// Values at every `(xs[i], ys[i])`.
    ///
    /// # Errors
    /// * If `xs` and `ys` differ in length
    /// * If the method is unsupported or needs gradients the interpolant lacks
    pub fn evaluate_many(
        &mut self,
        xs: &[f64],
        ys: &[f64],
        options: &InterpolationOptions,
    ) -> Result<Vec<f64>> {
        let mut out = vec![0.0; xs.len()];
        self.evaluate_into(&mut out, xs, ys, options)?;
        Ok(out)
    }
}

fn value_at(
    surface: &Surface<'_>,
    point: [f64; 2],
    options: &InterpolationOptions,
    cache: &mut NeighbourCache,
) -> Result<f64> {
    let nc = compute_natural_coordinates(
        options.method.coordinates(),
        surface.tri,
        point,
        cache,
        options.project,
    )?;
    surface.value(options.method, &nc)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::*;
    use crate::utils::*;

    const METHODS: [InterpolationMethod; 4] = [
        InterpolationMethod::Sibson(0),
        InterpolationMethod::Triangle,
        InterpolationMethod::Nearest,
        InterpolationMethod::Laplace,
    ];

    fn sample(x: &[f64], y: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        x.iter().zip(y.iter()).map(|(&x, &y)| f(x, y)).collect()
    }

    #[test]
    fn test_exact_at_sites() {
        let mut rng = rng_fixed_seed();
        let (x, y) = random_sites(&mut rng, 50);
        let z = sample(&x, &y, franke_like);
        let data = InterpolantData {
            derivatives: true,
            ..Default::default()
        };
        let mut itp = interpolate(&x, &y, &z, data).unwrap();
        assert!(itp.gradient().is_some() && itp.hessian().is_some());

        for method in METHODS.into_iter().chain([InterpolationMethod::Sibson(1)]) {
            let opts = InterpolationOptions::default().with_method(method);
            let out = itp.evaluate_many(&x, &y, &opts).unwrap();
            for i in 0..x.len() {
                assert_eq!(out[i], z[i], "{method:?} at site {i}");
            }
        }
    }

    #[test]
    fn test_smooth_surface() {
        // 50 random sites, sampled on a 50x50 grid away from the hull
        let mut rng = rng_fixed_seed();
        let (x, y) = random_sites(&mut rng, 50);
        let z = sample(&x, &y, franke_like);
        let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();

        let axis = linspace(0.0, 1.0, 50);
        let (gx, gy) = grid_xy(&axis, &axis);
        let out = itp
            .evaluate_many(&gx, &gy, &InterpolationOptions::default())
            .unwrap();

        let errors: Vec<f64> = (0..gx.len())
            .filter(|&i| {
                let p = [gx[i], gy[i]];
                matches!(
                    itp.natural_coordinates(p[0], p[1], 0, &InterpolationOptions::default()),
                    Ok(nc) if nc.len() >= 3
                ) && itp.triangulation().distance_to_hull(p) > 0.05
            })
            .map(|i| (out[i] - franke_like(gx[i], gy[i])).abs())
            .collect();
        assert!(errors.len() > 100);
        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        let max = errors.iter().copied().fold(0.0, f64::max);
        assert!(mean < 0.05, "mean error {mean}");
        assert!(max < 0.2, "max error {max}");
    }

    #[test]
    fn test_sibson1_reproduces_bowl() {
        // mu |p - a|^2 plus a plane, with exact gradients
        let (mu, a) = (1.5, [0.4, 0.7]);
        let f = |x: f64, y: f64| 0.3 - x + 2.0 * y + mu * ((x - a[0]).powi(2) + (y - a[1]).powi(2));
        let mut rng = rng_fixed_seed();
        let (x, y) = random_sites(&mut rng, 60);
        let z = sample(&x, &y, f);
        let gradient = x
            .iter()
            .zip(y.iter())
            .map(|(&x, &y)| [-1.0 + 2.0 * mu * (x - a[0]), 2.0 + 2.0 * mu * (y - a[1])])
            .collect();
        let data = InterpolantData {
            gradient: Some(gradient),
            ..Default::default()
        };
        let mut itp = interpolate(&x, &y, &z, data).unwrap();

        let axis = linspace(0.25, 0.75, 11);
        let (gx, gy) = grid_xy(&axis, &axis);
        let c1 = InterpolationOptions::default().with_method(InterpolationMethod::Sibson(1));
        let c0 = InterpolationOptions::default();
        let smooth = itp.evaluate_many(&gx, &gy, &c1).unwrap();
        let plain = itp.evaluate_many(&gx, &gy, &c0).unwrap();
        let mut improved = 0;
        for i in 0..gx.len() {
            let exact = f(gx[i], gy[i]);
            assert!((smooth[i] - exact).abs() < 1e-10, "{} vs {exact}", smooth[i]);
            if (plain[i] - exact).abs() > 1e-6 {
                improved += 1;
            }
        }
        assert!(improved > 0);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut rng = rng_fixed_seed();
        let (x, y) = random_sites(&mut rng, 200);
        let z = sample(&x, &y, franke_like);
        let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();

        let axis = linspace(-0.1, 1.1, 37);
        let (gx, gy) = grid_xy(&axis, &axis);
        for method in METHODS {
            for project in [true, false] {
                let opts = InterpolationOptions::default()
                    .with_method(method)
                    .with_project(project);
                let serial = itp.evaluate_many(&gx, &gy, &opts).unwrap();
                let parallel = itp
                    .evaluate_many(&gx, &gy, &opts.with_parallel(true))
                    .unwrap();
                assert_eq!(serial, parallel, "{method:?}");

                let mut single = vec![0.0; gx.len()];
                for i in 0..gx.len() {
                    single[i] = itp.evaluate(gx[i], gy[i], 0, &opts).unwrap();
                }
                assert_eq!(serial, single, "{method:?}");
            }
        }
    }

    #[test]
    fn test_outside_hull() {
        let x = [0.0, 1.0, 1.0, 0.0];
        let y = [0.0, 0.0, 1.0, 1.0];
        let z = [0.0, 1.0, 2.0, 3.0];
        let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();

        let projected = InterpolationOptions::default();
        let v = itp.evaluate(1.5, 0.25, 0, &projected).unwrap();
        assert!((v - 1.25).abs() < 1e-14);

        let undefined = projected.with_project(false);
        assert_eq!(itp.evaluate(1.5, 0.25, 0, &undefined).unwrap(), f64::INFINITY);
        let nearest = undefined.with_method(InterpolationMethod::Nearest);
        assert_eq!(itp.evaluate(1.5, 0.25, 0, &nearest).unwrap(), f64::INFINITY);
        let nearest = nearest.with_project(true);
        assert_eq!(itp.evaluate(1.5, 0.25, 0, &nearest).unwrap(), 1.0);
        assert_eq!(itp.evaluate(0.9, 0.2, 0, &nearest.with_project(false)).unwrap(), 1.0);
    }

    #[test]
    fn test_argument_errors() {
        let x = [0.0, 1.0, 1.0, 0.0];
        let y = [0.0, 0.0, 1.0, 1.0];
        let z = [0.0, 1.0, 2.0, 3.0];

        assert!(matches!(
            interpolate(&x, &y, &z[..3], InterpolantData::default()),
            Err(InterpolationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            interpolate(&x, &y[..3], &z, InterpolantData::default()),
            Err(InterpolationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            interpolate(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], &[0.0; 3], InterpolantData::default()),
            Err(InterpolationError::DegenerateTriangulation(_))
        ));
        assert!(matches!(
            interpolate_points(
                &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]],
                &[0.0; 4],
                InterpolantData::default()
            ),
            Err(InterpolationError::DuplicatePoint(_))
        ));
        let short_gradient = InterpolantData {
            gradient: Some(vec![[0.0; 2]; 3]),
            ..Default::default()
        };
        assert!(matches!(
            interpolate(&x, &y, &z, short_gradient),
            Err(InterpolationError::DimensionMismatch { expected: 4, actual: 3 })
        ));

        let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();
        let c1 = InterpolationOptions::default().with_method(InterpolationMethod::Sibson(1));
        assert!(matches!(
            itp.evaluate(0.5, 0.5, 0, &c1),
            Err(InterpolationError::MissingGradients(_))
        ));
        assert!(matches!(
            itp.evaluate_many(&[0.5], &[0.5], &c1),
            Err(InterpolationError::MissingGradients(_))
        ));
        let workers = itp.num_workers();
        assert_eq!(
            itp.evaluate(0.5, 0.5, workers, &InterpolationOptions::default()),
            Err(InterpolationError::InvalidWorker { worker: workers, workers })
        );
        let c2 = InterpolationOptions::default().with_method(InterpolationMethod::Sibson(2));
        assert!(matches!(
            itp.evaluate(0.5, 0.5, 0, &c2),
            Err(InterpolationError::InvalidParameter(_))
        ));
    }
}
