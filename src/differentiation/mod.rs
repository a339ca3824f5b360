//! Gradient and Hessian estimation from scattered values.
//!
//! Derivatives are estimated by fitting a local Taylor model around the
//! anchor (a site, or an arbitrary query point) to the data at nearby sites,
//! in one of two ways:
//!
//! | Method      | Needs gradients | Neighbourhood (order 1 / order 2) | Unknowns |
//! |-------------|-----------------|-----------------------------------|----------|
//! | `Direct`    | no              | one-ring / one- and two-ring      | 2, 5, 9  |
//! | `Iterative` | yes             | one-ring / one-ring               | 5        |
//!
//! `Iterative` refines an existing gradient field by also fitting each
//! neighbour's gradient, which gives a smoother Hessian than `Direct`.
//!
//! ```rust
//! use natinterp::{differentiate, interpolate, DifferentiationOptions, InterpolantData};
//!
//! let x = [0.0, 1.0, 0.0, 1.0, 0.4];
//! let y = [0.0, 0.0, 1.0, 1.0, 0.6];
//! let z: Vec<f64> = x.iter().zip(y.iter()).map(|(x, y)| 2.0 * x - y).collect();
//!
//! let mut itp = interpolate(&x, &y, &z, InterpolantData::default()).unwrap();
//! let mut dif = differentiate(&mut itp, 1).unwrap();
//! let d = dif.evaluate(0.5, 0.5, 0, &DifferentiationOptions::default()).unwrap();
//! assert!((d.gradient[0] - 2.0).abs() < 1e-10);
//! assert!((d.gradient[1] + 1.0).abs() < 1e-10);
//! ```
mod cache;
mod generate;
mod neighbourhood;

pub use cache::DerivativeCache;

use crate::error::{InterpolationError, Result};
use crate::interpolant::{Interpolant, Surface, WorkerCache};
use crate::natural::{
    compute_natural_coordinates, InterpolationMethod, NaturalCoordinates, DEFAULT_SEED,
};
use crate::parallel::{available_workers, for_each_chunk};
use crate::triangulation::Triangulation;

/// How a local derivative fit uses the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerivativeMethod {
    /// Fit values only
    Direct,
    /// Fit values and the gradients already known at neighbouring sites
    Iterative,
}

/// Tuning of derivative estimation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifferentiationOptions {
    /// Fit method; `None` picks `Iterative` when gradients are available
    pub method: Option<DerivativeMethod>,
    /// Split bulk evaluation across the worker pool
    pub parallel: bool,
    /// Project query points outside the hull onto it rather than
    /// returning `+Infinity`
    pub project: bool,
    /// Include cubic terms in second-order direct fits
    pub use_cubic_terms: bool,
    /// Share of the value residuals against the gradient residuals in
    /// iterative fits, in `[0, 1]`
    pub alpha: f64,
    /// Weight neighbours of a query point by their Sibson coordinates
    pub use_sibson_weight: bool,
    /// Seed for point-location tie-breaking
    pub seed: Option<u64>,
}

impl Default for DifferentiationOptions {
    fn default() -> Self {
        Self {
            method: None,
            parallel: false,
            project: true,
            use_cubic_terms: true,
            alpha: 0.1,
            use_sibson_weight: true,
            seed: None,
        }
    }
}

impl DifferentiationOptions {
    pub fn with_method(mut self, method: DerivativeMethod) -> Self {
        self.method = Some(method);
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

    pub fn with_cubic_terms(mut self, use_cubic_terms: bool) -> Self {
        self.use_cubic_terms = use_cubic_terms;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_sibson_weight(mut self, use_sibson_weight: bool) -> Self {
        self.use_sibson_weight = use_sibson_weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that `alpha` is a valid weight.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(InterpolationError::InvalidParameter(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Estimated derivatives at one point.
///
/// Every component is `+Infinity` when the local geometry could not
/// support the fit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Derivatives {
    /// `(dz/dx, dz/dy)`
    pub gradient: [f64; 2],
    /// `(d2z/dx2, d2z/dy2, d2z/dxdy)`, for second-order estimates
    pub hessian: Option<[f64; 3]>,
}

impl Derivatives {
    pub(crate) fn infinite(order: usize) -> Self {
        Self {
            gradient: [f64::INFINITY; 2],
            hessian: (order == 2).then_some([f64::INFINITY; 3]),
        }
    }

    pub(crate) fn from_solution(s: &[f64], order: usize) -> Self {
        Self {
            gradient: [s[0], s[1]],
            hessian: (order == 2).then(|| [s[2], s[3], s[4]]),
        }
    }

    /// Any component is the degenerate-fit sentinel.
    pub fn is_infinite(&self) -> bool {
        self.gradient
            .iter()
            .chain(self.hessian.iter().flatten())
            .any(|v| v.is_infinite())
    }
}

fn check_order(order: usize) -> Result<()> {
    match order {
        1 | 2 => Ok(()),
        _ => Err(InterpolationError::InvalidOrder(order)),
    }
}

/// Derivative estimator over an interpolant, borrowing its worker caches.
pub struct Differentiator<'a> {
    interpolant: &'a mut Interpolant,
    order: usize,
}

/// Build a differentiator of the given `order` (1 for gradients,
/// 2 for gradients and Hessians).
///
/// # Errors
/// * If `order` is not 1 or 2
pub fn differentiate(interpolant: &mut Interpolant, order: usize) -> Result<Differentiator<'_>> {
    check_order(order)?;
    Ok(Differentiator { interpolant, order })
}

impl Differentiator<'_> {
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Method used under `options`: the explicit choice, or `Iterative`
    /// exactly when the interpolant carries gradients.
    pub fn method(&self, options: &DifferentiationOptions) -> DerivativeMethod {
        options.method.unwrap_or(if self.interpolant.has_gradients() {
            DerivativeMethod::Iterative
        } else {
            DerivativeMethod::Direct
        })
    }

    fn check(&self, method: DerivativeMethod, options: &DifferentiationOptions) -> Result<()> {
        options.validate()?;
        if method == DerivativeMethod::Iterative && !self.interpolant.has_gradients() {
            return Err(InterpolationError::MissingGradients(
                "iterative differentiation",
            ));
        }
        Ok(())
    }

    /// Derivatives at the point of `nc`, given the function estimate
    /// `value` there.
    ///
    /// # Errors
    /// * If `worker` is out of range
    /// * If the options are invalid or need gradients the interpolant lacks
    pub fn evaluate_with(
        &mut self,
        value: f64,
        nc: &NaturalCoordinates,
        worker: usize,
        options: &DifferentiationOptions,
    ) -> Result<Derivatives> {
        let method = self.method(options);
        self.check(method, options)?;
        let order = self.order;
        let (surface, caches) = self.interpolant.parts();
        let workers = caches.len();
        let cache = caches
            .get_mut(worker)
            .ok_or(InterpolationError::InvalidWorker { worker, workers })?;
        generate::estimate(
            &surface,
            value,
            nc,
            order,
            method,
            options,
            &mut cache.derivatives,
        )
    }

    /// Derivatives at `(x, y)`, estimating the function value internally.
    ///
    /// # Errors
    /// * If `worker` is out of range
    /// * If the options are invalid or need gradients the interpolant lacks
    pub fn evaluate(
        &mut self,
        x: f64,
        y: f64,
        worker: usize,
        options: &DifferentiationOptions,
    ) -> Result<Derivatives> {
        let method = self.method(options);
        self.check(method, options)?;
        let order = self.order;
        let (surface, caches) = self.interpolant.parts();
        let workers = caches.len();
        let cache = caches
            .get_mut(worker)
            .ok_or(InterpolationError::InvalidWorker { worker, workers })?;
        if let Some(seed) = options.seed {
            cache.neighbours.reseed(seed);
        }
        derivatives_at(&surface, [x, y], order, method, options, cache)
    }

    /// Derivatives at every `(xs[i], ys[i])`, written to `out`.
    ///
    /// # Errors
    /// * If the input and output lengths differ
    /// * If the options are invalid or need gradients the interpolant lacks
    pub fn evaluate_into(
        &mut self,
        out: &mut [Derivatives],
        xs: &[f64],
        ys: &[f64],
        options: &DifferentiationOptions,
    ) -> Result<()> {
        check_lengths(out.len(), xs, ys)?;
        let method = self.method(options);
        self.check(method, options)?;
        let order = self.order;
        let (surface, caches) = self.interpolant.parts();
        let seed = options.seed.unwrap_or(DEFAULT_SEED);
        caches.iter_mut().for_each(|c| c.neighbours.reseed(seed));

        for_each_chunk(out, caches, options.parallel, |cache, start, chunk| {
            for (j, d) in chunk.iter_mut().enumerate() {
                let point = [xs[start + j], ys[start + j]];
                *d = derivatives_at(&surface, point, order, method, options, cache)?;
            }
            Ok(())
        })
    }

    /// Derivatives at every `(xs[i], ys[i])`.
    ///
    /// # Errors
    /// * If `xs` and `ys` differ in length
    /// * If the options are invalid or need gradients the interpolant lacks
    pub fn evaluate_many(
        &mut self,
        xs: &[f64],
        ys: &[f64],
        options: &DifferentiationOptions,
    ) -> Result<Vec<Derivatives>> {
        let mut out = vec![Derivatives::default(); xs.len()];
        self.evaluate_into(&mut out, xs, ys, options)?;
        Ok(out)
    }
}

pub(crate) fn check_lengths(n: usize, xs: &[f64], ys: &[f64]) -> Result<()> {
    for len in [xs.len(), ys.len()] {
        if len != n {
            return Err(InterpolationError::DimensionMismatch {
                expected: n,
                actual: len,
            });
        }
    }
    Ok(())
}

/// Resolve coordinates and a value estimate at `point`, then fit.
///
/// Direct fits start from the Sibson value, iterative ones from the
/// gradient-aware Sibson value.
fn derivatives_at(
    surface: &Surface<'_>,
    point: [f64; 2],
    order: usize,
    method: DerivativeMethod,
    options: &DifferentiationOptions,
    cache: &mut WorkerCache,
) -> Result<Derivatives> {
    let nc = compute_natural_coordinates(
        InterpolationMethod::Sibson(0),
        surface.tri,
        point,
        &mut cache.neighbours,
        options.project,
    )?;
    if nc.is_empty() {
        return Ok(Derivatives::infinite(order));
    }

    let value = match method {
        DerivativeMethod::Direct => surface.value(InterpolationMethod::Sibson(0), &nc)?,
        DerivativeMethod::Iterative => surface.value(InterpolationMethod::Sibson(1), &nc)?,
    };
    generate::estimate(
        surface,
        value,
        &nc,
        order,
        method,
        options,
        &mut cache.derivatives,
    )
}

/// Estimate derivatives of order 1 or 2 at every site.
///
/// `gradient` is the field an `Iterative` fit refines; `Direct` ignores it.
/// The method is taken from `method`, not from `options`.
///
/// Returns the gradient at every site, and the Hessian for order 2.
///
/// # Errors
/// * If `z` (or `gradient`) does not have one entry per site
/// * If `order` is not 1 or 2, or `options` are invalid
/// * If `method` is iterative and no `gradient` is given
pub fn generate_derivatives(
    tri: &Triangulation,
    z: &[f64],
    gradient: Option<&[[f64; 2]]>,
    order: usize,
    method: DerivativeMethod,
    options: &DifferentiationOptions,
) -> Result<(Vec<[f64; 2]>, Option<Vec<[f64; 3]>>)> {
    check_order(order)?;
    options.validate()?;
    let n = tri.num_points();
    if z.len() != n {
        return Err(InterpolationError::DimensionMismatch {
            expected: n,
            actual: z.len(),
        });
    }
    if let Some(g) = gradient {
        if g.len() != n {
            return Err(InterpolationError::DimensionMismatch {
                expected: n,
                actual: g.len(),
            });
        }
    }
    if method == DerivativeMethod::Iterative && gradient.is_none() {
        return Err(InterpolationError::MissingGradients(
            "iterative differentiation",
        ));
    }

    let surface = Surface {
        tri,
        z,
        gradient,
    };
    let workers = if options.parallel {
        available_workers()
    } else {
        1
    };
    let mut caches = vec![DerivativeCache::new(); workers];
    let mut out = vec![Derivatives::default(); n];
    log::debug!("Generating order {order} {method:?} derivatives at {n} sites on {workers} workers");

    for_each_chunk(&mut out, &mut caches, options.parallel, |cache, start, chunk| {
        for (j, d) in chunk.iter_mut().enumerate() {
            let i = start + j;
            let nc = NaturalCoordinates::exact(i, tri.point(i));
            *d = generate::estimate(&surface, z[i], &nc, order, method, options, cache)?;
        }
        Ok(())
    })?;

    let gradients = out.iter().map(|d| d.gradient).collect();
    let hessians = (order == 2).then(|| {
        out.iter()
            .map(|d| d.hessian.unwrap_or([f64::INFINITY; 3]))
            .collect()
    });
    Ok((gradients, hessians))
}

/// Estimate the gradient at every site.
///
/// # Errors
/// * As [`generate_derivatives`]
pub fn generate_gradients(
    tri: &Triangulation,
    z: &[f64],
    gradient: Option<&[[f64; 2]]>,
    method: DerivativeMethod,
    options: &DifferentiationOptions,
) -> Result<Vec<[f64; 2]>> {
    generate_derivatives(tri, z, gradient, 1, method, options).map(|(g, _)| g)
}
