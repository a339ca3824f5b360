//! Local weighted least-squares fits for derivatives at a single anchor.
//!
//! Every fit is posed in offsets `(dx, dy)` from the anchor to each
//! neighbour `s`, measured in units of the farthest neighbour's distance,
//! with rows scaled by `sqrt(lambda_s) / |d_s|`, so that the residual of a
//! neighbour counts with weight `lambda_s / |d_s|^2`.
//! Unknowns are ordered `(gx, gy, hxx, hyy, hxy, ...)`.
use std::iter::repeat;

use nalgebra::{DMatrix, DVector};

use crate::error::{InterpolationError, Result};
use crate::geometry::dist;
use crate::interpolant::Surface;
use crate::natural::NaturalCoordinates;

use super::cache::System;
use super::neighbourhood::taylor_neighbourhood;
use super::{DerivativeCache, DerivativeMethod, Derivatives, DifferentiationOptions};

/// Singular values below this fraction of the largest one count as zero
const RANK_TOLERANCE: f64 = 1e-12;

/// Estimate derivatives of `surface` at the point of `nc`, where `value`
/// is the function estimate there.
///
/// Degenerate local geometry is not an error; it yields `+Infinity` in
/// every component.
///
/// # Errors
/// * If `method` is iterative and the surface has no gradients
pub(crate) fn estimate(
    surface: &Surface<'_>,
    value: f64,
    nc: &NaturalCoordinates,
    order: usize,
    method: DerivativeMethod,
    options: &DifferentiationOptions,
    cache: &mut DerivativeCache,
) -> Result<Derivatives> {
    let gradient = match method {
        DerivativeMethod::Direct => None,
        DerivativeMethod::Iterative => Some(surface.gradient.ok_or(
            InterpolationError::MissingGradients("iterative differentiation"),
        )?),
    };

    let wide = order == 2 && method == DerivativeMethod::Direct;
    if !taylor_neighbourhood(surface.tri, nc, wide, options.use_sibson_weight, cache) {
        return Ok(Derivatives::infinite(order));
    }

    // Sites are their own anchor, using the data value there. Points off
    // the hull are fitted where they were projected to.
    let (anchor, value) = match nc.indices() {
        &[i] => (surface.tri.point(i), surface.z[i]),
        &[a, b] => {
            let (pa, pb) = (surface.tri.point(a), surface.tri.point(b));
            let [wa, wb] = [nc.coordinates()[0], nc.coordinates()[1]];
            ([wa * pa[0] + wb * pb[0], wa * pa[1] + wb * pb[1]], value)
        }
        _ => (nc.point(), value),
    };

    let solution = match (gradient, order) {
        (Some(gradient), _) => iterative(surface, anchor, value, gradient, options.alpha, cache),
        (None, 1) => direct(surface, anchor, value, System::Linear, cache),
        (None, _) if options.use_cubic_terms => direct(surface, anchor, value, System::Cubic, cache),
        (None, _) => direct(surface, anchor, value, System::Quadratic, cache),
    };

    match solution {
        Some(s) if s.iter().all(|v| v.is_finite()) => {
            Ok(Derivatives::from_solution(s.as_slice(), order))
        }
        _ => {
            log::trace!("Degenerate derivative fit at {:?}", nc.point());
            Ok(Derivatives::infinite(order))
        }
    }
}

/// Largest distance from `anchor` to any of `sites`. Fits are posed in
/// this unit of length and rescaled afterwards.
fn length_unit<'s>(
    surface: &Surface<'_>,
    anchor: [f64; 2],
    sites: impl Iterator<Item = &'s usize>,
) -> Option<f64> {
    let unit = sites
        .map(|&s| dist(anchor, surface.tri.point(s)))
        .fold(0.0, f64::max);
    (unit > 0.0 && unit.is_finite()).then_some(unit)
}

/// Offsets in units of `unit` and row scale from `anchor` to site `s` with
/// weight `lambda`. A site at the anchor itself says nothing about slopes
/// and gets no weight.
#[inline]
fn offset(
    surface: &Surface<'_>,
    anchor: [f64; 2],
    unit: f64,
    s: usize,
    lambda: f64,
) -> (f64, f64, f64) {
    let p = surface.tri.point(s);
    let (dx, dy) = ((p[0] - anchor[0]) / unit, (p[1] - anchor[1]) / unit);
    let d = (dx * dx + dy * dy).sqrt();
    let w = if d > 0.0 { lambda.sqrt() / d } else { 0.0 };
    (dx, dy, w)
}

/// Convert a solution in units of `unit` back to data coordinates.
fn rescale(mut solution: DVector<f64>, unit: f64) -> DVector<f64> {
    for (i, v) in solution.iter_mut().enumerate() {
        *v /= match i {
            0 | 1 => unit,
            2..=4 => unit * unit,
            _ => unit * unit * unit,
        };
    }
    solution
}

/// Taylor fit of values alone, over both neighbourhoods.
fn direct(
    surface: &Surface<'_>,
    anchor: [f64; 2],
    value: f64,
    system: System,
    cache: &mut DerivativeCache,
) -> Option<DVector<f64>> {
    let rows = cache.num_neighbours();
    let DerivativeCache {
        first,
        lambda,
        second,
        systems,
    } = cache;
    let unit = length_unit(surface, anchor, first.iter().chain(second.iter()))?;
    let sites = first
        .iter()
        .zip(lambda.iter())
        .chain(second.iter().zip(repeat(&1.0)));

    let (a, b) = systems.get(system, rows);
    for (row, (&s, &lambda)) in sites.enumerate() {
        let (dx, dy, w) = offset(surface, anchor, unit, s, lambda);
        b[row] = w * (surface.z[s] - value);

        a[(row, 0)] = w * dx;
        a[(row, 1)] = w * dy;
        if system == System::Linear {
            continue;
        }
        a[(row, 2)] = w * dx * dx / 2.0;
        a[(row, 3)] = w * dy * dy / 2.0;
        a[(row, 4)] = w * dx * dy;
        if system == System::Cubic {
            a[(row, 5)] = w * dx * dx * dx / 6.0;
            a[(row, 6)] = w * dy * dy * dy / 6.0;
            a[(row, 7)] = w * dx * dx * dy / 2.0;
            a[(row, 8)] = w * dx * dy * dy / 2.0;
        }
    }

    solve(a, b, rows).map(|x| rescale(x, unit))
}

/// Quadratic fit of values and of the neighbours' known gradients.
///
/// Each neighbour contributes a value row weighted by `alpha` and two
/// gradient rows (`grad_s = grad + H d_s`) weighted by `1 - alpha`.
fn iterative(
    surface: &Surface<'_>,
    anchor: [f64; 2],
    value: f64,
    gradient: &[[f64; 2]],
    alpha: f64,
    cache: &mut DerivativeCache,
) -> Option<DVector<f64>> {
    let rows = 3 * cache.first.len();
    let DerivativeCache {
        first,
        lambda,
        systems,
        ..
    } = cache;
    let unit = length_unit(surface, anchor, first.iter())?;

    let (a, b) = systems.get(System::Iterative, rows);
    for (i, (&s, &lambda)) in first.iter().zip(lambda.iter()).enumerate() {
        let (dx, dy, w) = offset(surface, anchor, unit, s, alpha * lambda);
        let row = 3 * i;
        a[(row, 0)] = w * dx;
        a[(row, 1)] = w * dy;
        a[(row, 2)] = w * dx * dx / 2.0;
        a[(row, 3)] = w * dy * dy / 2.0;
        a[(row, 4)] = w * dx * dy;
        b[row] = w * (surface.z[s] - value);

        // Slopes per unit length
        let g = ((1.0 - alpha) * lambda).sqrt();
        let [gx, gy] = gradient[s];
        a[(row + 1, 0)] = g;
        a[(row + 1, 2)] = g * dx;
        a[(row + 1, 4)] = g * dy;
        b[row + 1] = g * gx * unit;

        a[(row + 2, 1)] = g;
        a[(row + 2, 3)] = g * dy;
        a[(row + 2, 4)] = g * dx;
        b[row + 2] = g * gy * unit;
    }

    solve(a, b, rows).map(|x| rescale(x, unit))
}

/// Least-squares solution of the first `rows` rows of `a x = b`, or `None`
/// if the system is under-determined, rank deficient or not finite.
fn solve(a: &DMatrix<f64>, b: &DVector<f64>, rows: usize) -> Option<DVector<f64>> {
    let cols = a.ncols();
    if rows < cols {
        return None;
    }

    let (a, b) = (a.rows(0, rows), b.rows(0, rows));
    if !a.iter().chain(b.iter()).all(|v| v.is_finite()) {
        return None;
    }

    let svd = a.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let eps = largest * RANK_TOLERANCE;
    let rank = svd.singular_values.iter().filter(|&&s| s > eps).count();
    if largest == 0.0 || rank < cols {
        return None;
    }

    svd.solve(&b, eps).ok()
}
