//! Natural-neighbour interpolation and derivative estimation on scattered planar data,
//! built on a Delaunay triangulation of the data sites.
//!
//! # Coordinate Schemes
//! Every scheme evaluates a query point as a weighted blend of the values at a few sites.
//! Sibson and Laplace coordinates are found by simulating the insertion of the query point
//! into the triangulation and measuring the Voronoi cell it would take from its neighbours;
//! the triangulation itself is never modified, so evaluation is safe to run in parallel.
//!
//! | Method          | Sites blended              | Continuity at sites | Needs gradients |
//! |-----------------|----------------------------|---------------------|-----------------|
//! | `Sibson(0)`     | natural neighbours         | C(0)                | no              |
//! | `Sibson(1)`     | natural neighbours         | C(1)                | yes             |
//! | `Laplace`       | natural neighbours         | C(0)                | no              |
//! | `Triangle`      | containing triangle        | C(0)                | no              |
//! | `Nearest`       | nearest site               | none                | no              |
//!
//! Points outside the convex hull of the sites are either projected onto the nearest hull
//! edge and blended linearly between its endpoints, or evaluate to `f64::INFINITY`.
//!
//! # Derivatives
//! Gradients and Hessians are estimated from local weighted least-squares Taylor fits,
//! either at the sites ([`generate_derivatives`]) or at arbitrary points ([`differentiate`]).
//! Fits that the local geometry cannot support evaluate to `f64::INFINITY` rather than
//! failing the whole call.
//!
//! # Example: Interpolation and Differentiation
//! ```rust
//! use natinterp::*;
//!
//! // Scattered sites and values of z = x^2 + y^2
//! let x = [0.0, 1.0, 0.0, 1.0, 0.5, 0.2, 0.8, 0.3];
//! let y = [0.0, 0.0, 1.0, 1.0, 0.5, 0.7, 0.3, 0.2];
//! let z: Vec<f64> = x.iter().zip(y.iter()).map(|(x, y)| x * x + y * y).collect();
//!
//! // Estimate derivatives at the sites up front, for the C(1) scheme
//! let data = InterpolantData { derivatives: true, ..Default::default() };
//! let mut itp = interpolate(&x, &y, &z, data).unwrap();
//!
//! // Observation points to interpolate/extrapolate
//! let xobs = [0.25, 0.6, 2.0];
//! let yobs = [0.4, 0.6, 0.5];
//!
//! // Do interpolation
//! let opts = InterpolationOptions::default().with_method(InterpolationMethod::Sibson(1));
//! let out = itp.evaluate_many(&xobs, &yobs, &opts).unwrap();
//! assert!(out.iter().all(|v| v.is_finite()));
//!
//! // Leave points outside the hull undefined instead
//! let opts = opts.with_project(false);
//! assert_eq!(itp.evaluate(2.0, 0.5, 0, &opts).unwrap(), f64::INFINITY);
//!
//! // Gradients and Hessians at the observation points
//! let mut dif = differentiate(&mut itp, 2).unwrap();
//! let d = dif.evaluate_many(&xobs, &yobs, &DifferentiationOptions::default()).unwrap();
//! assert!(d[0].hessian.is_some());
//! ```

pub mod error;
pub use error::InterpolationError;

pub mod geometry;

pub mod triangulation;
pub use triangulation::Triangulation;

pub mod natural;
pub use natural::{
    compute_natural_coordinates, InterpolationMethod, NaturalCoordinates, NeighbourCache,
};

pub mod differentiation;
pub use differentiation::{
    differentiate, generate_derivatives, generate_gradients, DerivativeCache, DerivativeMethod,
    Derivatives, DifferentiationOptions, Differentiator,
};

pub mod interpolant;
pub use interpolant::{
    interpolate, interpolate_points, Interpolant, InterpolantData, InterpolationOptions,
    WorkerCache,
};

pub mod parallel;

pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
