use thiserror::Error;

/// Errors raised while building or evaluating an interpolant.
///
/// Numerical degeneracy at a single point is not an error; it is reported
/// through `f64::INFINITY` sentinels in the output instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Degenerate triangulation: {0}")]
    DegenerateTriangulation(String),
    #[error("Site {0} duplicates an earlier site")]
    DuplicatePoint(usize),
    #[error("Gradients are required for {0}; build the interpolant with derivatives or supply them")]
    MissingGradients(&'static str),
    #[error("Derivative order must be 1 or 2, got {0}")]
    InvalidOrder(usize),
    #[error("Worker {worker} out of range for {workers} workers")]
    InvalidWorker { worker: usize, workers: usize },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, InterpolationError>;
