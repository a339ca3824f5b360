//! Helpers for building regular evaluation grids over the plane.
use itertools::Itertools;
use num_traits::Float;

/// Evenly spaced values from `start` to `stop`, including the endpoint.
/// A single value is just `start`.
pub fn linspace<T>(start: T, stop: T, n: usize) -> Vec<T>
where
    T: Float,
{
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let dx = (stop - start) / cast(n - 1);
            (0..n).map(|i| start + cast::<T>(i) * dx).collect()
        }
    }
}

/// Cartesian product of axes in C ordering (x0, y0), (x0, y1), ..., (x0, yn), (x1, y0), ...
pub fn meshgrid<T>(x: Vec<&Vec<T>>) -> Vec<Vec<T>>
where
    T: Float,
{
    x.into_iter()
        .multi_cartesian_product()
        .map(|xx| xx.iter().map(|y| **y).collect())
        .collect()
}

/// Flattened coordinate arrays of the planar grid `xs` x `ys`, in the same
/// ordering as [`meshgrid`], ready for bulk evaluation.
pub fn grid_xy<T>(xs: &[T], ys: &[T]) -> (Vec<T>, Vec<T>)
where
    T: Float,
{
    xs.iter()
        .cartesian_product(ys.iter())
        .map(|(&x, &y)| (x, y))
        .unzip()
}

#[inline]
fn cast<T: Float>(i: usize) -> T {
    // Every primitive float can represent a usize, if lossily
    T::from(i).unwrap_or_else(T::nan)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 7.0, 1), vec![3.0]);
        assert!(linspace::<f64>(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_grid_ordering() {
        let xs = vec![0.0, 1.0];
        let ys = vec![10.0, 20.0, 30.0];
        let (gx, gy) = grid_xy(&xs, &ys);
        let mesh = meshgrid(vec![&xs, &ys]);

        assert_eq!(gx.len(), 6);
        for (i, m) in mesh.iter().enumerate() {
            assert_eq!([gx[i], gy[i]], [m[0], m[1]]);
        }
        assert_eq!(gy[..3], [10.0, 20.0, 30.0]);
    }
}
