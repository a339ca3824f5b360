use nalgebra::{DMatrix, DVector};

/// Least-squares system shapes, by unknown count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum System {
    /// Gradient only
    Linear,
    /// Gradient and Hessian
    Quadratic,
    /// Gradient, Hessian and the four cubic terms
    Cubic,
    /// Gradient and Hessian, fitted against values and neighbour gradients
    Iterative,
}

impl System {
    #[inline]
    pub(crate) const fn columns(&self) -> usize {
        match self {
            System::Linear => 2,
            System::Quadratic | System::Iterative => 5,
            System::Cubic => 9,
        }
    }
}

/// Per-worker scratch space for local derivative fits.
///
/// The neighbourhood lists and design matrices grow to the largest
/// neighbourhood seen so far and are only ever overwritten afterwards.
#[derive(Clone, Debug, Default)]
pub struct DerivativeCache {
    /// Sites in the first neighbourhood of the anchor
    pub(crate) first: Vec<usize>,
    /// Weight of each entry of `first`
    pub(crate) lambda: Vec<f64>,
    /// Sites added by the second neighbourhood, all with unit weight
    pub(crate) second: Vec<usize>,
    pub(crate) systems: Systems,
}

impl DerivativeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sites in the current neighbourhood.
    #[inline]
    pub(crate) fn num_neighbours(&self) -> usize {
        self.first.len() + self.second.len()
    }
}

/// One design matrix per system shape, and a shared right-hand side.
#[derive(Clone, Debug)]
pub(crate) struct Systems {
    linear: DMatrix<f64>,
    quadratic: DMatrix<f64>,
    cubic: DMatrix<f64>,
    iterative: DMatrix<f64>,
    rhs: DVector<f64>,
}

impl Default for Systems {
    fn default() -> Self {
        Self {
            linear: DMatrix::zeros(0, System::Linear.columns()),
            quadratic: DMatrix::zeros(0, System::Quadratic.columns()),
            cubic: DMatrix::zeros(0, System::Cubic.columns()),
            iterative: DMatrix::zeros(0, System::Iterative.columns()),
            rhs: DVector::zeros(0),
        }
    }
}

impl Systems {
    /// Design matrix and right-hand side of `system`, with at least `rows`
    /// rows, the first `rows` of which are zeroed.
    pub(crate) fn get(
        &mut self,
        system: System,
        rows: usize,
    ) -> (&mut DMatrix<f64>, &mut DVector<f64>) {
        let a = match system {
            System::Linear => &mut self.linear,
            System::Quadratic => &mut self.quadratic,
            System::Cubic => &mut self.cubic,
            System::Iterative => &mut self.iterative,
        };

        if a.nrows() < rows {
            *a = DMatrix::zeros(rows.next_power_of_two(), system.columns());
        }
        if self.rhs.len() < rows {
            self.rhs = DVector::zeros(rows.next_power_of_two());
        }
        a.rows_mut(0, rows).fill(0.0);
        self.rhs.rows_mut(0, rows).fill(0.0);

        (a, &mut self.rhs)
    }
}
