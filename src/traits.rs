use crate::complex::Scalar;
use crate::error::Result;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Solver for `A x = b` with the matrix fixed at construction.
pub trait LinearSolver<T: Scalar>: Send + Sync {
    fn solve(&self, b: &Vector<T>) -> Result<Vector<T>>;
}

/// Chooses the pivot row for an elimination column.
pub trait PivotFinder<T: Scalar>: Send + Sync {
    /// Returns a row `>= column` of `a`.
    fn find_pivot(&self, a: &SparseMatrix<T>, column: usize) -> usize;
}

pub trait ProgressMonitor: Send + Sync {
    /// Called after coefficient step `step` with the smallest total relative
    /// error found so far.
    fn update(&self, step: usize, error: f64);
}
