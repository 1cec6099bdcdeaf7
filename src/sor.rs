use crate::bicgstab::inverse_diagonal;
use crate::complex::Scalar;
use crate::error::{HelmError, Result};
use crate::scalar::Real;
use crate::sparse::SparseMatrix;
use crate::traits::LinearSolver;
use crate::vector::Vector;

// Sweeps between residual and finiteness checks.
const CHECK_INTERVAL: usize = 128;

/// Successive over-relaxation on the diagonally scaled system.
///
/// Reaching the sweep cap without convergence is [`HelmError::Degenerate`].
pub struct SOR<T: Scalar> {
    a: SparseMatrix<T>,
    scaling: Vector<T>,
    omega: T,
    max_iterations: usize,
    tolerance: T::Real,
}

impl<T: Scalar> SOR<T> {
    pub fn new(
        a: &SparseMatrix<T>,
        omega: f64,
        max_iterations: usize,
        tolerance: T::Real,
    ) -> Result<Self> {
        assert_eq!(a.rows(), a.cols(), "SOR requires a square matrix");
        if !(omega > 0.0 && omega < 2.0) {
            return Err(HelmError::Config(format!(
                "relaxation factor must be in (0, 2) (got {})",
                omega
            )));
        }
        let scaling = inverse_diagonal(a)?;
        let mut scaled = a.clone();
        scaled.scale_rows(&scaling);
        let ctx = a.ctx();
        Ok(Self {
            a: scaled,
            scaling,
            omega: T::from_real(<T::Real as Real>::from_f64(ctx, omega)),
            max_iterations,
            tolerance,
        })
    }

    fn sweep(&self, x: &mut Vector<T>, b: &Vector<T>) {
        let ctx = self.a.ctx();
        let keep = T::one_in(ctx) - self.omega.clone();
        for i in 0..self.a.rows() {
            let mut sum = b[i].clone();
            for (j, v) in self.a.row(i, 0) {
                if j != i {
                    sum = sum - v.clone() * x[j].clone();
                }
            }
            x[i] = keep.clone() * x[i].clone() + self.omega.clone() * sum;
        }
    }
}

impl<T: Scalar> LinearSolver<T> for SOR<T> {
    fn solve(&self, b: &Vector<T>) -> Result<Vector<T>> {
        let n = self.a.rows();
        assert_eq!(b.len(), n, "right-hand side length must equal matrix order");

        let b = self.scaling.pointwise(b);
        let b_norm = b.squared_norm();
        if b_norm.is_zero() {
            return Ok(b);
        }
        let limit = self.tolerance.clone() * self.tolerance.clone() * b_norm;

        let mut x = b.clone();
        for iteration in 1..=self.max_iterations {
            self.sweep(&mut x, &b);

            if iteration % CHECK_INTERVAL == 0 || iteration == self.max_iterations {
                if !x.is_finite() {
                    return Err(HelmError::Overflow(format!(
                        "sor iterate is not finite after {} sweeps",
                        iteration
                    )));
                }
                let residual = b.subtract(&self.a.mul_vec(&x)).squared_norm();
                if residual < limit {
                    log::trace!("sor: converged after {} sweeps", iteration);
                    return Ok(x);
                }
            }
        }

        Err(HelmError::Degenerate(format!(
            "sor did not converge in {} sweeps",
            self.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use anyhow::Result;

    #[test]
    fn test_solve() -> Result<()> {
        let c = |re, im| Complex::new(re, im);
        let a = SparseMatrix::from_triplets(
            (),
            3,
            3,
            vec![
                (0, 0, c(10.0, -30.0)),
                (0, 1, c(-5.0, 15.0)),
                (1, 0, c(-5.0, 15.0)),
                (1, 1, c(9.0, -27.0)),
                (1, 2, c(-4.0, 12.0)),
                (2, 1, c(-4.0, 12.0)),
                (2, 2, c(4.5, -12.0)),
            ],
        );
        let x = Vector::from(vec![c(1.0, 0.0), c(0.98, -0.05), c(0.95, -0.1)]);
        let b = a.mul_vec(&x);

        let solved = SOR::new(&a, 1.2, 10_000, 1e-12)?.solve(&b)?;
        for i in 0..3 {
            assert!((solved[i].clone() - x[i].clone()).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_relaxation_factor_is_validated() {
        let a = SparseMatrix::<f64>::identity((), 2);
        assert!(matches!(SOR::new(&a, 2.0, 10, 1e-9), Err(HelmError::Config(_))));
        assert!(matches!(SOR::new(&a, 0.0, 10, 1e-9), Err(HelmError::Config(_))));
        assert!(SOR::new(&a, 1.0, 10, 1e-9).is_ok());
    }

    #[test]
    fn test_sweep_cap_is_degenerate() {
        let a = SparseMatrix::from_triplets(
            (),
            2,
            2,
            vec![(0, 0, 2.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 2.0)],
        );
        let b = Vector::from(vec![1.0, 0.0]);
        assert!(matches!(
            SOR::new(&a, 1.0, 3, 1e-12).and_then(|s| s.solve(&b)),
            Err(HelmError::Degenerate(_))
        ));
        assert!(SOR::new(&a, 1.0, 1_000, 1e-12).and_then(|s| s.solve(&b)).is_ok());
    }

    #[test]
    fn test_divergence_is_overflow() {
        // Off-diagonal entries dominate, so the iteration blows up.
        let a = SparseMatrix::from_triplets(
            (),
            2,
            2,
            vec![(0, 0, 1.0), (0, 1, 1e200), (1, 0, 1e200), (1, 1, 1.0)],
        );
        let b = Vector::from(vec![1.0, 1.0]);
        assert!(matches!(
            SOR::new(&a, 1.0, 1_000, 1e-9).and_then(|s| s.solve(&b)),
            Err(HelmError::Overflow(_))
        ));
    }
}
