use crate::complex::Scalar;
use crate::error::{HelmError, Result};
use crate::scalar::Real;
use crate::sparse::SparseMatrix;
use crate::traits::LinearSolver;
use crate::vector::Vector;

const MAX_RESTARTS: usize = 5;

/// Stabilised bi-conjugate gradient solver with left Jacobi preconditioning.
pub struct BiCGSTAB<T: Scalar> {
    a: SparseMatrix<T>,
    scaling: Vector<T>,
    tolerance: T::Real,
}

impl<T: Scalar> BiCGSTAB<T> {
    /// Iterates until `|r| / |b| < tolerance`. A solve that breaks down more
    /// than five times, or runs out of iterations, fails with
    /// [`HelmError::Degenerate`].
    pub fn new(a: &SparseMatrix<T>, tolerance: T::Real) -> Result<Self> {
        assert_eq!(a.rows(), a.cols(), "BiCGSTAB requires a square matrix");
        let scaling = inverse_diagonal(a)?;
        let mut a = a.clone();
        a.scale_rows(&scaling);
        Ok(Self {
            a,
            scaling,
            tolerance,
        })
    }

    fn max_iterations(&self) -> usize {
        (2 * self.a.rows()).max(100)
    }
}

pub(crate) fn inverse_diagonal<T: Scalar>(a: &SparseMatrix<T>) -> Result<Vector<T>> {
    let ctx = a.ctx();
    let diagonal = a.diagonal();
    let mut inverse = Vector::zeros(ctx, diagonal.len());
    for i in 0..diagonal.len() {
        if diagonal[i].zero_valued() {
            return Err(HelmError::Singular(format!("diagonal entry {} is zero", i)));
        }
        inverse[i] = T::one_in(ctx) / diagonal[i].clone();
    }
    Ok(inverse)
}

impl<T: Scalar> LinearSolver<T> for BiCGSTAB<T> {
    fn solve(&self, b: &Vector<T>) -> Result<Vector<T>> {
        let n = self.a.rows();
        assert_eq!(b.len(), n, "right-hand side length must equal matrix order");
        let ctx = self.a.ctx();

        let b = self.scaling.pointwise(b);
        let b_norm = b.squared_norm();
        if b_norm.is_zero() {
            return Ok(b);
        }
        let limit = self.tolerance.clone() * self.tolerance.clone() * b_norm.clone();
        let converged = |r: &Vector<T>| r.squared_norm() < limit;

        let one = T::one_in(ctx);

        let mut x: Vector<T> = Vector::zeros(ctx, n);
        let mut r = b.clone();
        let mut best_residual = b_norm.clone();

        let mut restarts = 0;
        'restart: while restarts <= MAX_RESTARTS {
            let r_hat = r.clone();
            let r_hat_norm = r_hat.squared_norm();
            let (mut rho_prev, mut alpha, mut omega) = (one.clone(), one.clone(), one.clone());
            let mut p: Vector<T> = Vector::zeros(ctx, n);
            let mut v: Vector<T> = Vector::zeros(ctx, n);

            for iteration in 0..self.max_iterations() {
                let rho = r_hat.dot(&r);
                let vanished =
                    r_hat_norm.clone() + rho.magnitude() == r_hat_norm.clone() || rho.zero_valued();
                if vanished {
                    log::debug!("bicgstab: breakdown after {} iterations", iteration);
                    restarts += 1;
                    continue 'restart;
                }

                let beta = (rho.clone() / rho_prev.clone()) * (alpha.clone() / omega.clone());
                p = r.weighted_sum(&beta, &p.weighted_sum(&-omega.clone(), &v));
                v = self.a.mul_vec(&p);

                let r_hat_v = r_hat.dot(&v);
                if r_hat_v.zero_valued() {
                    log::debug!("bicgstab: breakdown after {} iterations", iteration);
                    restarts += 1;
                    continue 'restart;
                }
                alpha = rho.clone() / r_hat_v;

                let h = x.weighted_sum(&alpha, &p);
                let s = r.weighted_sum(&-alpha.clone(), &v);
                if converged(&s) {
                    log::trace!("bicgstab: converged after {} iterations", iteration + 1);
                    return Ok(h);
                }

                let t = self.a.mul_vec(&s);
                let t_norm = t.squared_norm();
                omega = if t_norm.is_zero() {
                    T::zero_in(ctx)
                } else {
                    t.dot(&s) / T::from_real(t_norm)
                };
                if omega.zero_valued() {
                    // Stagnation; keep the half step and restart from it.
                    x = h;
                    r = s;
                    let residual = r.squared_norm();
                    if residual < best_residual {
                        best_residual = residual;
                    }
                    restarts += 1;
                    continue 'restart;
                }
                x = h.weighted_sum(&omega, &s);
                r = s.weighted_sum(&-omega.clone(), &t);

                if !x.is_finite() {
                    return Err(HelmError::Overflow(format!(
                        "bicgstab iterate is not finite after {} iterations",
                        iteration + 1
                    )));
                }
                if converged(&r) {
                    log::trace!("bicgstab: converged after {} iterations", iteration + 1);
                    return Ok(x);
                }
                let residual = r.squared_norm();
                if residual < best_residual {
                    best_residual = residual;
                }
                rho_prev = rho;
            }

            log::debug!("bicgstab: no convergence in {} iterations", self.max_iterations());
            break;
        }

        let relative = (best_residual / b_norm).as_f64().sqrt();
        Err(HelmError::Degenerate(format!(
            "bicgstab stalled at relative residual {:e} after {} restarts",
            relative,
            restarts.min(MAX_RESTARTS)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use anyhow::Result;

    fn laplacian(n: usize) -> SparseMatrix<f64> {
        let mut triplets = vec![];
        for i in 0..n {
            triplets.push((i, i, 4.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.5));
            }
        }
        SparseMatrix::from_triplets((), n, n, triplets)
    }

    #[test]
    fn test_solve_real() -> Result<()> {
        let a = laplacian(12);
        let x = Vector::from((0..12).map(|i| (i as f64).sin() + 2.0).collect::<Vec<_>>());
        let b = a.mul_vec(&x);

        let solved = BiCGSTAB::new(&a, 1e-12)?.solve(&b)?;
        for i in 0..12 {
            assert!((solved[i] - x[i]).abs() < 1e-6, "{} != {}", solved[i], x[i]);
        }
        Ok(())
    }

    #[test]
    fn test_solve_complex() -> Result<()> {
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

        let solved = BiCGSTAB::new(&a, 1e-12)?.solve(&b)?;
        for i in 0..3 {
            assert!((solved[i].clone() - x[i].clone()).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_zero_rhs() -> Result<()> {
        let a = laplacian(3);
        let b = Vector::zeros((), 3);
        assert_eq!(BiCGSTAB::new(&a, 1e-12)?.solve(&b)?, b);
        Ok(())
    }

    #[test]
    fn test_inconsistent_system_is_degenerate() -> Result<()> {
        // b is not in the range of the singular matrix.
        let a = SparseMatrix::from_triplets(
            (),
            2,
            2,
            vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)],
        );
        let b = Vector::from(vec![1.0, 0.0]);
        assert!(matches!(
            BiCGSTAB::new(&a, 1e-12)?.solve(&b),
            Err(HelmError::Degenerate(_))
        ));
        Ok(())
    }

    #[test]
    fn test_zero_diagonal() {
        let a = SparseMatrix::from_triplets((), 2, 2, vec![(0, 1, 1.0), (1, 0, 1.0)]);
        assert!(matches!(BiCGSTAB::new(&a, 1e-12), Err(HelmError::Singular(_))));
    }
}
