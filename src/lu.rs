use crate::complex::Scalar;
use crate::error::{HelmError, Result};
use crate::sparse::SparseMatrix;
use crate::traits::{LinearSolver, PivotFinder};
use crate::vector::Vector;

/// Sparse LU factorisation `P·(D·A)[Q,Q] = L·U`.
///
/// `D` scales every row by the inverse of its diagonal entry, `Q` is the
/// reverse Cuthill-McKee ordering of the pattern and `P` the row exchanges
/// chosen by the pivot finder. `L` has an implicit unit diagonal.
pub struct LUDecomposition<T: Scalar> {
    scaling: Vector<T>,
    ordering: Vec<usize>,
    row_order: Vec<usize>,
    l: SparseMatrix<T>,
    u: SparseMatrix<T>,
}

impl<T: Scalar> LUDecomposition<T> {
    pub fn new(a: &SparseMatrix<T>, pivot_finder: &dyn PivotFinder<T>) -> Result<Self> {
        assert_eq!(a.rows(), a.cols(), "LU requires a square matrix");
        let n = a.rows();
        let ctx = a.ctx();

        let diagonal = a.diagonal();
        let mut scaling: Vector<T> = Vector::zeros(ctx, n);
        for i in 0..n {
            if diagonal[i].zero_valued() {
                return Err(HelmError::Singular(format!("diagonal entry {} is zero", i)));
            }
            scaling[i] = T::one_in(ctx) / diagonal[i].clone();
        }
        let mut scaled = a.clone();
        scaled.scale_rows(&scaling);

        let ordering = scaled.reduce_bandwidth();
        let mut u = scaled.permute(&ordering);
        let mut l = SparseMatrix::new(ctx, n, n);
        let mut row_order: Vec<usize> = (0..n).collect();
        log::trace!("lu bandwidth: {} -> {}", a.bandwidth(), u.bandwidth());

        for i in 0..n {
            let p = pivot_finder.find_pivot(&u, i);
            if p != i {
                u.swap_rows(i, p);
                l.swap_rows(i, p);
                row_order.swap(i, p);
            }

            let pivot = u.get(i, i);
            if pivot.zero_valued() {
                return Err(HelmError::Singular(format!("pivot {} is zero", i)));
            }

            for r in i + 1..n {
                let entry = u.get(r, i);
                if entry.zero_valued() {
                    continue;
                }
                let factor = entry / pivot.clone();
                u.add_weighted_row(r, i, &-factor.clone(), i + 1);
                u.set(r, i, T::zero_in(ctx));
                l.set(r, i, factor);
            }
        }
        u.compress();
        l.compress();
        log::trace!("lu fill: nnz(L) = {}, nnz(U) = {}", l.nnz(), u.nnz());

        Ok(Self {
            scaling,
            ordering,
            row_order,
            l,
            u,
        })
    }
}

impl<T: Scalar> LinearSolver<T> for LUDecomposition<T> {
    fn solve(&self, b: &Vector<T>) -> Result<Vector<T>> {
        let n = self.u.rows();
        assert_eq!(b.len(), n, "right-hand side length must equal matrix order");
        let ctx = self.u.ctx();

        let scaled = self.scaling.pointwise(b);

        // L y = P Q' D b
        let mut y: Vector<T> = Vector::zeros(ctx, n);
        for k in 0..n {
            let mut sum = scaled[self.ordering[self.row_order[k]]].clone();
            for (j, v) in self.l.row(k, 0).take_while(|(j, _)| *j < k) {
                sum = sum - v.clone() * y[j].clone();
            }
            y[k] = sum;
        }

        // U x = y
        let mut x: Vector<T> = Vector::zeros(ctx, n);
        for k in (0..n).rev() {
            let mut sum = y[k].clone();
            for (j, v) in self.u.row(k, k + 1) {
                sum = sum - v.clone() * x[j].clone();
            }
            x[k] = sum / self.u.get(k, k);
        }

        let mut result: Vector<T> = Vector::zeros(ctx, n);
        for (k, &original) in self.ordering.iter().enumerate() {
            result[original] = x[k].clone();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use crate::pivot::{BiggestElementPivot, NaturalPivot};
    use crate::scalar::{BigReal, Precision, Real};
    use anyhow::Result;

    fn system() -> SparseMatrix<f64> {
        SparseMatrix::from_triplets(
            (),
            4,
            4,
            vec![
                (0, 0, 4.0),
                (0, 3, 1.0),
                (1, 1, 5.0),
                (1, 2, -2.0),
                (2, 1, 3.0),
                (2, 2, 6.0),
                (3, 0, 2.0),
                (3, 2, 1.0),
                (3, 3, 3.0),
            ],
        )
    }

    #[test]
    fn test_solve_real() -> Result<()> {
        let a = system();
        let x = Vector::from(vec![1.0, -2.0, 0.5, 3.0]);
        let b = a.mul_vec(&x);

        for finder in [&BiggestElementPivot as &dyn PivotFinder<f64>, &NaturalPivot] {
            let lu = LUDecomposition::new(&a, finder)?;
            let solved = lu.solve(&b)?;
            for i in 0..4 {
                assert!((solved[i] - x[i]).abs() < 1e-6, "{} != {}", solved[i], x[i]);
            }
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
                (2, 2, c(4.0, -12.0)),
            ],
        );
        let x = Vector::from(vec![c(1.0, 0.0), c(0.98, -0.05), c(0.95, -0.1)]);
        let b = a.mul_vec(&x);

        let lu = LUDecomposition::new(&a, &BiggestElementPivot)?;
        let solved = lu.solve(&b)?;
        for i in 0..3 {
            assert!((solved[i].clone() - x[i].clone()).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_solve_arbitrary_precision() -> Result<()> {
        let p = Precision::new(160);
        let r = |v| BigReal::from_f64(p, v);
        let a = SparseMatrix::from_triplets(
            p,
            2,
            2,
            vec![(0, 0, r(3.0)), (0, 1, r(1.0)), (1, 0, r(1.0)), (1, 1, r(3.0))],
        );
        let b = Vector::from(vec![r(1.0), r(0.0)]);

        let x = LUDecomposition::new(&a, &BiggestElementPivot)?.solve(&b)?;
        let expected = r(3.0) / r(8.0);
        assert!(Real::abs(&(x[0].clone() - expected)) < r(1e-45));
        Ok(())
    }

    #[test]
    fn test_pivoting_avoids_zero_pivot() -> Result<()> {
        let a = SparseMatrix::from_triplets(
            (),
            3,
            3,
            vec![
                (0, 0, 1.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 1.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 1.0),
            ],
        );
        let x = Vector::from(vec![2.0, -1.0, 4.0]);
        let b = a.mul_vec(&x);

        let solved = LUDecomposition::new(&a, &BiggestElementPivot)?.solve(&b)?;
        for i in 0..3 {
            assert!((solved[i] - x[i]).abs() < 1e-9);
        }

        match LUDecomposition::new(&a, &NaturalPivot) {
            Err(HelmError::Singular(_)) => Ok(()),
            _ => Err(anyhow::format_err!("expected a zero pivot")),
        }
    }

    #[test]
    fn test_zero_diagonal_is_singular() {
        let a = SparseMatrix::from_triplets((), 2, 2, vec![(0, 1, 1.0), (1, 0, 1.0)]);
        assert!(matches!(
            LUDecomposition::new(&a, &BiggestElementPivot),
            Err(HelmError::Singular(_))
        ));
    }
}
