use crate::complex::Scalar;
use crate::sparse::SparseMatrix;
use crate::traits::PivotFinder;

/// Partial pivoting on the entry of largest magnitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiggestElementPivot;

impl<T: Scalar> PivotFinder<T> for BiggestElementPivot {
    fn find_pivot(&self, a: &SparseMatrix<T>, column: usize) -> usize {
        a.find_absolute_maximum_of_column(column, column)
    }
}

/// Keeps the natural row order, preserving the fill-in pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalPivot;

impl<T: Scalar> PivotFinder<T> for NaturalPivot {
    fn find_pivot(&self, _a: &SparseMatrix<T>, column: usize) -> usize {
        column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pivot_choice() {
        let a = SparseMatrix::from_triplets(
            (),
            3,
            3,
            vec![(0, 0, 1.0), (1, 0, -4.0), (1, 1, 2.0), (2, 0, 3.0), (2, 2, 1.0)],
        );
        assert_eq!(BiggestElementPivot.find_pivot(&a, 0), 1);
        assert_eq!(BiggestElementPivot.find_pivot(&a, 1), 1);
        assert_eq!(NaturalPivot.find_pivot(&a, 0), 0);
        assert_eq!(NaturalPivot.find_pivot(&a, 2), 2);
    }
}
