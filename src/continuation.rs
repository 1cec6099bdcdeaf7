use crate::coefficients::CoefficientStorage;
use crate::complex::Complex;
use crate::error::{HelmError, Result};
use crate::scalar::Real;
use crate::vector::Vector;

/// Wynn's epsilon table of one power series, kept as its newest ascending
/// diagonal.
#[derive(Debug, Clone)]
struct EpsilonTable<R: Real> {
    partial_sum: Complex<R>,
    diagonal: Vec<Complex<R>>,
}

impl<R: Real> EpsilonTable<R> {
    fn new(ctx: R::Context) -> Self {
        Self {
            partial_sum: Complex::zero(ctx),
            diagonal: Vec::new(),
        }
    }

    /// The table is left unchanged on error.
    fn add(&mut self, coefficient: &Complex<R>) -> Result<()> {
        let ctx = coefficient.ctx();
        let partial_sum = self.partial_sum.clone() + coefficient.clone();

        let mut next = Vec::with_capacity(self.diagonal.len() + 1);
        next.push(partial_sum.clone());
        for k in 1..=self.diagonal.len() {
            let difference = next[k - 1].clone() - self.diagonal[k - 1].clone();
            if difference.is_zero() {
                return Err(HelmError::Degenerate(format!(
                    "epsilon table difference in column {} is zero",
                    k
                )));
            }
            let back = if k >= 2 {
                self.diagonal[k - 2].clone()
            } else {
                Complex::zero(ctx)
            };
            next.push(back + Complex::one(ctx) / difference);
        }

        self.partial_sum = partial_sum;
        self.diagonal = next;
        Ok(())
    }

    /// Highest even column of the newest diagonal.
    fn estimate(&self) -> Option<&Complex<R>> {
        let m = self.diagonal.len().checked_sub(1)?;
        if m % 2 == 0 {
            self.diagonal.get(m)
        } else {
            self.diagonal.get(m - 1)
        }
    }
}

/// Sums the voltage power series of every node at `s = 1` with Wynn's
/// epsilon algorithm.
pub struct AnalyticContinuation<R: Real> {
    tables: Vec<EpsilonTable<R>>,
    steps: usize,
}

impl<R: Real> AnalyticContinuation<R> {
    pub fn new(ctx: R::Context, node_count: usize) -> Self {
        Self {
            tables: vec![EpsilonTable::new(ctx); node_count],
            steps: 0,
        }
    }

    /// Number of coefficients consumed per node.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Consumes the next coefficient of every node.
    ///
    /// On [`HelmError::Degenerate`] tables already advanced stay advanced, so
    /// the continuation must not be fed further.
    pub fn add_coefficients(&mut self, coefficients: &Vector<Complex<R>>) -> Result<()> {
        assert_eq!(
            coefficients.len(),
            self.tables.len(),
            "one coefficient per node is required"
        );
        for (table, c) in self.tables.iter_mut().zip(coefficients.iter()) {
            table.add(c)?;
        }
        self.steps += 1;
        Ok(())
    }

    /// Consumes every step of `storage` not seen yet.
    pub fn update_to(&mut self, storage: &CoefficientStorage<R>) -> Result<()> {
        while self.steps < storage.step_count() {
            self.add_coefficients(storage.coefficients(self.steps))?;
        }
        Ok(())
    }

    pub fn estimate(&self, node: usize) -> Option<&Complex<R>> {
        self.tables[node].estimate()
    }

    /// Current estimate of every node voltage.
    pub fn voltages(&self) -> Option<Vector<Complex<R>>> {
        let estimates = self
            .tables
            .iter()
            .map(|t| t.estimate().cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Vector::from(estimates))
    }
}
