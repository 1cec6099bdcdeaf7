use crate::bus_types::{BusKind, Buses};
use crate::complex::Complex;
use crate::error::{HelmError, Result};
use crate::scalar::Real;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Power-series coefficients of every node voltage together with the
/// auxiliary series the PQ and PV embeddings are built from.
///
/// Every family is indexed `[step][k]` where `k` is the position of the node
/// in the PQ or PV list. Steps are appended one at a time and never change.
pub struct CoefficientStorage<R: Real> {
    admittance: SparseMatrix<Complex<R>>,
    kinds: Vec<BusKind>,
    pq_nodes: Vec<usize>,
    pv_nodes: Vec<usize>,
    // |V_sp|^2 per PV bus.
    pv_magnitudes_squared: Vec<R>,

    coefficients: Vec<Vector<Complex<R>>>,
    inverse: Vec<Vec<Complex<R>>>,
    squared: Vec<Vec<Complex<R>>>,
    weighted: Vec<Vec<Complex<R>>>,
    combined: Vec<Vec<Complex<R>>>,
}

impl<R: Real> CoefficientStorage<R> {
    pub fn new(admittance: SparseMatrix<Complex<R>>, buses: &Buses) -> Result<Self> {
        let kinds = buses.bus_kinds(admittance.rows())?;
        let ctx = admittance.ctx();
        let pv_magnitudes_squared = buses
            .pv
            .iter()
            .map(|b| {
                let v = R::from_f64(ctx, b.voltage_magnitude);
                v.clone() * v
            })
            .collect();
        Ok(Self {
            admittance,
            kinds,
            pq_nodes: buses.pq_ids(),
            pv_nodes: buses.pv_ids(),
            pv_magnitudes_squared,
            coefficients: Vec::new(),
            inverse: Vec::new(),
            squared: Vec::new(),
            weighted: Vec::new(),
            combined: Vec::new(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn step_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn admittance(&self) -> &SparseMatrix<Complex<R>> {
        &self.admittance
    }

    pub fn kind(&self, node: usize) -> BusKind {
        self.kinds[node]
    }

    /// Appends the coefficients of the next step and derives the auxiliary
    /// series from them.
    ///
    /// Fails with [`HelmError::Degenerate`] if a PQ coefficient of step 0 is
    /// exactly zero. Nothing is stored in that case.
    pub fn add_coefficients(&mut self, coefficients: Vector<Complex<R>>) -> Result<()> {
        assert_eq!(
            coefficients.len(),
            self.node_count(),
            "one coefficient per node is required"
        );
        let step = self.step_count();
        if step == 0 {
            if let Some(&node) = self.pq_nodes.iter().find(|&&i| coefficients[i].is_zero()) {
                return Err(HelmError::Degenerate(format!(
                    "constant coefficient of PQ node {} is zero",
                    node
                )));
            }
        }
        self.coefficients.push(coefficients);

        let inverse = (0..self.pq_nodes.len())
            .map(|k| self.next_inverse(k, step))
            .collect();
        self.inverse.push(inverse);

        let squared = (0..self.pv_nodes.len())
            .map(|k| self.next_squared(k, step))
            .collect();
        self.squared.push(squared);

        let weighted = (0..self.pv_nodes.len())
            .map(|k| self.next_weighted(k, step))
            .collect();
        self.weighted.push(weighted);

        let combined = (0..self.pv_nodes.len())
            .map(|k| self.next_combined(k, step))
            .collect();
        self.combined.push(combined);

        Ok(())
    }

    fn next_inverse(&self, k: usize, step: usize) -> Complex<R> {
        let node = self.pq_nodes[k];
        let c0 = self.coefficients[0][node].clone();
        if step == 0 {
            return Complex::one(c0.ctx()) / c0;
        }
        let sum = (0..step).fold(Complex::zero(c0.ctx()), |acc, i| {
            acc + self.coefficients[step - i][node].clone() * self.inverse[i][k].clone()
        });
        -(sum / c0)
    }

    fn next_squared(&self, k: usize, step: usize) -> Complex<R> {
        let node = self.pv_nodes[k];
        let ctx = self.admittance.ctx();
        (0..=step).fold(Complex::zero(ctx), |acc, j| {
            acc + self.coefficients[j][node].clone() * self.coefficients[step - j][node].clone()
        })
    }

    fn next_weighted(&self, k: usize, step: usize) -> Complex<R> {
        let node = self.pv_nodes[k];
        let ctx = self.admittance.ctx();
        let c = &self.coefficients[step];
        self.admittance
            .row(node, 0)
            .filter(|(j, _)| *j != node)
            .fold(Complex::zero(ctx), |acc, (j, y)| acc + (y.clone() * c[j].clone()).conj())
    }

    // Expects the squared and weighted series of `step` to be stored.
    fn next_combined(&self, k: usize, step: usize) -> Complex<R> {
        let node = self.pv_nodes[k];
        let ctx = self.admittance.ctx();
        let convolution = (0..=step).fold(Complex::zero(ctx), |acc, j| {
            acc + self.weighted[j][k].clone() * self.squared[step - j][k].clone()
        });
        let diagonal = self
            .admittance
            .get(node, node)
            .conj()
            .scale(&self.pv_magnitudes_squared[k]);
        convolution + diagonal * self.coefficients[step][node].clone()
    }

    pub fn coefficients(&self, step: usize) -> &Vector<Complex<R>> {
        &self.coefficients[step]
    }

    pub fn coefficient(&self, step: usize, node: usize) -> &Complex<R> {
        &self.coefficients[step][node]
    }

    pub fn inverse_coefficient(&self, step: usize, node: usize) -> &Complex<R> {
        &self.inverse[step][self.pq_index(node)]
    }

    pub fn squared_coefficient(&self, step: usize, node: usize) -> &Complex<R> {
        &self.squared[step][self.pv_index(node)]
    }

    pub fn weighted_coefficient(&self, step: usize, node: usize) -> &Complex<R> {
        &self.weighted[step][self.pv_index(node)]
    }

    pub fn combined_coefficient(&self, step: usize, node: usize) -> &Complex<R> {
        &self.combined[step][self.pv_index(node)]
    }

    fn pq_index(&self, node: usize) -> usize {
        match self.kinds[node] {
            BusKind::PQ(k) => k,
            BusKind::PV(_) => panic!("node {} is not a PQ bus", node),
        }
    }

    fn pv_index(&self, node: usize) -> usize {
        match self.kinds[node] {
            BusKind::PV(k) => k,
            BusKind::PQ(_) => panic!("node {} is not a PV bus", node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_types::{PQBus, PVBus};
    use crate::cmplx;
    use crate::scalar::{BigReal, Precision};
    use anyhow::Result;

    fn close(z: &Complex<f64>, re: f64, im: f64) -> bool {
        (z.re - re).abs() < 1e-6 && (z.im - im).abs() < 1e-6
    }

    fn single_pq<R: Real>(ctx: R::Context) -> Result<CoefficientStorage<R>> {
        let y = SparseMatrix::from_triplets(ctx, 1, 1, vec![(0, 0, Complex::from_f64(ctx, 1.0, 0.0))]);
        let buses = Buses::new(
            vec![PQBus {
                id: 0,
                power: cmplx!(1.0),
            }],
            vec![],
        );
        Ok(CoefficientStorage::new(y, &buses)?)
    }

    #[test]
    fn test_inverse_coefficients() -> Result<()> {
        let mut storage = single_pq::<f64>(())?;
        for c in [2.0, 3.0, 5.0] {
            storage.add_coefficients(Vector::from(vec![Complex::new(c, 0.0)]))?;
        }
        assert!(close(storage.inverse_coefficient(0, 0), 0.5, 0.0));
        assert!(close(storage.inverse_coefficient(1, 0), -0.75, 0.0));
        assert!(close(storage.inverse_coefficient(2, 0), -0.125, 0.0));
        assert_eq!(storage.step_count(), 3);
        Ok(())
    }

    #[test]
    fn test_inverse_coefficients_arbitrary_precision() -> Result<()> {
        let p = Precision::new(100);
        let mut storage = single_pq::<BigReal>(p)?;
        for c in [2.0, 3.0, 5.0] {
            storage.add_coefficients(Vector::from(vec![Complex::from_f64(p, c, 0.0)]))?;
        }
        let inv = storage.inverse_coefficient(2, 0).to_c64();
        assert!((inv.re + 0.125).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_zero_constant_coefficient() -> Result<()> {
        let mut storage = single_pq::<f64>(())?;
        let result = storage.add_coefficients(Vector::from(vec![Complex::new(0.0, 0.0)]));
        assert!(matches!(result, Err(HelmError::Degenerate(_))));
        assert_eq!(storage.step_count(), 0);
        Ok(())
    }

    fn mixed() -> Result<CoefficientStorage<f64>> {
        let c = |re, im| Complex::new(re, im);
        let y = SparseMatrix::from_triplets(
            (),
            2,
            2,
            vec![
                (0, 0, c(100.0, 100.0)),
                (0, 1, c(-10.0, 1.0)),
                (1, 0, c(-10.0, 0.0)),
                (1, 1, c(20.0, 0.0)),
            ],
        );
        let buses = Buses::new(
            vec![PQBus {
                id: 1,
                power: cmplx!(-1.0, -0.5),
            }],
            vec![PVBus {
                id: 0,
                real_power: 1.0,
                voltage_magnitude: 0.7,
            }],
        );
        let mut storage = CoefficientStorage::new(y, &buses)?;
        for (pv, pq) in [(c(2.0, 0.0), c(0.0, 3.0)), (c(3.0, 0.0), c(0.0, 7.0)), (c(5.0, 0.0), c(1.0, 1.0))] {
            storage.add_coefficients(Vector::from(vec![pv, pq]))?;
        }
        Ok(storage)
    }

    #[test]
    fn test_squared_coefficients() -> Result<()> {
        let storage = mixed()?;
        assert!(close(storage.squared_coefficient(0, 0), 4.0, 0.0));
        assert!(close(storage.squared_coefficient(1, 0), 12.0, 0.0));
        assert!(close(storage.squared_coefficient(2, 0), 29.0, 0.0));
        Ok(())
    }

    #[test]
    fn test_weighted_coefficients() -> Result<()> {
        let storage = mixed()?;
        // conj((-10 + i) * 3i)
        assert!(close(storage.weighted_coefficient(0, 0), -3.0, 30.0));
        Ok(())
    }

    #[test]
    fn test_combined_coefficients() -> Result<()> {
        let storage = mixed()?;
        assert!(close(storage.combined_coefficient(0, 0), 86.0, 22.0));
        assert!(close(storage.combined_coefficient(1, 0), 83.0, 493.0));
        assert!(close(storage.combined_coefficient(2, 0), 30.0, 1501.0));
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_step() {
        if let Ok(storage) = mixed() {
            storage.coefficient(3, 0);
        }
    }

    #[test]
    #[should_panic]
    fn test_wrong_bus_kind() {
        if let Ok(storage) = mixed() {
            storage.inverse_coefficient(0, 0);
        }
    }
}
