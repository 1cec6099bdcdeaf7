//! Small networks shared by the calculator and registry tests.
//!
//! Every network hangs off a slack bus at a fixed voltage, which is folded
//! into the constant current injections.

use crate::calculator::Calculator;
use crate::cmplx;
use crate::options::HelmOpt;
use anyhow::Result;
use num_complex::Complex64;

pub(crate) struct Case {
    pub admittance: Vec<(usize, usize, Complex64)>,
    pub currents: Vec<Complex64>,
    pub pq: Vec<(usize, Complex64)>,
    pub pv: Vec<(usize, f64, f64)>,
}

impl Case {
    pub fn node_count(&self) -> usize {
        self.currents.len()
    }

    pub fn calculator(&self, opt: HelmOpt) -> Result<Calculator> {
        let mut calc = Calculator::new(opt, self.node_count(), self.pq.len(), self.pv.len())?;
        for &(i, j, y) in &self.admittance {
            calc.set_admittance(i, j, y)?;
        }
        for (i, &current) in self.currents.iter().enumerate() {
            calc.set_constant_current(i, current)?;
        }
        for (k, &(node, power)) in self.pq.iter().enumerate() {
            calc.set_pq_bus(k, node, power)?;
        }
        for (k, &(node, p, v)) in self.pv.iter().enumerate() {
            calc.set_pv_bus(k, node, p, v)?;
        }
        Ok(calc)
    }

    /// Largest power or voltage magnitude mismatch of `v`.
    pub fn mismatch(&self, v: &[Complex64]) -> f64 {
        let mut current: Vec<Complex64> = self.currents.iter().map(|i| -i).collect();
        for &(i, j, y) in &self.admittance {
            current[i] += y * v[j];
        }
        let power: Vec<Complex64> = v.iter().zip(&current).map(|(v, i)| v * i.conj()).collect();

        let pq = self.pq.iter().map(|&(k, s)| (power[k] - s).norm());
        let pv = self
            .pv
            .iter()
            .map(|&(k, p, vm)| (power[k].re - p).abs().max((v[k].norm() - vm).abs()));
        pq.chain(pv).fold(0.0, f64::max)
    }
}

/// Single load bus behind a series impedance.
pub(crate) fn pq_feeder() -> Case {
    let y = 1.0 / cmplx!(0.01, 0.1);
    Case {
        admittance: vec![(0, 0, y)],
        currents: vec![y],
        pq: vec![(0, cmplx!(-0.5, -0.2))],
        pv: vec![],
    }
}

/// Single generator bus behind a series impedance.
pub(crate) fn pv_feeder() -> Case {
    let y = 1.0 / cmplx!(0.01, 0.05);
    Case {
        admittance: vec![(0, 0, y)],
        currents: vec![y],
        pq: vec![],
        pv: vec![(0, 0.3, 1.02)],
    }
}

/// Slack (1.02 p.u.) - load bus 0 - generator bus 1.
pub(crate) fn mixed_feeder() -> Case {
    let ys0 = 1.0 / cmplx!(0.01, 0.05);
    let y01 = 1.0 / cmplx!(0.02, 0.08);
    Case {
        admittance: vec![(0, 0, ys0 + y01), (0, 1, -y01), (1, 0, -y01), (1, 1, y01)],
        currents: vec![ys0 * 1.02, cmplx!()],
        pq: vec![(0, cmplx!(-0.8, -0.3))],
        pv: vec![(1, 0.5, 1.01)],
    }
}
