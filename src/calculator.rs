use crate::bicgstab::BiCGSTAB;
use crate::bus_types::{BusKind, Buses, PQBus, PVBus};
use crate::coefficients::CoefficientStorage;
use crate::complex::Complex;
use crate::continuation::AnalyticContinuation;
use crate::debug::format_rect_vec;
use crate::error::{HelmError, Result};
use crate::lu::LUDecomposition;
use crate::math::relative_error;
use crate::options::{HelmOpt, PivotKind, PrecisionMode, SolverKind};
use crate::pivot::{BiggestElementPivot, NaturalPivot};
use crate::scalar::{BigReal, Precision, Real};
use crate::sor::SOR;
use crate::sparse::SparseMatrix;
use crate::traits::{LinearSolver, ProgressMonitor};
use crate::vector::Vector;
use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Calculation progress, safe to poll from another thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Completed share of the coefficient budget, in `[0, 1]`. Stays below 1
    /// when the series stops early.
    pub fraction: f64,
    /// Smallest total relative error found so far.
    pub relative_power_error: f64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            relative_power_error: f64::INFINITY,
        }
    }
}

/// Shared view of a calculator's [`Progress`].
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<Mutex<Progress>>);

impl ProgressHandle {
    pub fn get(&self) -> Progress {
        *self.lock()
    }

    fn set(&self, progress: Progress) {
        *self.lock() = progress;
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Requests a running calculation to stop after its current step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Prints the error of every coefficient step to stdout.
pub struct PrintProgress {}

impl ProgressMonitor for PrintProgress {
    fn update(&self, step: usize, error: f64) {
        if step == 0 {
            println!(" it    total relative error");
            println!("----  ----------------------");
        }
        println!("{:3}        {:10.3e}", step, error);
    }
}

/// Result of a calculation, converted to `f64`.
struct Solution {
    kinds: Vec<BusKind>,
    voltages: Vec<Complex64>,
    coefficients: Vec<Vec<Complex64>>,
    // [step][k] for the k-th PQ bus.
    inverse_coefficients: Vec<Vec<Complex64>>,
    error: f64,
}

/// HELM load-flow calculation of one network.
///
/// The network is described through the setters, in per-unit `f64` values,
/// and solved by [`Calculator::calculate`] in the precision chosen by the
/// options. The slack bus is not a node: its influence enters through the
/// constant current injections.
pub struct Calculator {
    opt: HelmOpt,
    node_count: usize,
    admittance: SparseMatrix<Complex<f64>>,
    row_sums: Vec<Option<Complex64>>,
    constant_currents: Vec<Complex64>,
    pq_buses: Vec<Option<PQBus>>,
    pv_buses: Vec<Option<PVBus>>,

    progress: ProgressHandle,
    cancel: CancelToken,
    monitor: Option<Box<dyn ProgressMonitor>>,
    solution: Option<Solution>,
}

impl Calculator {
    pub fn new(opt: HelmOpt, node_count: usize, pq_count: usize, pv_count: usize) -> Result<Self> {
        opt.validate()?;
        if node_count == 0 {
            return Err(HelmError::Config("the network has no nodes".to_string()));
        }
        if pq_count + pv_count != node_count {
            return Err(HelmError::Config(format!(
                "{} PQ and {} PV buses do not cover {} nodes",
                pq_count, pv_count, node_count
            )));
        }
        Ok(Self {
            opt,
            node_count,
            admittance: SparseMatrix::new((), node_count, node_count),
            row_sums: vec![None; node_count],
            constant_currents: vec![Complex64::zero(); node_count],
            pq_buses: vec![None; pq_count],
            pv_buses: vec![None; pv_count],
            progress: ProgressHandle::default(),
            cancel: CancelToken::default(),
            monitor: None,
            solution: None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn options(&self) -> &HelmOpt {
        &self.opt
    }

    fn check_finite(&self, node: usize, what: &str, value: Complex64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(HelmError::Config(format!(
                "{} of node {} is not finite (got {})",
                what, node, value
            )))
        }
    }

    fn check_node(&self, node: usize) -> Result<()> {
        if node < self.node_count {
            Ok(())
        } else {
            Err(HelmError::Config(format!(
                "node {} is out of range for {} nodes",
                node, self.node_count
            )))
        }
    }

    pub fn set_admittance(&mut self, row: usize, col: usize, value: Complex64) -> Result<()> {
        self.check_node(row)?;
        self.check_node(col)?;
        self.check_finite(row, "admittance", value)?;
        self.admittance.set(row, col, Complex::from_c64((), value));
        Ok(())
    }

    /// Sets the germ of `node`, the right-hand side of the system solved for
    /// the constant coefficients. Defaults to the admittance row sum, which
    /// starts every voltage at `1`.
    pub fn set_row_sum(&mut self, node: usize, value: Complex64) -> Result<()> {
        self.check_node(node)?;
        self.check_finite(node, "row sum", value)?;
        self.row_sums[node] = Some(value);
        Ok(())
    }

    pub fn set_constant_current(&mut self, node: usize, value: Complex64) -> Result<()> {
        self.check_node(node)?;
        self.check_finite(node, "constant current", value)?;
        self.constant_currents[node] = value;
        Ok(())
    }

    /// Sets the `index`-th PQ bus.
    pub fn set_pq_bus(&mut self, index: usize, node: usize, power: Complex64) -> Result<()> {
        self.check_node(node)?;
        self.check_finite(node, "power", power)?;
        let count = self.pq_buses.len();
        match self.pq_buses.get_mut(index) {
            Some(slot) => {
                *slot = Some(PQBus { id: node, power });
                Ok(())
            }
            None => Err(HelmError::Config(format!(
                "PQ bus {} is out of range for {} PQ buses",
                index, count
            ))),
        }
    }

    /// Sets the `index`-th PV bus.
    pub fn set_pv_bus(
        &mut self,
        index: usize,
        node: usize,
        real_power: f64,
        voltage_magnitude: f64,
    ) -> Result<()> {
        self.check_node(node)?;
        self.check_finite(node, "real power", Complex64::new(real_power, 0.0))?;
        if !(voltage_magnitude > 0.0 && voltage_magnitude.is_finite()) {
            return Err(HelmError::Config(format!(
                "voltage magnitude of node {} must be positive (got {})",
                node, voltage_magnitude
            )));
        }
        let count = self.pv_buses.len();
        match self.pv_buses.get_mut(index) {
            Some(slot) => {
                *slot = Some(PVBus {
                    id: node,
                    real_power,
                    voltage_magnitude,
                });
                Ok(())
            }
            None => Err(HelmError::Config(format!(
                "PV bus {} is out of range for {} PV buses",
                index, count
            ))),
        }
    }

    pub fn set_monitor(&mut self, monitor: Box<dyn ProgressMonitor>) {
        self.monitor = Some(monitor);
    }

    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn buses(&self) -> Result<Buses> {
        let pq = self
            .pq_buses
            .iter()
            .enumerate()
            .map(|(k, b)| b.ok_or_else(|| HelmError::Config(format!("PQ bus {} is not set", k))))
            .collect::<Result<Vec<_>>>()?;
        let pv = self
            .pv_buses
            .iter()
            .enumerate()
            .map(|(k, b)| b.ok_or_else(|| HelmError::Config(format!("PV bus {} is not set", k))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Buses::new(pq, pv))
    }

    /// Runs the calculation, replacing the result of any previous run.
    ///
    /// Returns the total relative error of the selected voltages.
    pub fn calculate(&mut self) -> Result<f64> {
        self.solution = None;
        self.progress.set(Progress::default());

        let buses = self.buses()?;
        let kinds = buses.bus_kinds(self.node_count)?;
        for i in 0..self.node_count {
            if self.admittance.get(i, i).is_zero() {
                return Err(HelmError::Config(format!("admittance diagonal {} is zero", i)));
            }
        }

        let solution = match self.opt.precision {
            PrecisionMode::Fixed => self.run::<f64>((), &buses, kinds),
            PrecisionMode::Multi { bits } => {
                self.run::<BigReal>(Precision::new(bits), &buses, kinds)
            }
        };
        self.cancel.reset();
        let solution = solution?;
        let error = solution.error;
        self.solution = Some(solution);
        Ok(error)
    }

    fn run<R: Real>(&self, ctx: R::Context, buses: &Buses, kinds: Vec<BusKind>) -> Result<Solution> {
        let n = self.node_count;
        let max_coefficients = self.opt.max_coefficients;
        let admittance = SparseMatrix::<Complex<R>>::from_c64(ctx, &self.admittance);
        let solver = new_solver(&admittance, &self.opt.solver)?;

        let embedding = Embedding::new(ctx, &admittance, buses, &self.constant_currents);
        let mut germ = self.germ(ctx, &admittance);
        let mut storage = CoefficientStorage::new(admittance.clone(), buses)?;

        // Step 0 with the perturbed germ as fallback.
        let c0 = solve(solver.as_ref(), &germ, 0)?;
        if let Err(err) = storage.add_coefficients(c0) {
            log::warn!("{}, retrying with a perturbed germ", err);
            let one = Complex::one(ctx);
            germ = Vector::from(germ.iter().map(|g| g.clone() + one.clone()).collect::<Vec<_>>());
            let c0 = solve(solver.as_ref(), &germ, 0)?;
            storage
                .add_coefficients(c0)
                .map_err(|err| HelmError::Infeasible(err.to_string()))?;
        }

        let mut continuation = AnalyticContinuation::new(ctx, n);
        let mut best: Option<(R, Vector<Complex<R>>)> = None;

        for step in 0..max_coefficients {
            if self.cancel.is_cancelled() {
                log::info!("calculation cancelled after {} coefficients", step);
                if best.is_none() {
                    return Err(HelmError::Cancelled);
                }
                break;
            }

            if step > 0 {
                let rhs = embedding.right_hand_side(&storage, &germ, step, self.opt.parallel);
                let stored = solve(solver.as_ref(), &rhs, step)
                    .and_then(|c| storage.add_coefficients(c));
                if let Err(err) = stored {
                    if step >= 2 && err.is_recoverable() {
                        log::warn!("stopping after {} coefficients: {}", step, err);
                        break;
                    }
                    return Err(err);
                }
            }
            if log::log_enabled!(log::Level::Trace) {
                let c: Vec<Complex64> = storage.coefficients(step).iter().map(|z| z.to_c64()).collect();
                log::trace!("c[{}] = {}", step, format_rect_vec(&c));
            }

            if let Err(err) = continuation.add_coefficients(storage.coefficients(step)) {
                if best.is_some() && err.is_recoverable() {
                    log::warn!("stopping after {} coefficients: {}", step, err);
                    break;
                }
                return Err(err);
            }
            let voltages = match continuation.voltages() {
                Some(v) => v,
                None => return Err(HelmError::NoSolution),
            };

            let error = embedding.total_error(&voltages);
            log::debug!("step {}: total relative error {:e}", step, error.as_f64());
            if error.is_finite() && best.as_ref().map_or(true, |(e, _)| error < *e) {
                best = Some((error, voltages));
            }

            let best_error = best.as_ref().map_or(f64::INFINITY, |(e, _)| e.as_f64());
            self.progress.set(Progress {
                fraction: (step + 1) as f64 / max_coefficients as f64,
                relative_power_error: best_error,
            });
            if let Some(monitor) = &self.monitor {
                monitor.update(step, best_error);
            }
        }

        let (error, voltages) = best.ok_or(HelmError::NoSolution)?;
        let error = error.as_f64();
        if error < self.opt.target_precision {
            log::info!("converged with total relative error {:e}", error);
        } else {
            log::info!(
                "best total relative error {:e} is above the target {:e}",
                error,
                self.opt.target_precision
            );
        }

        let coefficients = (0..storage.step_count())
            .map(|s| storage.coefficients(s).iter().map(|z| z.to_c64()).collect())
            .collect();
        let pq_ids = buses.pq_ids();
        let inverse_coefficients = (0..storage.step_count())
            .map(|s| {
                pq_ids
                    .iter()
                    .map(|&node| storage.inverse_coefficient(s, node).to_c64())
                    .collect()
            })
            .collect();

        Ok(Solution {
            kinds,
            voltages: voltages.iter().map(|z| z.to_c64()).collect(),
            coefficients,
            inverse_coefficients,
            error,
        })
    }

    fn germ<R: Real>(&self, ctx: R::Context, admittance: &SparseMatrix<Complex<R>>) -> Vector<Complex<R>> {
        let germ = (0..self.node_count)
            .map(|i| match self.row_sums[i] {
                Some(value) => Complex::from_c64(ctx, value),
                None => admittance
                    .row(i, 0)
                    .fold(Complex::zero(ctx), |acc, (_, y)| acc + y.clone()),
            })
            .collect::<Vec<_>>();
        Vector::from(germ)
    }

    fn solution(&self) -> Result<&Solution> {
        self.solution.as_ref().ok_or(HelmError::NoSolution)
    }

    /// Voltage of `node` selected by the last calculation.
    pub fn voltage(&self, node: usize) -> Result<Complex64> {
        let solution = self.solution()?;
        self.check_node(node)?;
        Ok(solution.voltages[node])
    }

    pub fn voltages(&self) -> Result<Vec<Complex64>> {
        Ok(self.solution()?.voltages.clone())
    }

    /// Power series coefficient `step` of `node`.
    pub fn coefficient(&self, step: usize, node: usize) -> Result<Complex64> {
        let solution = self.solution()?;
        self.check_node(node)?;
        check_step(step, solution.coefficients.len())?;
        Ok(solution.coefficients[step][node])
    }

    /// Coefficient `step` of the series of `1 / V` at a PQ node.
    pub fn inverse_coefficient(&self, step: usize, node: usize) -> Result<Complex64> {
        let solution = self.solution()?;
        self.check_node(node)?;
        check_step(step, solution.coefficients.len())?;
        match solution.kinds[node] {
            BusKind::PQ(k) => Ok(solution.inverse_coefficients[step][k]),
            BusKind::PV(_) => Err(HelmError::Config(format!("node {} is not a PQ bus", node))),
        }
    }

    /// Number of coefficients computed by the last calculation.
    pub fn coefficient_count(&self) -> usize {
        self.solution.as_ref().map_or(0, |s| s.coefficients.len())
    }

    pub fn relative_power_error(&self) -> f64 {
        self.progress.get().relative_power_error
    }

    pub fn converged(&self) -> bool {
        self.solution
            .as_ref()
            .map_or(false, |s| s.error < self.opt.target_precision)
    }
}

fn check_step(step: usize, count: usize) -> Result<()> {
    if step < count {
        Ok(())
    } else {
        Err(HelmError::Config(format!(
            "coefficient {} is out of range for {} coefficients",
            step, count
        )))
    }
}

fn new_solver<R: Real>(
    admittance: &SparseMatrix<Complex<R>>,
    kind: &SolverKind,
) -> Result<Box<dyn LinearSolver<Complex<R>>>> {
    let ctx = admittance.ctx();
    let tolerance = R::epsilon(ctx) * R::from_f64(ctx, 1e3);
    let solver: Box<dyn LinearSolver<Complex<R>>> = match *kind {
        SolverKind::LU(PivotKind::BiggestElement) => {
            Box::new(LUDecomposition::new(admittance, &BiggestElementPivot)?)
        }
        SolverKind::LU(PivotKind::Natural) => {
            Box::new(LUDecomposition::new(admittance, &NaturalPivot)?)
        }
        SolverKind::BiCGSTAB => Box::new(BiCGSTAB::new(admittance, tolerance)?),
        SolverKind::SOR {
            omega,
            max_iterations,
        } => Box::new(SOR::new(admittance, omega, max_iterations, tolerance)?),
    };
    Ok(solver)
}

fn solve<R: Real>(
    solver: &dyn LinearSolver<Complex<R>>,
    rhs: &Vector<Complex<R>>,
    step: usize,
) -> Result<Vector<Complex<R>>> {
    let c = solver.solve(rhs)?;
    if !c.is_finite() {
        return Err(HelmError::Overflow(format!("coefficients of step {} are not finite", step)));
    }
    Ok(c)
}

/// Bus data of the embedded system in the working precision.
struct Embedding<'a, R: Real> {
    admittance: &'a SparseMatrix<Complex<R>>,
    kinds: Vec<NodeSpec<R>>,
    currents: Vector<Complex<R>>,
}

enum NodeSpec<R: Real> {
    PQ {
        power: Complex<R>,
    },
    PV {
        real_power: R,
        magnitude: R,
    },
}

impl<'a, R: Real> Embedding<'a, R> {
    fn new(
        ctx: R::Context,
        admittance: &'a SparseMatrix<Complex<R>>,
        buses: &Buses,
        currents: &[Complex64],
    ) -> Self {
        let mut kinds: Vec<Option<NodeSpec<R>>> = (0..admittance.rows()).map(|_| None).collect();
        for b in &buses.pq {
            kinds[b.id] = Some(NodeSpec::PQ {
                power: Complex::from_c64(ctx, b.power),
            });
        }
        for b in &buses.pv {
            kinds[b.id] = Some(NodeSpec::PV {
                real_power: R::from_f64(ctx, b.real_power),
                magnitude: R::from_f64(ctx, b.voltage_magnitude),
            });
        }
        Self {
            admittance,
            // Bus kinds are validated before the embedding is built.
            kinds: kinds.into_iter().flatten().collect(),
            currents: Vector::from(
                currents
                    .iter()
                    .map(|&z| Complex::from_c64(ctx, z))
                    .collect::<Vec<_>>(),
            ),
        }
    }

    /// Nonlinear term of `node` at coefficient `step`.
    fn term(&self, storage: &CoefficientStorage<R>, node: usize, step: usize) -> Complex<R> {
        match &self.kinds[node] {
            NodeSpec::PQ { power } => {
                power.conj() * storage.inverse_coefficient(step, node).conj()
            }
            NodeSpec::PV {
                real_power,
                magnitude,
            } => {
                let c = storage.coefficient(step, node).clone();
                let two_p = real_power.clone() + real_power.clone();
                let numerator = c.scale(&two_p) - storage.combined_coefficient(step, node).clone()
                    + self.currents[node].conj() * storage.squared_coefficient(step, node).clone();
                let v_sq = magnitude.clone() * magnitude.clone();
                numerator.scale(&(R::one(v_sq.ctx()) / v_sq))
            }
        }
    }

    /// Right-hand side of the system for coefficient `step >= 1`.
    fn right_hand_side(
        &self,
        storage: &CoefficientStorage<R>,
        germ: &Vector<Complex<R>>,
        step: usize,
        parallel: bool,
    ) -> Vector<Complex<R>> {
        let entry = |i: usize| {
            let f = self.term(storage, i, step - 1);
            if step == 1 {
                self.currents[i].clone() - germ[i].clone() + f
            } else {
                f
            }
        };
        let n = self.kinds.len();
        let rhs: Vec<Complex<R>> = if parallel {
            (0..n).into_par_iter().map(entry).collect()
        } else {
            (0..n).map(entry).collect()
        };
        Vector::from(rhs)
    }

    /// Sum of the relative power and voltage errors of all buses.
    fn total_error(&self, voltages: &Vector<Complex<R>>) -> R {
        let currents = self.admittance.mul_vec(voltages).subtract(&self.currents);
        let ctx = self.admittance.ctx();
        let mut total = R::zero(ctx);
        for (i, spec) in self.kinds.iter().enumerate() {
            let power = voltages[i].clone() * currents[i].conj();
            match spec {
                NodeSpec::PQ { power: expected } => {
                    total = total + relative_error((power - expected.clone()).abs(), expected.abs());
                }
                NodeSpec::PV {
                    real_power,
                    magnitude,
                } => {
                    total = total
                        + relative_error(
                            (power.re - real_power.clone()).abs(),
                            real_power.abs(),
                        )
                        + relative_error(
                            (voltages[i].abs() - magnitude.clone()).abs(),
                            magnitude.clone(),
                        );
                }
            }
        }
        total
    }
}
