use crate::error::{HelmError, Result};
use derive_builder::Builder;

/// Real number representation used for a calculation.
#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub enum PrecisionMode {
    /// Hardware `f64`.
    #[default]
    Fixed,
    /// Arbitrary precision with the given number of mantissa bits.
    Multi { bits: usize },
}

#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub enum PivotKind {
    /// Row with the largest magnitude in the pivot column.
    #[default]
    BiggestElement,
    /// Natural row order.
    Natural,
}

/// Linear solver applied to the admittance matrix at every step.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum SolverKind {
    /// Sparse LU decomposition, factorised once per calculation.
    LU(PivotKind),
    /// Jacobi preconditioned BiCGSTAB.
    BiCGSTAB,
    /// Successive over-relaxation.
    SOR { omega: f64, max_iterations: usize },
}

impl Default for SolverKind {
    fn default() -> Self {
        SolverKind::LU(PivotKind::default())
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(name = "pre_build", private, validate = "Self::validate"))]
pub struct HelmOpt {
    pub precision: PrecisionMode,

    // Number of power series coefficients computed per node. At least 2.
    pub max_coefficients: usize,

    // Total relative error below which a solution is reported as converged.
    pub target_precision: f64,

    pub solver: SolverKind,

    // Build right-hand sides on the rayon thread pool.
    pub parallel: bool,
}

impl Default for HelmOpt {
    fn default() -> Self {
        Self {
            precision: PrecisionMode::Fixed,
            max_coefficients: 50,
            target_precision: 1e-5,
            solver: SolverKind::default(),
            parallel: true,
        }
    }
}

impl HelmOpt {
    pub fn builder() -> HelmOptBuilder {
        HelmOptBuilder::default()
    }

    /// Applies the builder checks to options assembled field by field.
    pub fn validate(&self) -> Result<()> {
        HelmOptBuilder::default()
            .precision(self.precision)
            .max_coefficients(self.max_coefficients)
            .target_precision(self.target_precision)
            .solver(self.solver)
            .parallel(self.parallel)
            .build()
            .map(|_| ())
    }
}

impl HelmOptBuilder {
    pub fn build(&self) -> Result<HelmOpt> {
        self.pre_build()
            .map_err(|err| HelmError::Config(err.to_string()))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(n) = self.max_coefficients {
            if n < 2 {
                return Err(format!("coefficient budget must be at least 2 (got {})", n));
            }
        }
        if let Some(PrecisionMode::Multi { bits }) = self.precision {
            if bits < 2 {
                return Err(format!("precision must be at least 2 bits (got {})", bits));
            }
        }
        if let Some(target) = self.target_precision {
            if !(target > 0.0 && target.is_finite()) {
                return Err(format!("target precision must be positive (got {})", target));
            }
        }
        if let Some(SolverKind::SOR {
            omega,
            max_iterations,
        }) = self.solver
        {
            if !(omega > 0.0 && omega < 2.0) {
                return Err(format!("relaxation factor must be in (0, 2) (got {})", omega));
            }
            if max_iterations == 0 {
                return Err("SOR needs at least one iteration".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_defaults() -> Result<()> {
        let opt = HelmOpt::builder().build()?;
        assert_eq!(opt.precision, PrecisionMode::Fixed);
        assert_eq!(opt.max_coefficients, 50);
        assert_eq!(opt.solver, SolverKind::LU(PivotKind::BiggestElement));
        assert!(opt.parallel);
        Ok(())
    }

    #[test]
    fn test_builder() -> Result<()> {
        let opt = HelmOpt::builder()
            .precision(PrecisionMode::Multi { bits: 200 })
            .max_coefficients(80)
            .target_precision(1e-20)
            .solver(SolverKind::BiCGSTAB)
            .parallel(false)
            .build()?;
        assert_eq!(opt.precision, PrecisionMode::Multi { bits: 200 });
        assert_eq!(opt.max_coefficients, 80);
        assert!(!opt.parallel);
        Ok(())
    }

    #[test]
    fn test_validation() {
        let config_error = |b: &HelmOptBuilder| matches!(b.build(), Err(HelmError::Config(_)));

        assert!(config_error(HelmOpt::builder().max_coefficients(1)));
        assert!(config_error(
            HelmOpt::builder().precision(PrecisionMode::Multi { bits: 1 })
        ));
        assert!(config_error(HelmOpt::builder().target_precision(0.0)));
        assert!(config_error(HelmOpt::builder().solver(SolverKind::SOR {
            omega: 2.5,
            max_iterations: 100
        })));
    }
}
