//! Levenberg–Marquardt driver for small nonlinear least-squares problems.
//!
//! Problems are solved with the `levenberg-marquardt` crate, which minimizes
//! `0.5 * ||r(x)||^2`. An optional cancellation flag is polled before every
//! residual evaluation; a raised flag stops the solver at the next evaluation.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// A nonlinear least-squares problem.
pub trait NllsProblem {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

/// Solver settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmParams {
    /// Evaluation budget, in multiples of `parameter count + 1`.
    pub max_iters: usize,
    /// Stop when the relative cost reduction falls below this.
    pub ftol: f64,
    /// Stop when the relative step size falls below this.
    pub xtol: f64,
    /// Stop when residuals and Jacobian columns are this close to orthogonal.
    pub gtol: f64,
    /// Initial trust region radius, relative to the scaled start point.
    pub stepbound: f64,
}

impl Default for LmParams {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            stepbound: 100.0,
        }
    }
}

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LmTermination {
    CostTolerance,
    StepTolerance,
    GradientTolerance,
    /// Residuals vanished exactly.
    ZeroResidual,
    MaxIterations,
    /// Residuals or the Jacobian became non-finite.
    NumericalFailure,
    /// Zero parameters or residuals, or mismatched dimensions.
    InvalidProblem,
    Cancelled,
}

impl LmTermination {
    /// The solver reached a stationary point rather than giving up.
    pub fn converged(self) -> bool {
        matches!(
            self,
            LmTermination::CostTolerance
                | LmTermination::StepTolerance
                | LmTermination::GradientTolerance
                | LmTermination::ZeroResidual
        )
    }

    fn from_reason(reason: &TerminationReason, cancelled: bool) -> Self {
        match reason {
            TerminationReason::User(_) if cancelled => LmTermination::Cancelled,
            TerminationReason::User(_) | TerminationReason::Numerical(_) => {
                LmTermination::NumericalFailure
            }
            TerminationReason::ResidualsZero => LmTermination::ZeroResidual,
            TerminationReason::Orthogonal => LmTermination::GradientTolerance,
            TerminationReason::Converged { ftol: true, .. } => LmTermination::CostTolerance,
            TerminationReason::Converged { .. } => LmTermination::StepTolerance,
            TerminationReason::LostPatience => LmTermination::MaxIterations,
            TerminationReason::NoParameters
            | TerminationReason::NoResiduals
            | TerminationReason::WrongDimensions(_) => LmTermination::InvalidProblem,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LmReport {
    /// Residual evaluations performed by the solver.
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: LmTermination,
}

/// Adapts an [`NllsProblem`] to the solver's stateful interface.
struct LmWrapper<'a, P: NllsProblem + ?Sized> {
    problem: &'a P,
    params: DVector<f64>,
    cancel: Option<&'a AtomicBool>,
}

impl<P: NllsProblem + ?Sized> LmWrapper<'_, P> {
    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

impl<P: NllsProblem + ?Sized> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        if self.cancelled() {
            return None;
        }
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Minimize `problem` starting from `x0`.
///
/// A cancelled run returns `x0` unchanged.
pub fn minimize<P: NllsProblem + ?Sized>(
    problem: &P,
    x0: DVector<f64>,
    params: &LmParams,
    cancel: Option<&AtomicBool>,
) -> (DVector<f64>, LmReport) {
    let initial_cost = 0.5 * problem.residuals(&x0).norm_squared();
    let lm = LevenbergMarquardt::new()
        .with_ftol(params.ftol)
        .with_xtol(params.xtol)
        .with_gtol(params.gtol)
        .with_stepbound(params.stepbound)
        .with_patience(params.max_iters.max(1));

    let wrapper = LmWrapper {
        problem,
        params: x0.clone(),
        cancel,
    };
    let (wrapper, report) = lm.minimize(wrapper);
    let termination = LmTermination::from_reason(&report.termination, wrapper.cancelled());

    let (x, final_cost) = match termination {
        LmTermination::Cancelled => (x0, initial_cost),
        _ => {
            let x = wrapper.params();
            let cost = if report.objective_function.is_finite() {
                report.objective_function
            } else {
                0.5 * problem.residuals(&x).norm_squared()
            };
            (x, cost)
        }
    };

    log::trace!(
        "lm: {} evaluations, cost {:.3e} -> {:.3e} ({:?})",
        report.number_of_evaluations,
        initial_cost,
        final_cost,
        termination
    );

    (
        x,
        LmReport {
            iterations: report.number_of_evaluations,
            initial_cost,
            final_cost,
            termination,
        },
    )
}

/// Central-difference Jacobian of `f` at `x`.
pub fn central_difference_jacobian<F>(f: F, x: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let m = f(x).len();
    let mut jac = DMatrix::zeros(m, x.len());
    let mut xp = x.clone();
    for k in 0..x.len() {
        let h = 1e-6 * x[k].abs().max(1.0);
        xp[k] = x[k] + h;
        let fp = f(&xp);
        xp[k] = x[k] - h;
        let fm = f(&xp);
        xp[k] = x[k];
        jac.set_column(k, &((fp - fm) / (2.0 * h)));
    }
    jac
}

/// Condition number of the Jacobi-scaled normal matrix `D JᵀJ D`,
/// `D = diag(1/sqrt(JᵀJ_ii))`.
///
/// Scaling removes the effect of parameter units (pixels vs. radians), so the
/// result measures genuine parameter coupling. Returns `f64::INFINITY` for a
/// rank-deficient matrix.
pub fn scaled_condition_number(jtj: &DMatrix<f64>) -> f64 {
    let n = jtj.nrows();
    let mut scaled = jtj.clone();
    for i in 0..n {
        let di = jtj[(i, i)];
        if di <= 0.0 || !di.is_finite() {
            return f64::INFINITY;
        }
        let si = di.sqrt().recip();
        scaled.row_mut(i).scale_mut(si);
        scaled.column_mut(i).scale_mut(si);
    }

    let eig = SymmetricEigen::new(scaled);
    let max = eig.eigenvalues.max();
    let min = eig.eigenvalues.min();
    if min <= 0.0 || !max.is_finite() {
        return f64::INFINITY;
    }
    max / min
}
