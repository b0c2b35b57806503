//! Bounded Levenberg–Marquardt for small weighted curve fits.
//!
//! We minimize
//!
//! ```text
//! S(p) = Σ w_i (f(x_i; p) - y_i)^2,     lower <= p <= upper
//! ```
//!
//! Implementation notes:
//! - Jacobian by forward differences on the weighted residuals, stepping away
//!   from an active upper bound.
//! - Marquardt scaling: columns are normalized by their norm, so each damped
//!   step solves `[J D⁻¹; √λ I] u = [-r; 0]` with singular values >= √λ.
//! - Bounds are enforced by projecting every trial point onto the box. A
//!   parameter sitting on a bound with its gradient pointing out of the box is
//!   held fixed for that iteration, and the step is solved over the others.
//! - Damping that saturates away from a stationary point is a failure, not a
//!   converged fit.
//! - Only residual evaluations at trial points count against the budget,
//!   mirroring how MINPACK-style drivers count `nfev`.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::math::{pseudo_inverse, solve_least_squares};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Largest scaled projected gradient (relative to the residual norm) accepted
/// when the damping saturates. Finite-difference and rounding noise stay well
/// below this.
const STALL_GTOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum number of residual evaluations.
    pub max_evaluations: usize,
    /// Relative cost reduction below which an accepted step ends the fit.
    pub ftol: f64,
    /// Scaled-gradient threshold (relative to the residual norm).
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 1000,
            ftol: 1e-10,
            gtol: 1e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// One-sigma uncertainties; infinite when the problem has no spare degrees of freedom.
    pub errors: Vec<f64>,
    /// Weighted residual sum of squares at the solution.
    pub weighted_cost: f64,
    pub evaluations: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LmFailure {
    BudgetExhausted { evaluations: usize },
    NonFinite(&'static str),
    /// No downhill step was found although the projected gradient is not small.
    Stalled { gradient: f64 },
}

impl fmt::Display for LmFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LmFailure::BudgetExhausted { evaluations } => write!(
                f,
                "optimal parameters not found: number of function evaluations exceeded {evaluations}"
            ),
            LmFailure::NonFinite(what) => write!(f, "non-finite {what}"),
            LmFailure::Stalled { gradient } => write!(
                f,
                "fit stalled: damping saturated with scaled projected gradient {gradient:.3e}"
            ),
        }
    }
}

/// Fit `model(x, p)` to `y` with per-point weights `sqrt_w` (`sqrt(w_i)`).
///
/// # Panics
/// Panics if `x`, `y` and `sqrt_w` differ in length, or if `initial`, `lower`
/// and `upper` differ in length. Callers validate shapes first.
pub fn levenberg_marquardt<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    sqrt_w: &[f64],
    initial: &[f64],
    lower: &[f64],
    upper: &[f64],
    options: &LmOptions,
) -> Result<LmSolution, LmFailure>
where
    F: Fn(f64, &[f64]) -> f64,
{
    assert!(x.len() == y.len() && y.len() == sqrt_w.len());
    assert!(initial.len() == lower.len() && lower.len() == upper.len());

    let n = x.len();
    let k = initial.len();
    let residuals = |p: &[f64]| -> DVector<f64> {
        DVector::from_iterator(n, (0..n).map(|i| sqrt_w[i] * (model(x[i], p) - y[i])))
    };
    let project = |p: &mut [f64]| {
        for j in 0..k {
            p[j] = p[j].clamp(lower[j], upper[j]);
        }
    };
    // Typical magnitude per parameter for finite-difference steps.
    let scale: Vec<f64> = initial
        .iter()
        .map(|v| if v.abs() > 0.0 { v.abs() } else { 1.0 })
        .collect();

    let mut p = initial.to_vec();
    project(&mut p);

    let mut r = residuals(&p);
    let mut evaluations = 1;
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(LmFailure::NonFinite("residuals at the initial guess"));
    }

    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;
    // Largest scaled projected-gradient component at the current point.
    let mut projected_gradient = 0.0;
    let mut saturated = false;

    'outer: while cost > 0.0 {
        let jac = jacobian(&residuals, &p, &r, &scale, upper);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(LmFailure::NonFinite("Jacobian"));
        }

        let col_norm: Vec<f64> = (0..k)
            .map(|j| {
                let c = jac.column(j).norm();
                if c > 0.0 { c } else { 1.0 }
            })
            .collect();
        let grad = jac.transpose() * &r;

        // Moving along -grad would leave the box for these.
        let free: Vec<usize> = (0..k)
            .filter(|&j| !((p[j] <= lower[j] && grad[j] > 0.0) || (p[j] >= upper[j] && grad[j] < 0.0)))
            .collect();
        projected_gradient = free
            .iter()
            .map(|&j| (grad[j] / col_norm[j]).abs())
            .fold(0.0, f64::max);
        if free.is_empty() || projected_gradient <= options.gtol * cost.sqrt() {
            break;
        }

        let m = free.len();
        let mut js = DMatrix::<f64>::zeros(n, m);
        for (c, &j) in free.iter().enumerate() {
            js.set_column(c, &(jac.column(j) / col_norm[j]));
        }

        loop {
            let mut a = DMatrix::<f64>::zeros(n + m, m);
            a.view_mut((0, 0), (n, m)).copy_from(&js);
            let damping = lambda.sqrt();
            for c in 0..m {
                a[(n + c, c)] = damping;
            }
            let mut b = DVector::<f64>::zeros(n + m);
            b.rows_mut(0, n).copy_from(&(-&r));

            let Some(u) = solve_least_squares(&a, &b) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    saturated = true;
                    break 'outer;
                }
                continue;
            };

            let mut trial = p.clone();
            for (c, &j) in free.iter().enumerate() {
                trial[j] = p[j] + u[c] / col_norm[j];
            }
            project(&mut trial);
            if trial == p {
                // The step fell below the resolution of the parameters.
                saturated = true;
                break 'outer;
            }

            if evaluations >= options.max_evaluations {
                return Err(LmFailure::BudgetExhausted { evaluations });
            }
            let r_trial = residuals(&trial);
            evaluations += 1;
            let cost_trial = r_trial.norm_squared();

            if cost_trial.is_finite() && cost_trial < cost {
                let reduction = cost - cost_trial;
                let previous = cost;
                p = trial;
                r = r_trial;
                cost = cost_trial;
                iterations += 1;
                // A tiny reduction only signals convergence when the step was
                // close to Gauss–Newton, not merely short because of heavy damping.
                let converged = reduction <= options.ftol * previous && lambda <= 1.0;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if converged {
                    break 'outer;
                }
                continue 'outer;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                saturated = true;
                break 'outer;
            }
        }
    }

    if saturated && projected_gradient > STALL_GTOL * cost.sqrt() {
        return Err(LmFailure::Stalled {
            gradient: projected_gradient / cost.sqrt(),
        });
    }

    let errors = parameter_errors(&residuals, &p, &r, &scale, upper, n, cost);

    Ok(LmSolution {
        params: p,
        errors,
        weighted_cost: cost,
        evaluations,
        iterations,
    })
}

fn jacobian<R>(residuals: &R, p: &[f64], r: &DVector<f64>, scale: &[f64], upper: &[f64]) -> DMatrix<f64>
where
    R: Fn(&[f64]) -> DVector<f64>,
{
    let n = r.len();
    let k = p.len();
    let eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(n, k);
    let mut shifted = p.to_vec();

    for j in 0..k {
        let mut h = eps * p[j].abs().max(scale[j]);
        if p[j] + h > upper[j] {
            h = -h;
        }
        shifted[j] = p[j] + h;
        let r_h = residuals(&shifted);
        shifted[j] = p[j];
        // Use the realized step to limit rounding error.
        let step = (p[j] + h) - p[j];
        jac.set_column(j, &((r_h - r) / step));
    }

    jac
}

/// `sqrt(diag(pinv(JᵀJ) * cost / (n - k)))`, infinite without spare degrees of freedom.
fn parameter_errors<R>(
    residuals: &R,
    p: &[f64],
    r: &DVector<f64>,
    scale: &[f64],
    upper: &[f64],
    n: usize,
    cost: f64,
) -> Vec<f64>
where
    R: Fn(&[f64]) -> DVector<f64>,
{
    let k = p.len();
    if n <= k {
        return vec![f64::INFINITY; k];
    }

    let jac = jacobian(residuals, p, r, scale, upper);
    let jtj = jac.transpose() * &jac;
    let Some(cov) = pseudo_inverse(&jtj) else {
        return vec![f64::INFINITY; k];
    };
    let s_sq = cost / (n - k) as f64;
    (0..k).map(|j| (cov[(j, j)] * s_sq).max(0.0).sqrt()).collect()
}
