//! Low-level fitting routine for a single model kind.
//!
//! Given:
//! - lag times `t_i`
//! - observed values `y_i` (MSD or Dapp)
//! - optional uncertainties `σ_i`
//!
//! we minimize `Σ ((f(t_i; p) - y_i) / σ_i)^2` over the model's box
//! constraints and return the fitted parameters with their standard errors.

use crate::domain::{ModelConfig, ModelKind};
use crate::error::AnalysisError;
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::{initial_guess, lower_bounds, predict, resolve_config, upper_bounds};

/// Uncertainties below this fraction of `|y|` are treated as unusable.
const MIN_RELATIVE_SIGMA: f64 = 1e-10;

/// Options for a single model fit.
#[derive(Debug, Clone, Default)]
pub struct FitOptions<'a> {
    /// Per-point standard errors; `None` fits with uniform weights.
    pub sigma: Option<&'a [f64]>,
    /// Starting point; defaults to the catalog guess.
    pub initial_guess: Option<&'a [f64]>,
    /// `(lower, upper)`; defaults to the catalog bounds.
    pub bounds: Option<(&'a [f64], &'a [f64])>,
    /// Required for models that depend on `R` and `dt`.
    pub model_config: Option<ModelConfig>,
    /// Evaluation budget; `0` means the default of 1000.
    pub max_evaluations: usize,
}

/// Best fit for a single model kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFit {
    pub model: ModelKind,
    pub params: Vec<f64>,
    pub errors: Vec<f64>,
    /// Unweighted residual sum of squares.
    pub rss: f64,
    /// Residual sum of squares in units of `σ`.
    pub weighted_rss: f64,
    pub n_points: usize,
    pub evaluations: usize,
    /// Set when the supplied uncertainties were rejected.
    pub uniform_weights: bool,
}

impl ModelFit {
    pub fn predict(&self, t: f64, config: &ModelConfig) -> f64 {
        predict(self.model, t, &self.params, config)
    }
}

/// Fit a single model kind to `(x, y)`.
pub fn fit_model(model: ModelKind, x: &[f64], y: &[f64], opts: &FitOptions<'_>) -> Result<ModelFit, AnalysisError> {
    let config = resolve_config(model, opts.model_config)?;

    if x.len() != y.len() {
        return Err(AnalysisError::MismatchedInput(format!(
            "x has {} points but y has {}",
            x.len(),
            y.len()
        )));
    }
    if let Some(sigma) = opts.sigma {
        if sigma.len() != y.len() {
            return Err(AnalysisError::MismatchedInput(format!(
                "sigma has {} points but y has {}",
                sigma.len(),
                y.len()
            )));
        }
    }
    let n = x.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientFitPoints { n_points: n });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(AnalysisError::MismatchedInput(
            "fit data must be finite".to_string(),
        ));
    }

    let k = model.param_count();
    let (lower, upper) = match opts.bounds {
        Some((lo, hi)) => (lo.to_vec(), hi.to_vec()),
        None => (lower_bounds(model), upper_bounds(model)),
    };
    let initial = match opts.initial_guess {
        Some(p0) => p0.to_vec(),
        None => initial_guess(model),
    };
    if lower.len() != k || upper.len() != k || initial.len() != k {
        return Err(AnalysisError::InvalidConfig(format!(
            "Model '{model}' takes {k} parameters (got {} initial, {} lower, {} upper).",
            initial.len(),
            lower.len(),
            upper.len()
        )));
    }
    if lower.iter().zip(&upper).any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi) {
        return Err(AnalysisError::InvalidConfig(format!(
            "Model '{model}' has inconsistent bounds."
        )));
    }
    if initial.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "Model '{model}' initial guess must be finite."
        )));
    }

    if y.iter().all(|&v| v == 0.0) {
        return Err(AnalysisError::divergence(
            model.name(),
            "no signal: every observation is zero",
        ));
    }

    let (sqrt_w, uniform_weights) = match opts.sigma {
        Some(sigma) if usable_sigma(sigma, y) => (sigma.iter().map(|s| 1.0 / s).collect::<Vec<_>>(), false),
        Some(_) => (vec![1.0; n], true),
        None => (vec![1.0; n], false),
    };

    let lm = LmOptions {
        max_evaluations: if opts.max_evaluations == 0 { 1000 } else { opts.max_evaluations },
        ..LmOptions::default()
    };
    let solution = levenberg_marquardt(
        |t, p| predict(model, t, p, &config),
        x,
        y,
        &sqrt_w,
        &initial,
        &lower,
        &upper,
        &lm,
    )
    .map_err(|failure| {
        log::debug!("{}: fit diverged ({failure})", model.name());
        AnalysisError::divergence(model.name(), failure.to_string())
    })?;

    let rss = x
        .iter()
        .zip(y)
        .map(|(&t, &yi)| {
            let r = predict(model, t, &solution.params, &config) - yi;
            r * r
        })
        .sum::<f64>();

    log::debug!(
        "{}: params={:?} rss={:.3e} evaluations={}",
        model.name(),
        solution.params,
        rss,
        solution.evaluations
    );

    Ok(ModelFit {
        model,
        params: solution.params,
        errors: solution.errors,
        rss,
        weighted_rss: solution.weighted_cost,
        n_points: n,
        evaluations: solution.evaluations,
        uniform_weights,
    })
}

fn usable_sigma(sigma: &[f64], y: &[f64]) -> bool {
    sigma
        .iter()
        .zip(y)
        .all(|(&s, &yi)| s.is_finite() && s > 0.0 && s >= MIN_RELATIVE_SIGMA * yi.abs())
}
