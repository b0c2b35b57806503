//! Model selection using BIC and relative likelihoods.
//!
//! The tool fits each active model and computes:
//! - RSS over the retained fit points
//! - BIC = k * ln(n) + n * ln(RSS/n), evaluated with `n = 1`
//! - relative likelihood = exp(-(BIC - BIC_min) / 2)
//!
//! Selection rules:
//! 1. Models whose fit diverged, or whose BIC is not finite, are excluded
//! 2. Choose the model with minimum BIC
//! 3. BIC values within `BIC_TIE_TOLERANCE` of the minimum tie; the first in
//!    catalog order wins
//! 4. If nothing is left the track is `unknown`

use std::collections::BTreeMap;

use crate::domain::{AnalysisResult, Category, FitConfig, FitResult, FitWarning, ModelConfig, ModelKind};
use crate::error::AnalysisError;
use crate::fit::fitter::{FitOptions, ModelFit, fit_model};
use crate::fit::range::select_fit_range;
use crate::models::{ModelRegistry, initial_guess};

/// Sample size plugged into the BIC.
///
/// The penalty term vanishes and BIC reduces to `ln(RSS)`; selection outcomes
/// depend on this, so it is kept fixed.
pub const BIC_SAMPLE_SIZE: usize = 1;

/// BIC values closer than this to the minimum are treated as equal.
pub const BIC_TIE_TOLERANCE: f64 = 1e-9;

/// Bayesian information criterion for `k` free parameters and `n` points.
pub fn bic(rss: f64, k: usize, n: usize) -> f64 {
    let n_f = n as f64;
    (k as f64) * n_f.ln() + n_f * (rss / n_f).ln()
}

/// Index of the minimum-BIC fit, ties resolved by catalog order.
///
/// Returns `None` for an empty slice.
pub fn select_by_bic(fits: &[FitResult]) -> Option<usize> {
    let min_bic = fits.iter().map(|f| f.bic).fold(f64::INFINITY, f64::min);
    fits.iter()
        .enumerate()
        .filter(|(_, f)| f.bic <= min_bic + BIC_TIE_TOLERANCE)
        .min_by_key(|(_, f)| f.model)
        .map(|(i, _)| i)
}

/// `exp(-(bic - best_bic) / 2)` kept inside `[f64::MIN_POSITIVE, 1]`.
pub fn relative_likelihood(bic: f64, best_bic: f64) -> f64 {
    (-(bic - best_bic) * 0.5).exp().clamp(f64::MIN_POSITIVE, 1.0)
}

/// Fit every model in `registry` to `(times, values)` and classify.
///
/// `sigma` holds per-point uncertainties (standard errors). Non-finite points
/// are dropped before the fit range is chosen; `fit_range.indexes` refer to
/// positions in the caller's arrays. Divergence of individual models is
/// recorded, not returned; all other errors abort the call.
pub fn categorize(
    registry: &ModelRegistry,
    times: &[f64],
    values: &[f64],
    sigma: Option<&[f64]>,
    model_config: Option<ModelConfig>,
    config: &FitConfig,
) -> Result<AnalysisResult, AnalysisError> {
    if times.len() != values.len() {
        return Err(AnalysisError::MismatchedInput(format!(
            "{} times for {} values",
            times.len(),
            values.len()
        )));
    }
    if let Some(sigma) = sigma {
        if sigma.len() != values.len() {
            return Err(AnalysisError::MismatchedInput(format!(
                "{} uncertainties for {} values",
                sigma.len(),
                values.len()
            )));
        }
    }

    let finite: Vec<usize> = (0..values.len())
        .filter(|&i| times[i].is_finite() && values[i].is_finite())
        .collect();
    if finite.len() < values.len() {
        log::debug!("Dropped {} non-finite points before fitting", values.len() - finite.len());
    }

    let finite_times: Vec<f64> = finite.iter().map(|&i| times[i]).collect();
    let (mut fit_range, mut warnings) = select_fit_range(&finite_times, &config.range)?;
    for idx in fit_range.indexes.iter_mut() {
        *idx = finite[*idx];
    }

    let x: Vec<f64> = fit_range.indexes.iter().map(|&i| times[i]).collect();
    let y: Vec<f64> = fit_range.indexes.iter().map(|&i| values[i]).collect();
    let s: Option<Vec<f64>> = sigma.map(|sigma| fit_range.indexes.iter().map(|&i| sigma[i]).collect());

    let mut fits: Vec<ModelFit> = Vec::new();
    let mut diverged: Vec<(ModelKind, String)> = Vec::new();

    for &kind in registry.models() {
        let p0 = starting_point(kind, &fits, config)?;
        let opts = FitOptions {
            sigma: s.as_deref(),
            initial_guess: Some(&p0),
            bounds: None,
            model_config,
            max_evaluations: config.max_evaluations,
        };
        match fit_model(kind, &x, &y, &opts) {
            Ok(fit) => {
                if fit.uniform_weights {
                    warnings.push(FitWarning::UniformWeights { model: kind });
                }
                fits.push(fit);
            }
            Err(AnalysisError::FitDivergence { reason, .. }) => diverged.push((kind, reason)),
            Err(e) => return Err(e),
        }
    }

    let mut scored: Vec<FitResult> = Vec::with_capacity(fits.len());
    for fit in fits {
        let score = bic(fit.rss, fit.model.param_count(), BIC_SAMPLE_SIZE);
        if !score.is_finite() {
            diverged.push((
                fit.model,
                format!("degenerate fit: BIC is {score} (RSS={:e})", fit.rss),
            ));
            continue;
        }
        scored.push(to_fit_result(fit, score));
    }
    diverged.sort_by_key(|(kind, _)| *kind);

    let Some(best_idx) = select_by_bic(&scored) else {
        log::debug!("No model converged; track is unknown");
        return Ok(AnalysisResult {
            category: Category::Unknown,
            results: BTreeMap::new(),
            diverged,
            fit_range,
            warnings,
        });
    };

    let best_kind = scored[best_idx].model;
    let best_bic = scored[best_idx].bic;
    let results: BTreeMap<ModelKind, FitResult> = scored
        .into_iter()
        .map(|mut fit| {
            fit.rel_likelihood = if fit.model == best_kind {
                1.0
            } else {
                relative_likelihood(fit.bic, best_bic)
            };
            (fit.model, fit)
        })
        .collect();

    log::debug!("Selected {best_kind} (BIC={best_bic:.4}) out of {} converged models", results.len());

    Ok(AnalysisResult {
        category: Category::Classified(best_kind),
        results,
        diverged,
        fit_range,
        warnings,
    })
}

/// Catalog guess, seeded from an earlier linear fit for the power law, with
/// caller overrides applied last.
fn starting_point(kind: ModelKind, fitted: &[ModelFit], config: &FitConfig) -> Result<Vec<f64>, AnalysisError> {
    let mut p0 = initial_guess(kind);

    if kind == ModelKind::Power {
        if let Some(linear) = fitted.iter().find(|f| f.model == ModelKind::Linear) {
            p0[0] = linear.params[0];
            p0[1] = linear.params[1];
        }
    }

    if let Some(overrides) = config.initial_guesses.get(&kind) {
        if overrides.len() > p0.len() {
            return Err(AnalysisError::InvalidConfig(format!(
                "Initial guess for '{kind}' has {} entries but the model takes {}.",
                overrides.len(),
                p0.len()
            )));
        }
        for (slot, value) in p0.iter_mut().zip(overrides) {
            if let Some(v) = value {
                *slot = *v;
            }
        }
    }

    Ok(p0)
}

fn to_fit_result(fit: ModelFit, bic: f64) -> FitResult {
    FitResult {
        model: fit.model,
        params: fit.params,
        errors: fit.errors,
        rss: fit.rss,
        bic,
        rel_likelihood: 1.0,
        n_points: fit.n_points,
        evaluations: fit.evaluations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRangeConfig, ScanContext};
    use crate::models::predict;

    fn scored(model: ModelKind, bic: f64) -> FitResult {
        FitResult {
            model,
            params: vec![],
            errors: vec![],
            rss: bic.exp(),
            bic,
            rel_likelihood: 1.0,
            n_points: 10,
            evaluations: 1,
        }
    }

    #[test]
    fn bic_with_unit_sample_size_is_log_rss() {
        assert!((bic(2.5, 3, 1) - 2.5f64.ln()).abs() < 1e-15);
        assert!((bic(2.5, 3, 10) - (3.0 * 10f64.ln() + 10.0 * 0.25f64.ln())).abs() < 1e-12);
        assert_eq!(bic(0.0, 2, 1), f64::NEG_INFINITY);
    }

    #[test]
    fn minimum_bic_wins() {
        let fits = vec![scored(ModelKind::Brownian, 3.0), scored(ModelKind::Confined, 1.0)];
        assert_eq!(select_by_bic(&fits), Some(1));
        assert_eq!(select_by_bic(&[]), None);
    }

    #[test]
    fn ties_go_to_catalog_order() {
        let fits = vec![scored(ModelKind::Hop, -4.0), scored(ModelKind::Brownian, -4.0 + 1e-12)];
        assert_eq!(select_by_bic(&fits), Some(1));
    }

    #[test]
    fn relative_likelihood_is_bounded() {
        assert_eq!(relative_likelihood(5.0, 5.0), 1.0);
        assert!((relative_likelihood(7.0, 5.0) - (-1.0f64).exp()).abs() < 1e-15);
        assert_eq!(relative_likelihood(1e6, 0.0), f64::MIN_POSITIVE);
    }

    fn msd_config() -> FitConfig {
        FitConfig {
            range: FitRangeConfig {
                fraction_fit_points: 1.0,
                ..FitRangeConfig::default()
            },
            ..FitConfig::default()
        }
    }

    #[test]
    fn categorize_power_law_data() {
        let t: Vec<f64> = (1..=40).map(|i| i as f64 * 0.05).collect();
        let msd: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, &ti)| {
                let clean = predict(ModelKind::Power, ti, &[0.4, 0.01, 0.5], &ModelConfig { r: 0.0, dt: 0.0 });
                clean + 1e-4 * (i as f64 * 1.7).sin()
            })
            .collect();

        let result = categorize(&ModelRegistry::msd_default(), &t, &msd, None, None, &msd_config()).unwrap();

        assert_eq!(result.category, Category::Classified(ModelKind::Power));
        let best = result.best().unwrap();
        assert_eq!(best.rel_likelihood, 1.0);
        assert!((best.param("alpha").unwrap() - 0.5).abs() < 1e-2);
        let linear = &result.results[&ModelKind::Linear];
        assert!(linear.rel_likelihood > 0.0 && linear.rel_likelihood < 1.0);
        assert_eq!(result.fit_range.n_points, 40);
    }

    #[test]
    fn one_diverged_model_leaves_the_others_to_classify() {
        let t: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let msd: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, &ti)| 4.0 * 0.5 * ti + 2.0 * 0.1 + 1e-3 * (i as f64 * 1.3).sin())
            .collect();
        let mut config = msd_config();
        // t^1e308 overflows for every t > 1, so the power law cannot start.
        config.initial_guesses.insert(ModelKind::Power, vec![None, None, Some(1e308)]);

        let result = categorize(&ModelRegistry::msd_default(), &t, &msd, None, None, &config).unwrap();

        assert_eq!(result.category, Category::Classified(ModelKind::Linear));
        assert_eq!(result.diverged.len(), 1);
        assert_eq!(result.diverged[0].0, ModelKind::Power);
        assert!(result.diverged[0].1.contains("non-finite"), "{}", result.diverged[0].1);
        assert!(!result.results.contains_key(&ModelKind::Power));

        let linear = &result.results[&ModelKind::Linear];
        assert_eq!(linear.rel_likelihood, 1.0);
        assert!((linear.params[0] - 0.5).abs() < 1e-3, "{:?}", linear.params);
    }

    #[test]
    fn exhausted_budget_only_excludes_that_model() {
        let t: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let msd: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, &ti)| 4.0 * 0.5 * ti + 2.0 * 0.1 + 1e-3 * (i as f64 * 1.3).sin())
            .collect();
        let mut registry = ModelRegistry::new(ScanContext::Msd);
        registry.add(ModelKind::Linear).unwrap();
        let with_power = {
            let mut r = registry.clone();
            r.add(ModelKind::Power).unwrap();
            r
        };

        let linear_only = categorize(&registry, &t, &msd, None, None, &msd_config()).unwrap();
        let needed = linear_only.results[&ModelKind::Linear].evaluations;

        // Same budget, but the power law starts from a far-off exponent.
        let mut config = msd_config();
        config.max_evaluations = needed;
        config.initial_guesses.insert(ModelKind::Power, vec![None, None, Some(40.0)]);
        let result = categorize(&with_power, &t, &msd, None, None, &config).unwrap();

        assert_eq!(result.category, Category::Classified(ModelKind::Linear));
        assert!(result.diverged.iter().any(|(kind, _)| *kind == ModelKind::Power));
        assert_eq!(result.results[&ModelKind::Linear].rel_likelihood, 1.0);
    }

    #[test]
    fn all_diverged_is_unknown() {
        let t: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let result = categorize(
            &ModelRegistry::dapp_default(),
            &t,
            &[0.0; 20],
            None,
            Some(ModelConfig { r: 1.0 / 6.0, dt: 1.0 }),
            &FitConfig::default(),
        )
        .unwrap();
        assert_eq!(result.category, Category::Unknown);
        assert!(result.results.is_empty());
        assert_eq!(result.diverged.len(), 3);
        assert!(result.best().is_none());
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let mut t: Vec<f64> = (1..=12).map(|i| i as f64 * 0.1).collect();
        let mut y: Vec<f64> = t.iter().map(|&ti| 4.0 * ti + 0.2).collect();
        y[1] = f64::NAN;
        t[3] = f64::INFINITY;

        let config = FitConfig {
            range: FitRangeConfig {
                n_fit_points: Some(4),
                ..FitRangeConfig::default()
            },
            ..FitConfig::default()
        };
        let result = categorize(&ModelRegistry::msd_default(), &t, &y, None, None, &config).unwrap();
        assert_eq!(result.fit_range.indexes, vec![0, 2, 4, 5]);
    }

    #[test]
    fn initial_guess_overrides_are_validated() {
        let t: Vec<f64> = (1..=12).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 4.0 * ti).collect();
        let mut config = msd_config();
        config.initial_guesses.insert(ModelKind::Linear, vec![Some(1.0), None, Some(3.0)]);
        let err = categorize(&ModelRegistry::msd_default(), &t, &y, None, None, &config).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn empty_registry_is_unknown() {
        let t: Vec<f64> = (1..=12).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 4.0 * ti).collect();
        let registry = ModelRegistry::new(ScanContext::Msd);
        let result = categorize(&registry, &t, &y, None, None, &msd_config()).unwrap();
        assert_eq!(result.category, Category::Unknown);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = categorize(&ModelRegistry::msd_default(), &[1.0, 2.0], &[1.0], None, None, &msd_config()).unwrap_err();
        assert!(matches!(err, AnalysisError::MismatchedInput(_)));
    }
}
