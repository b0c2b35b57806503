//! Reporting utilities: fitted curves, residuals, and formatted terminal output.
//!
//! Rendering is left to callers; this module only produces plain data and text.

use crate::domain::{AnalysisResult, FitResult, ModelConfig};
use crate::ensemble::EnsembleAverage;
use crate::error::AnalysisError;
use crate::models::predict;

/// Model prediction at each of `times`.
pub fn fitted_curve(fit: &FitResult, times: &[f64], config: &ModelConfig) -> Vec<f64> {
    times
        .iter()
        .map(|&t| predict(fit.model, t, &fit.params, config))
        .collect()
}

/// `observed - fitted` at the points a fit was made on.
pub fn compute_residuals(
    fit: &FitResult,
    result: &AnalysisResult,
    times: &[f64],
    values: &[f64],
    config: &ModelConfig,
) -> Result<Vec<f64>, AnalysisError> {
    let mut out = Vec::with_capacity(result.fit_range.indexes.len());
    for &i in &result.fit_range.indexes {
        let (Some(&t), Some(&y)) = (times.get(i), values.get(i)) else {
            return Err(AnalysisError::MismatchedInput(format!(
                "fit index {i} is outside a curve of {} points",
                values.len().min(times.len())
            )));
        };
        let y_fit = predict(fit.model, t, &fit.params, config);
        if !y_fit.is_finite() {
            return Err(AnalysisError::divergence(
                fit.model.name(),
                "non-finite model prediction during residual computation",
            ));
        }
        out.push(y - y_fit);
    }
    Ok(out)
}

/// Format per-model diagnostics and the chosen category.
pub fn format_analysis_summary(title: &str, result: &AnalysisResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {title} ===\n"));
    out.push_str(&format!(
        "Fit range: {} points ({} retained)\n",
        result.fit_range.n_points,
        result.fit_range.indexes.len()
    ));

    out.push_str("\nModel diagnostics:\n");
    for fit in result.results.values() {
        let chosen = if result.category.model() == Some(fit.model) { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<16} RSS={:.3e} BIC={:.3} L_rel={:.3e} evals={}\n",
            fit.model.display_name(),
            fit.rss,
            fit.bic,
            fit.rel_likelihood,
            fit.evaluations
        ));
    }
    for (kind, reason) in &result.diverged {
        out.push_str(&format!("  (diverged {}) {reason}\n", kind.display_name()));
    }

    out.push_str(&format!("\nDiffusion category: {}\n", result.category));
    if let Some(best) = result.best() {
        for ((name, value), error) in best.model.param_names().iter().zip(&best.params).zip(&best.errors) {
            out.push_str(&format!("- {name:<8} = {value:.6e} ± {error:.3e}\n"));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &result.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out
}

/// Format category fractions and counts of an ensemble.
pub fn format_ensemble_summary(average: &EnsembleAverage) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Tracks: {} ({} unknown)\n",
        average.total, average.unknown_count
    ));
    out.push_str(format!("{:<16} {:>6} {:>9}\n", "category", "count", "fraction").trim_end());
    out.push('\n');
    for (kind, category) in &average.categories {
        out.push_str(&format!(
            "{:<16} {:>6} {:>8.1}%\n",
            kind.name(),
            category.count,
            100.0 * category.fraction
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::{Category, FitRange, FitWarning, ModelKind};
    use crate::ensemble::CategoryAverage;

    fn linear_result() -> (FitResult, AnalysisResult) {
        let fit = FitResult {
            model: ModelKind::Linear,
            params: vec![0.5, 0.25],
            errors: vec![0.01, 0.02],
            rss: 1e-3,
            bic: 1e-3f64.ln(),
            rel_likelihood: 1.0,
            n_points: 3,
            evaluations: 12,
        };
        let result = AnalysisResult {
            category: Category::Classified(ModelKind::Linear),
            results: BTreeMap::from([(ModelKind::Linear, fit.clone())]),
            diverged: vec![(ModelKind::Power, "budget exhausted".to_string())],
            fit_range: FitRange {
                n_points: 3,
                indexes: vec![0, 1, 2],
            },
            warnings: vec![FitWarning::ExcessiveFitFraction {
                n_points: 3,
                available: 4,
                recommended_max: 1,
            }],
        };
        (fit, result)
    }

    const NO_SCAN: ModelConfig = ModelConfig { r: 0.0, dt: 0.0 };

    #[test]
    fn fitted_curve_and_residuals() {
        let (fit, result) = linear_result();
        let times = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(fitted_curve(&fit, &times, &NO_SCAN), vec![2.5, 4.5, 6.5, 8.5]);

        let values = [3.0, 4.0, 6.5, 100.0];
        let residuals = compute_residuals(&fit, &result, &times, &values, &NO_SCAN).unwrap();
        assert_eq!(residuals, vec![0.5, -0.5, 0.0]);

        assert!(compute_residuals(&fit, &result, &times[..2], &values[..2], &NO_SCAN).is_err());
    }

    #[test]
    fn summary_lists_models_and_warnings() {
        let (_, result) = linear_result();
        let text = format_analysis_summary("MSD analysis", &result);
        assert!(text.contains("=== MSD analysis ==="));
        assert!(text.contains("* Linear MSD"));
        assert!(text.contains("(diverged Power-law MSD) budget exhausted"));
        assert!(text.contains("Diffusion category: linear"));
        assert!(text.contains("Warnings:"));
    }

    #[test]
    fn ensemble_table() {
        let average = EnsembleAverage {
            categories: BTreeMap::from([(
                ModelKind::Brownian,
                CategoryAverage {
                    count: 3,
                    fraction: 0.75,
                    mean: vec![],
                },
            )]),
            unknown_count: 1,
            total: 5,
        };
        let text = format_ensemble_summary(&average);
        assert!(text.contains("Tracks: 5 (1 unknown)"));
        assert!(text.contains("brownian"));
        assert!(text.contains("75.0%"));
    }
}
