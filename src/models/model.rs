//! Model evaluation for the diffusion catalog.
//!
//! The fitter relies on three primitive operations per model:
//! - predict `y(t)` given parameters and scanning constants (for residuals/plots)
//! - the box constraints on its parameters
//! - a default starting point
//!
//! These are implemented here for each model kind.

use crate::domain::{ModelConfig, ModelKind};
use crate::error::AnalysisError;

/// Localization-error contribution to the apparent diffusion coefficient.
///
/// `δ² / (2t(1 - 2R·dt/t))`, written as `δ² / (2(t - 2R·dt))`.
pub fn localization_term(t: f64, delta: f64, config: &ModelConfig) -> f64 {
    delta * delta / (2.0 * (t - 2.0 * config.r * config.dt))
}

/// `(τ/t)(1 - e^{-t/τ})`, the fraction of free diffusion left after confinement.
///
/// Tends to 0 as `τ → 0`.
pub fn confinement_term(t: f64, tau: f64) -> f64 {
    if tau <= 0.0 {
        return 0.0;
    }
    -(tau / t) * (-t / tau).exp_m1()
}

/// Predict `y(t)` for the given model kind.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, t: f64, params: &[f64], config: &ModelConfig) -> f64 {
    match model {
        ModelKind::Brownian => params[0] + localization_term(t, params[1], config),
        ModelKind::Confined => params[0] * confinement_term(t, params[2]) + localization_term(t, params[1], config),
        ModelKind::Hop => {
            params[0] + params[1] * confinement_term(t, params[3]) + localization_term(t, params[2], config)
        }
        ModelKind::HopModified => {
            let (d_macro, d_micro, alpha, tau) = (params[0], params[1], params[2], params[3]);
            let saturation = if tau > 0.0 { -(-t / tau).exp_m1() } else { 1.0 };
            alpha * d_macro + (1.0 - alpha) * d_micro * saturation
        }
        ModelKind::Immobile => localization_term(t, params[0], config),
        ModelKind::Linear => 4.0 * params[0] * t + 2.0 * params[1],
        ModelKind::Power => 4.0 * params[0] * t.powf(params[2]) + 2.0 * params[1],
    }
}

/// Lower parameter bounds: every catalog parameter is non-negative.
pub fn lower_bounds(model: ModelKind) -> Vec<f64> {
    vec![0.0; model.param_count()]
}

pub fn upper_bounds(model: ModelKind) -> Vec<f64> {
    vec![f64::INFINITY; model.param_count()]
}

/// Default starting point.
///
/// Diffusion coefficients start near `0.5 µm²/s` and the localization error near
/// `2 nm` (SI units); MSD models start from zero.
pub fn initial_guess(model: ModelKind) -> Vec<f64> {
    match model {
        ModelKind::Brownian => vec![0.5e-12, 2.0e-9],
        ModelKind::Confined => vec![0.5e-12, 2.0e-9, 1.0e-3],
        ModelKind::Hop => vec![0.5e-12, 0.5e-12, 2.0e-9, 1.0e-3],
        ModelKind::HopModified => vec![0.5e-12, 0.5e-12, 0.0, 1.0e-3],
        ModelKind::Immobile => vec![0.5e-12],
        ModelKind::Linear => vec![0.0, 0.0],
        ModelKind::Power => vec![0.0, 0.0, 1.0],
    }
}

/// Scanning constants to evaluate `model` with.
///
/// Models whose form depends on `R`/`dt` need a configuration; the others
/// ignore it and get a zeroed one.
pub fn resolve_config(model: ModelKind, config: Option<ModelConfig>) -> Result<ModelConfig, AnalysisError> {
    match config {
        Some(config) => Ok(config),
        None if model.requires_config() => Err(AnalysisError::UnconfiguredModel {
            model: model.name().to_string(),
        }),
        None => Ok(ModelConfig { r: 0.0, dt: 0.0 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: ModelConfig = ModelConfig { r: 1.0 / 6.0, dt: 0.1 };

    #[test]
    fn brownian_adds_localization_to_d() {
        let t = 0.5;
        let y = predict(ModelKind::Brownian, t, &[2.0, 0.3], &CONFIG);
        let expected = 2.0 + 0.09 / (2.0 * t * (1.0 - 2.0 * CONFIG.r * CONFIG.dt / t));
        assert!((y - expected).abs() < 1e-12);
    }

    #[test]
    fn confinement_term_limits() {
        // Short times behave freely, long times decay as τ/t.
        assert!((confinement_term(1e-6, 1.0) - 1.0).abs() < 1e-6);
        assert!((confinement_term(1e3, 1.0) - 1e-3).abs() < 1e-9);
        assert_eq!(confinement_term(1.0, 0.0), 0.0);
    }

    #[test]
    fn hop_reduces_to_brownian_without_micro_term() {
        let hop = predict(ModelKind::Hop, 0.3, &[1.5, 0.0, 0.2, 0.01], &CONFIG);
        let brownian = predict(ModelKind::Brownian, 0.3, &[1.5, 0.2], &CONFIG);
        assert!((hop - brownian).abs() < 1e-15);
    }

    #[test]
    fn msd_models() {
        assert_eq!(predict(ModelKind::Linear, 2.0, &[0.5, 0.25], &CONFIG), 4.5);
        let power = predict(ModelKind::Power, 2.0, &[0.5, 0.25, 1.0], &CONFIG);
        assert!((power - 4.5).abs() < 1e-12);
    }

    #[test]
    fn catalog_shapes_agree() {
        for kind in ModelKind::ALL {
            let n = kind.param_count();
            assert_eq!(lower_bounds(kind).len(), n);
            assert_eq!(upper_bounds(kind).len(), n);
            assert_eq!(initial_guess(kind).len(), n);
            assert!(predict(kind, 1.0, &initial_guess(kind), &CONFIG).is_finite());
        }
    }

    #[test]
    fn dapp_models_need_configuration() {
        assert!(matches!(
            resolve_config(ModelKind::Confined, None),
            Err(AnalysisError::UnconfiguredModel { .. })
        ));
        assert!(resolve_config(ModelKind::Power, None).is_ok());
        assert!(resolve_config(ModelKind::HopModified, None).is_ok());
        assert_eq!(resolve_config(ModelKind::Hop, Some(CONFIG)).unwrap(), CONFIG);
    }
}
