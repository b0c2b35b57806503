//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and selection
//! - handed to a reporting/plotting layer as plain data
//! - exported to JSON by callers that need persistence

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::displacement::ParallelConfig;
use crate::error::AnalysisError;

/// Which curve a model is fitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanContext {
    /// Apparent diffusion coefficient vs lag time (ADC and SD analyses).
    Dapp,
    /// Mean squared displacement vs lag time.
    Msd,
}

/// Diffusion model variants.
///
/// Declaration order is the catalog order used to break BIC ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Brownian,
    Confined,
    Hop,
    HopModified,
    Immobile,
    Linear,
    Power,
}

impl ModelKind {
    /// Full catalog in tie-breaking order.
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Brownian,
        ModelKind::Confined,
        ModelKind::Hop,
        ModelKind::HopModified,
        ModelKind::Immobile,
        ModelKind::Linear,
        ModelKind::Power,
    ];

    /// Stable identifier used for categories and result keys.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Brownian => "brownian",
            ModelKind::Confined => "confined",
            ModelKind::Hop => "hop",
            ModelKind::HopModified => "hop_modified",
            ModelKind::Immobile => "immobile",
            ModelKind::Linear => "linear",
            ModelKind::Power => "power",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Brownian => "Brownian",
            ModelKind::Confined => "Confined",
            ModelKind::Hop => "Hop",
            ModelKind::HopModified => "Hop (modified)",
            ModelKind::Immobile => "Immobile",
            ModelKind::Linear => "Linear MSD",
            ModelKind::Power => "Power-law MSD",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Brownian => &["D", "delta"],
            ModelKind::Confined => &["D_micro", "delta", "tau"],
            ModelKind::Hop => &["D_macro", "D_micro", "delta", "tau"],
            ModelKind::HopModified => &["D_macro", "D_micro", "alpha", "tau"],
            ModelKind::Immobile => &["delta"],
            ModelKind::Linear => &["D", "delta2"],
            ModelKind::Power => &["D", "delta2", "alpha"],
        }
    }

    /// Number of free parameters (the `k` of the information criterion).
    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    pub fn context(self) -> ScanContext {
        match self {
            ModelKind::Linear | ModelKind::Power => ScanContext::Msd,
            _ => ScanContext::Dapp,
        }
    }

    /// Whether the functional form depends on the scanning constants `R` and `dt`.
    pub fn requires_config(self) -> bool {
        matches!(
            self,
            ModelKind::Brownian | ModelKind::Confined | ModelKind::Hop | ModelKind::Immobile
        )
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ModelKind::ALL
            .into_iter()
            .find(|m| m.name() == key)
            .ok_or_else(|| AnalysisError::InvalidConfig(format!("Unknown model name '{s}'.")))
    }
}

/// Scanning constants injected into the Dapp models at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Point-scanning fraction of the frame time.
    pub r: f64,
    /// Uniform time step.
    pub dt: f64,
}

/// Classification outcome for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Classified(ModelKind),
    Unknown,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Classified(kind) => kind.name(),
            Category::Unknown => "unknown",
        }
    }

    pub fn model(self) -> Option<ModelKind> {
        match self {
            Category::Classified(kind) => Some(kind),
            Category::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mean squared displacement for lags `1..=max_lag-3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsdCurve {
    /// Trajectory prefix length the curve was computed over.
    pub max_lag: usize,
    pub msd: Vec<f64>,
    /// Standard error of the mean at each lag.
    pub msd_error: Vec<f64>,
}

impl MsdCurve {
    pub fn len(&self) -> usize {
        self.msd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msd.is_empty()
    }

    /// Lag indices matching `msd` (starting at 1).
    pub fn lags(&self) -> Vec<usize> {
        (1..=self.msd.len()).collect()
    }

    /// Lag times `lag * dt`.
    pub fn lag_times(&self, dt: f64) -> Vec<f64> {
        (1..=self.msd.len()).map(|lag| lag as f64 * dt).collect()
    }
}

impl AsRef<[f64]> for MsdCurve {
    fn as_ref(&self) -> &[f64] {
        &self.msd
    }
}

/// Apparent diffusion coefficient per lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DappCurve {
    pub lags: Vec<usize>,
    pub t: Vec<f64>,
    pub dapp: Vec<f64>,
    pub dapp_error: Vec<f64>,
}

impl DappCurve {
    pub fn len(&self) -> usize {
        self.dapp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dapp.is_empty()
    }
}

impl AsRef<[f64]> for DappCurve {
    fn as_ref(&self) -> &[f64] {
        &self.dapp
    }
}

/// Points actually used by a fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRange {
    /// Length of the contiguous prefix selected by the range policy.
    pub n_points: usize,
    /// Indexes (into the fitted curve) retained after optional log sampling.
    pub indexes: Vec<usize>,
}

/// Non-fatal advisory conditions raised while fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    /// More than 25% of the curve was included; high-lag points carry larger errors.
    ExcessiveFitFraction {
        n_points: usize,
        available: usize,
        recommended_max: usize,
    },
    /// Uncertainties were unusable (zero or non-finite) and uniform weights were used.
    UniformWeights { model: ModelKind },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::ExcessiveFitFraction {
                n_points,
                available,
                recommended_max,
            } => write!(
                f,
                "Using {n_points} of {available} points (recommended <= {recommended_max}); \
                 higher lags carry larger measurement errors."
            ),
            FitWarning::UniformWeights { model } => {
                write!(f, "Model {model}: uncertainties unusable, fitted with uniform weights.")
            }
        }
    }
}

/// Fit output for a single model, including selection statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: Vec<f64>,
    /// One-sigma parameter uncertainties.
    pub errors: Vec<f64>,
    /// Unweighted residual sum of squares over the fitted points.
    pub rss: f64,
    pub bic: f64,
    pub rel_likelihood: f64,
    pub n_points: usize,
    pub evaluations: usize,
}

impl FitResult {
    /// Look up a parameter by its catalog name.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.model
            .param_names()
            .iter()
            .position(|p| *p == name)
            .and_then(|i| self.params.get(i).copied())
    }
}

/// Outcome of a single-track classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: Category,
    /// Converged fits keyed by model (catalog order).
    pub results: BTreeMap<ModelKind, FitResult>,
    /// Models excluded from selection and why.
    pub diverged: Vec<(ModelKind, String)>,
    pub fit_range: FitRange,
    pub warnings: Vec<FitWarning>,
}

impl AnalysisResult {
    /// Fit of the selected model, if any model converged.
    pub fn best(&self) -> Option<&FitResult> {
        self.category.model().and_then(|kind| self.results.get(&kind))
    }
}

/// Fit-range selection policy.
///
/// Precedence: `fit_max_time` overrides `n_fit_points`, which overrides
/// `fraction_fit_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRangeConfig {
    pub fraction_fit_points: f64,
    pub n_fit_points: Option<usize>,
    pub fit_max_time: Option<f64>,
    /// Keep only geometrically spaced points inside the fit range.
    pub enable_log_sampling: bool,
    /// Base-10 exponent between consecutive retained points.
    pub log_sampling_dist: f64,
}

impl Default for FitRangeConfig {
    fn default() -> Self {
        Self {
            fraction_fit_points: 0.25,
            n_fit_points: None,
            fit_max_time: None,
            enable_log_sampling: false,
            log_sampling_dist: 0.2,
        }
    }
}

/// Options shared by every multi-model fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub range: FitRangeConfig,
    /// Model evaluation budget per fit; exhausting it is a divergence.
    pub max_evaluations: usize,
    /// Caller overrides of catalog initial guesses; `None` keeps the default.
    pub initial_guesses: BTreeMap<ModelKind, Vec<Option<f64>>>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            range: FitRangeConfig::default(),
            max_evaluations: 1000,
            initial_guesses: BTreeMap::new(),
        }
    }
}

/// Configuration for the per-track analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub fit: FitConfig,
    /// Point-scanning fraction of the frame time (must be in `[0, 0.5)`).
    pub r: f64,
    pub parallel: ParallelConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fit: FitConfig::default(),
            r: 1.0 / 6.0,
            parallel: ParallelConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.r.is_finite() && (0.0..0.5).contains(&self.r)) {
            return Err(AnalysisError::InvalidConfig(format!(
                "R must be in [0, 0.5), got {}.",
                self.r
            )));
        }
        let range = &self.fit.range;
        if !(range.fraction_fit_points.is_finite() && range.fraction_fit_points > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "fraction_fit_points must be > 0, got {}.",
                range.fraction_fit_points
            )));
        }
        if range.enable_log_sampling && !(range.log_sampling_dist.is_finite() && range.log_sampling_dist > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "log_sampling_dist must be > 0, got {}.",
                range.log_sampling_dist
            )));
        }
        if self.fit.max_evaluations == 0 {
            return Err(AnalysisError::InvalidConfig("max_evaluations must be > 0.".to_string()));
        }
        Ok(())
    }
}

/// Settings specific to the squared-displacement (histogram) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdConfig {
    /// Histogram bin width in trajectory length units.
    pub bin_size: f64,
    /// Lags at which the displacement distribution is evaluated.
    pub lags: Vec<usize>,
}

/// Default lag set: dense at short lags, sparse at long lags.
pub const DEFAULT_SD_LAGS: [usize; 23] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 15, 20, 25, 30, 35, 40, 45, 50, 60, 70, 80, 90, 100,
];

impl Default for SdConfig {
    fn default() -> Self {
        Self {
            bin_size: 10.0e-9,
            lags: DEFAULT_SD_LAGS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_round_trip_through_from_str() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("Hop-Modified".parse::<ModelKind>().unwrap(), ModelKind::HopModified);
        assert!("anomalous".parse::<ModelKind>().is_err());
    }

    #[test]
    fn catalog_order_matches_ord() {
        let mut sorted = ModelKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ModelKind::ALL);
    }

    #[test]
    fn category_labels() {
        assert_eq!(Category::Classified(ModelKind::Hop).label(), "hop");
        assert_eq!(Category::Unknown.to_string(), "unknown");
    }

    #[test]
    fn analysis_config_rejects_r_at_half() {
        let config = AnalysisConfig {
            r: 0.5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
        assert!(AnalysisConfig::default().validate().is_ok());
    }
}
