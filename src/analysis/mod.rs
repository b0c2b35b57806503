//! Per-track analyses.
//!
//! A [`TrackAnalyzer`] borrows one trajectory and keeps the latest result of
//! each analysis until it is rerun or deleted:
//!
//! - MSD analysis: linear vs power-law MSD
//! - ADC analysis: apparent diffusion coefficient from the MSD curve
//! - SD analysis: apparent diffusion coefficient from the displacement
//!   distribution at selected lags

use serde::{Deserialize, Serialize};

use crate::displacement::{ParallelConfig, mean_squared_displacement, parallel_map, squared_displacements};
use crate::domain::{AnalysisConfig, AnalysisResult, DappCurve, ModelConfig, MsdCurve, ScanContext, SdConfig, Trajectory};
use crate::error::AnalysisError;
use crate::fit::categorize;
use crate::math::{LmOptions, density_histogram, levenberg_marquardt, maxwell_pdf, rayleigh_pdf};
use crate::models::ModelRegistry;

/// Upper limit on histogram bins per lag.
pub const MAX_HISTOGRAM_BINS: usize = 10_000;

/// Apparent diffusion curve with the classification fitted to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DappAnalysis {
    pub dapp: DappCurve,
    pub result: AnalysisResult,
}

/// Analysis state for a single trajectory.
#[derive(Debug, Clone)]
pub struct TrackAnalyzer<'a> {
    trajectory: &'a Trajectory,
    dapp_registry: ModelRegistry,
    msd_registry: ModelRegistry,
    msd: Option<MsdCurve>,
    msd_results: Option<AnalysisResult>,
    adc_results: Option<DappAnalysis>,
    sd_results: Option<DappAnalysis>,
}

impl<'a> TrackAnalyzer<'a> {
    /// Analyzer with the default model sets.
    pub fn new(trajectory: &'a Trajectory) -> Self {
        Self {
            trajectory,
            dapp_registry: ModelRegistry::dapp_default(),
            msd_registry: ModelRegistry::msd_default(),
            msd: None,
            msd_results: None,
            adc_results: None,
            sd_results: None,
        }
    }

    /// Analyzer using `registry` for its scanning context.
    pub fn with_registry(trajectory: &'a Trajectory, registry: ModelRegistry) -> Self {
        let mut analyzer = Self::new(trajectory);
        match registry.context() {
            ScanContext::Dapp => analyzer.dapp_registry = registry,
            ScanContext::Msd => analyzer.msd_registry = registry,
        }
        analyzer
    }

    pub fn trajectory(&self) -> &Trajectory {
        self.trajectory
    }

    /// Compute the MSD curve unless one over the same `max_lag` is cached.
    pub fn calculate_msd(&mut self, max_lag: Option<usize>, parallel: &ParallelConfig) -> Result<&MsdCurve, AnalysisError> {
        let wanted = max_lag.unwrap_or(self.trajectory.len());
        let trajectory = self.trajectory;
        if matches!(&self.msd, Some(curve) if curve.max_lag == wanted) {
            return Ok(self.msd.as_ref().expect("cached curve checked above"));
        }
        // The cached curve is only replaced once the new one exists.
        let curve = mean_squared_displacement(trajectory, max_lag, parallel)?;
        Ok(&*self.msd.insert(curve))
    }

    /// Cached MSD curve, if any.
    pub fn msd(&self) -> Option<&MsdCurve> {
        self.msd.as_ref()
    }

    /// Fit linear and power-law models to the MSD curve.
    pub fn msd_analysis(&mut self, config: &AnalysisConfig) -> Result<&AnalysisResult, AnalysisError> {
        config.validate()?;
        let dt = self.trajectory.dt()?;
        let curve = self.cached_or_full_msd(&config.parallel)?;
        let times = curve.lag_times(dt);

        let result = categorize(
            &self.msd_registry,
            &times,
            &curve.msd,
            Some(&curve.msd_error),
            None,
            &config.fit,
        )?;
        Ok(&*self.msd_results.insert(result))
    }

    /// Classify from the apparent diffusion coefficient `MSD / (2·d·T·(1 - 2R·dt/T))`.
    pub fn adc_analysis(&mut self, config: &AnalysisConfig) -> Result<&DappAnalysis, AnalysisError> {
        config.validate()?;
        let dt = self.trajectory.dt()?;
        let dims = self.trajectory.dimensions() as f64;
        let curve = self.cached_or_full_msd(&config.parallel)?;

        let t = curve.lag_times(dt);
        let scale: Vec<f64> = t
            .iter()
            .map(|&ti| 2.0 * dims * ti * (1.0 - 2.0 * config.r * dt / ti))
            .collect();
        let dapp: Vec<f64> = curve.msd.iter().zip(&scale).map(|(m, s)| m / s).collect();
        let dapp_error: Vec<f64> = curve.msd_error.iter().zip(&scale).map(|(e, s)| e / s).collect();

        let result = categorize(
            &self.dapp_registry,
            &t,
            &dapp,
            Some(&dapp_error),
            Some(ModelConfig { r: config.r, dt }),
            &config.fit,
        )?;

        let analysis = DappAnalysis {
            dapp: DappCurve {
                lags: curve.lags(),
                t,
                dapp,
                dapp_error,
            },
            result,
        };
        Ok(&*self.adc_results.insert(analysis))
    }

    /// Classify from displacement-magnitude histograms at `sd_config.lags`.
    ///
    /// At each lag the magnitudes are histogrammed with `bin_size` and fitted
    /// with a Rayleigh (2D) or Maxwell (3D) density; the per-axis deviation
    /// `σ` gives `Dapp = σ² / (2t)`. Lags beyond `N - 2` are skipped and lags
    /// whose histogram cannot be fitted yield `NaN`.
    pub fn sd_analysis(&mut self, config: &AnalysisConfig, sd_config: &SdConfig) -> Result<&DappAnalysis, AnalysisError> {
        config.validate()?;
        if !(sd_config.bin_size.is_finite() && sd_config.bin_size > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "bin_size must be > 0, got {}.",
                sd_config.bin_size
            )));
        }

        let dt = self.trajectory.dt()?;
        let n = self.trajectory.len();
        let lags: Vec<usize> = sd_config
            .lags
            .iter()
            .copied()
            .filter(|&lag| lag >= 1 && lag <= n.saturating_sub(2))
            .collect();
        if lags.is_empty() {
            let shortest = sd_config.lags.iter().copied().filter(|&l| l >= 1).min().unwrap_or(1);
            return Err(AnalysisError::InsufficientData {
                needed: shortest.saturating_add(2),
                got: n,
            });
        }
        if lags.len() < sd_config.lags.len() {
            log::debug!(
                "SD analysis: {} of {} lags exceed the track length",
                sd_config.lags.len() - lags.len(),
                sd_config.lags.len()
            );
        }

        let trajectory = self.trajectory;
        let bin_size = sd_config.bin_size;
        let max_evaluations = config.fit.max_evaluations;
        let per_lag = parallel_map(&config.parallel, &lags, |&lag| {
            squared_displacements(trajectory, lag)
                .map(|sd| displacement_dapp(&sd, lag as f64 * dt, trajectory.dimensions(), bin_size, max_evaluations))
        })?;

        let mut dapp = Vec::with_capacity(lags.len());
        let mut dapp_error = Vec::with_capacity(lags.len());
        for entry in per_lag {
            let (d, e) = entry?;
            dapp.push(d);
            dapp_error.push(e);
        }
        let t: Vec<f64> = lags.iter().map(|&lag| lag as f64 * dt).collect();

        let result = categorize(
            &self.dapp_registry,
            &t,
            &dapp,
            Some(&dapp_error),
            Some(ModelConfig { r: config.r, dt }),
            &config.fit,
        )?;

        let analysis = DappAnalysis {
            dapp: DappCurve {
                lags,
                t,
                dapp,
                dapp_error,
            },
            result,
        };
        Ok(&*self.sd_results.insert(analysis))
    }

    pub fn msd_analysis_results(&self) -> Option<&AnalysisResult> {
        self.msd_results.as_ref()
    }

    pub fn adc_analysis_results(&self) -> Option<&DappAnalysis> {
        self.adc_results.as_ref()
    }

    pub fn sd_analysis_results(&self) -> Option<&DappAnalysis> {
        self.sd_results.as_ref()
    }

    pub fn delete_msd_analysis_results(&mut self) {
        self.msd_results = None;
    }

    pub fn delete_adc_analysis_results(&mut self) {
        self.adc_results = None;
    }

    pub fn delete_sd_analysis_results(&mut self) {
        self.sd_results = None;
    }

    /// Reuse any cached curve; compute the full-length one otherwise.
    fn cached_or_full_msd(&mut self, parallel: &ParallelConfig) -> Result<MsdCurve, AnalysisError> {
        if let Some(curve) = &self.msd {
            return Ok(curve.clone());
        }
        self.calculate_msd(None, parallel).cloned()
    }
}

/// `(Dapp, error)` at lag time `t` from sorted squared displacements.
fn displacement_dapp(sd: &[f64], t: f64, dimensions: usize, bin_size: f64, max_evaluations: usize) -> (f64, f64) {
    let magnitudes: Vec<f64> = sd.iter().map(|v| v.sqrt()).collect();
    let (Some(&min), Some(&max)) = (magnitudes.first(), magnitudes.last()) else {
        return (f64::NAN, f64::NAN);
    };
    let span = max - min;

    let mut bins = (span / bin_size).ceil() as usize;
    if bins > MAX_HISTOGRAM_BINS {
        log::warn!("SD analysis: {bins} histogram bins requested at t={t}, capping at {MAX_HISTOGRAM_BINS}");
        bins = MAX_HISTOGRAM_BINS;
    }
    let Some(histogram) = density_histogram(&magnitudes, bins) else {
        log::debug!("SD analysis: no spread in displacements at t={t}");
        return (f64::NAN, f64::NAN);
    };

    let pdf = if dimensions == 3 { maxwell_pdf } else { rayleigh_pdf };
    let centers = histogram.centers();
    let options = LmOptions {
        max_evaluations,
        ..LmOptions::default()
    };
    match levenberg_marquardt(
        |x, p| pdf(x, p[0]),
        &centers,
        &histogram.density,
        &vec![1.0; centers.len()],
        &[span],
        &[0.0],
        &[f64::INFINITY],
        &options,
    ) {
        Ok(solution) => {
            let sigma = solution.params[0];
            let error = solution.errors[0];
            (sigma * sigma / (2.0 * t), error * error / (2.0 * t))
        }
        Err(failure) => {
            log::debug!("SD analysis: distribution fit failed at t={t} ({failure})");
            (f64::NAN, f64::NAN)
        }
    }
}
