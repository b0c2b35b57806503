//! Seeded synthetic trajectories.
//!
//! Each generator draws per-axis Gaussian steps with variance `2·D·dt` and adds
//! independent Gaussian localization noise to the observed positions. A fixed
//! seed reproduces the same track.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::domain::Trajectory;
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub n_points: usize,
    /// Frame interval.
    pub dt: f64,
    /// Diffusion coefficient (length² / time).
    pub diffusion: f64,
    /// Standard deviation of the per-axis localization noise.
    pub localization_error: f64,
    /// 2 or 3.
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_points: 200,
            dt: 1e-3,
            diffusion: 1e-12,
            localization_error: 5e-9,
            dimensions: 2,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        if self.n_points < 2 {
            return Err(AnalysisError::InvalidConfig("Simulation needs at least 2 points.".to_string()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!("dt must be > 0, got {}.", self.dt)));
        }
        if !(self.diffusion.is_finite() && self.diffusion >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Diffusion coefficient must be >= 0, got {}.",
                self.diffusion
            )));
        }
        if !(self.localization_error.is_finite() && self.localization_error >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Localization error must be >= 0, got {}.",
                self.localization_error
            )));
        }
        if !matches!(self.dimensions, 2 | 3) {
            return Err(AnalysisError::InvalidConfig(format!(
                "Only 2D and 3D tracks are supported, got {} dimensions.",
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Free diffusion.
pub fn simulate_brownian(config: &SimulationConfig) -> Result<Trajectory, AnalysisError> {
    simulate(config, |_| {})
}

/// Diffusion inside a reflecting box `[-half_width, half_width]` on every axis.
pub fn simulate_confined(config: &SimulationConfig, half_width: f64) -> Result<Trajectory, AnalysisError> {
    if !(half_width.is_finite() && half_width > 0.0) {
        return Err(AnalysisError::InvalidConfig(format!(
            "Confinement half-width must be > 0, got {half_width}."
        )));
    }
    simulate(config, |pos| {
        for p in pos.iter_mut() {
            *p = reflect(*p, half_width);
        }
    })
}

/// A particle that never moves; only localization noise remains.
pub fn simulate_immobile(config: &SimulationConfig) -> Result<Trajectory, AnalysisError> {
    simulate(
        &SimulationConfig {
            diffusion: 0.0,
            ..config.clone()
        },
        |_| {},
    )
}

fn simulate<F>(config: &SimulationConfig, constrain: F) -> Result<Trajectory, AnalysisError>
where
    F: Fn(&mut [f64]),
{
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let step = Normal::new(0.0, (2.0 * config.diffusion * config.dt).sqrt())
        .map_err(|e| AnalysisError::InvalidConfig(format!("Step distribution error: {e}")))?;
    let noise = Normal::new(0.0, config.localization_error)
        .map_err(|e| AnalysisError::InvalidConfig(format!("Noise distribution error: {e}")))?;

    let d = config.dimensions;
    let mut pos = vec![0.0; d];
    let mut axes: Vec<Vec<f64>> = vec![Vec::with_capacity(config.n_points); d];

    for i in 0..config.n_points {
        if i > 0 {
            for p in pos.iter_mut() {
                *p += step.sample(&mut rng);
            }
            constrain(&mut pos);
        }
        for (axis, &p) in axes.iter_mut().zip(&pos) {
            axis.push(p + noise.sample(&mut rng));
        }
    }

    let t: Vec<f64> = (0..config.n_points).map(|i| i as f64 * config.dt).collect();
    let mut axes = axes.into_iter();
    let (Some(x), Some(y)) = (axes.next(), axes.next()) else {
        return Err(AnalysisError::InvalidConfig("missing spatial axes".to_string()));
    };
    match axes.next() {
        Some(z) => Trajectory::new_3d(x, y, z, t),
        None => Trajectory::new_2d(x, y, t),
    }
}

/// Fold `p` back into `[-w, w]` by mirror reflection at the walls.
fn reflect(p: f64, w: f64) -> f64 {
    let period = 4.0 * w;
    let mut q = (p + w).rem_euclid(period);
    if q > 2.0 * w {
        q = period - q;
    }
    q - w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_track() {
        let config = SimulationConfig::default();
        assert_eq!(simulate_brownian(&config).unwrap(), simulate_brownian(&config).unwrap());

        let other = SimulationConfig { seed: 7, ..config.clone() };
        assert_ne!(simulate_brownian(&config).unwrap(), simulate_brownian(&other).unwrap());
    }

    #[test]
    fn shapes_follow_config() {
        let config = SimulationConfig {
            n_points: 50,
            dimensions: 3,
            ..SimulationConfig::default()
        };
        let traj = simulate_brownian(&config).unwrap();
        assert_eq!(traj.len(), 50);
        assert_eq!(traj.dimensions(), 3);
        assert_eq!(traj.dt().unwrap(), config.dt);
    }

    #[test]
    fn confined_track_stays_near_the_box() {
        let config = SimulationConfig {
            n_points: 2000,
            localization_error: 0.0,
            ..SimulationConfig::default()
        };
        let w = 50e-9;
        let traj = simulate_confined(&config, w).unwrap();
        assert!(traj.x().iter().chain(traj.y()).all(|v| v.abs() <= w + 1e-18));
    }

    #[test]
    fn immobile_track_without_noise_is_constant() {
        let config = SimulationConfig {
            localization_error: 0.0,
            ..SimulationConfig::default()
        };
        let traj = simulate_immobile(&config).unwrap();
        assert!(traj.x().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn reflect_folds_into_box() {
        assert_eq!(reflect(0.5, 1.0), 0.5);
        assert!((reflect(1.25, 1.0) - 0.75).abs() < 1e-15);
        assert!((reflect(-1.5, 1.0) + 0.5).abs() < 1e-15);
    }

    #[test]
    fn rejects_bad_settings() {
        let config = SimulationConfig {
            dimensions: 1,
            ..SimulationConfig::default()
        };
        assert!(matches!(simulate_brownian(&config), Err(AnalysisError::InvalidConfig(_))));
        assert!(simulate_confined(&SimulationConfig::default(), 0.0).is_err());
    }
}
