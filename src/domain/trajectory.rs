//! Trajectory value types.
//!
//! A [`Trajectory`] is validated once at construction and never mutated
//! afterwards; analyses borrow it. Normalization is a pure transform into a
//! separate [`NormalizedTrajectory`] type that remembers the scale it removed.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// An ordered 2D or 3D single-particle track.
///
/// Invariants:
/// - `x`, `y`, optional `z` and `t` share one length (>= 1)
/// - every value is finite
/// - `t` is strictly increasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Option<Vec<f64>>,
    t: Vec<f64>,
}

impl Trajectory {
    /// Build a planar trajectory.
    pub fn new_2d(x: Vec<f64>, y: Vec<f64>, t: Vec<f64>) -> Result<Self, AnalysisError> {
        let traj = Self { x, y, z: None, t };
        traj.validate()?;
        Ok(traj)
    }

    /// Build a trajectory with an axial (`z`) coordinate.
    pub fn new_3d(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, t: Vec<f64>) -> Result<Self, AnalysisError> {
        let traj = Self {
            x,
            y,
            z: Some(z),
            t,
        };
        traj.validate()?;
        Ok(traj)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let n = self.t.len();
        if n == 0 {
            return Err(AnalysisError::InvalidTrajectory("trajectory is empty".to_string()));
        }
        if self.x.len() != n || self.y.len() != n || self.z.as_ref().is_some_and(|z| z.len() != n) {
            return Err(AnalysisError::InvalidTrajectory(format!(
                "coordinate lengths differ (x={}, y={}, z={}, t={n})",
                self.x.len(),
                self.y.len(),
                self.z.as_ref().map_or(0, Vec::len),
            )));
        }

        let mut coords = self
            .x
            .iter()
            .chain(self.y.iter())
            .chain(self.z.iter().flatten())
            .chain(self.t.iter());
        if coords.any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidTrajectory(
                "coordinates and timestamps must be finite".to_string(),
            ));
        }

        if let Some(i) = self.t.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidTrajectory(format!(
                "timestamps must be strictly increasing (t[{}]={} >= t[{}]={})",
                i,
                self.t[i],
                i + 1,
                self.t[i + 1]
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Number of spatial axes (2 or 3).
    pub fn dimensions(&self) -> usize {
        if self.z.is_some() { 3 } else { 2 }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> Option<&[f64]> {
        self.z.as_deref()
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    /// Sampling interval, taken from the first two timestamps.
    pub fn dt(&self) -> Result<f64, AnalysisError> {
        if self.t.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                needed: 2,
                got: self.t.len(),
            });
        }
        Ok(self.t[1] - self.t[0])
    }

    /// Squared Euclidean distance between samples `i` and `j`.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn squared_distance(&self, i: usize, j: usize) -> f64 {
        let dx = self.x[j] - self.x[i];
        let dy = self.y[j] - self.y[i];
        let mut d2 = dx * dx + dy * dy;
        if let Some(z) = &self.z {
            let dz = z[j] - z[i];
            d2 += dz * dz;
        }
        d2
    }

    /// Map positions and time onto `[0, 1]`.
    ///
    /// All spatial axes share one scale (the global min/max over every axis) so
    /// that distances stay isotropic.
    pub fn normalize(&self) -> Result<NormalizedTrajectory, AnalysisError> {
        let (space_min, space_max) = self
            .x
            .iter()
            .chain(self.y.iter())
            .chain(self.z.iter().flatten())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let t_min = self.t[0];
        let t_max = self.t[self.t.len() - 1];

        let space_span = space_max - space_min;
        if space_span <= 0.0 {
            return Err(AnalysisError::InvalidTrajectory(
                "cannot normalize a trajectory with zero spatial extent".to_string(),
            ));
        }
        let t_span = t_max - t_min;
        if t_span <= 0.0 {
            return Err(AnalysisError::InvalidTrajectory(
                "cannot normalize a trajectory with a single timestamp".to_string(),
            ));
        }

        let scale = |v: &Vec<f64>| -> Vec<f64> { v.iter().map(|&p| (p - space_min) / space_span).collect() };
        let trajectory = Trajectory {
            x: scale(&self.x),
            y: scale(&self.y),
            z: self.z.as_ref().map(scale),
            t: self.t.iter().map(|&v| (v - t_min) / t_span).collect(),
        };

        Ok(NormalizedTrajectory {
            trajectory,
            space_min,
            space_max,
            t_min,
            t_max,
        })
    }
}

/// A trajectory rescaled onto the unit square/cube and unit time interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTrajectory {
    trajectory: Trajectory,
    space_min: f64,
    space_max: f64,
    t_min: f64,
    t_max: f64,
}

impl NormalizedTrajectory {
    /// The normalized coordinates, usable by every analysis routine.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn space_range(&self) -> (f64, f64) {
        (self.space_min, self.space_max)
    }

    pub fn time_range(&self) -> (f64, f64) {
        (self.t_min, self.t_max)
    }

    /// Map a normalized position back to original units.
    pub fn denormalize_position(&self, v: f64) -> f64 {
        self.space_min + v * (self.space_max - self.space_min)
    }

    /// Map a normalized timestamp back to original units.
    pub fn denormalize_time(&self, v: f64) -> f64 {
        self.t_min + v * (self.t_max - self.t_min)
    }

    /// Rebuild the original trajectory (up to floating point rounding).
    pub fn denormalize(&self) -> Trajectory {
        let pos = |v: &Vec<f64>| -> Vec<f64> { v.iter().map(|&p| self.denormalize_position(p)).collect() };
        Trajectory {
            x: pos(&self.trajectory.x),
            y: pos(&self.trajectory.y),
            z: self.trajectory.z.as_ref().map(pos),
            t: self.trajectory.t.iter().map(|&v| self.denormalize_time(v)).collect(),
        }
    }
}
