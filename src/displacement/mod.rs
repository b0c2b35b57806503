//! Squared displacement (SD) and mean squared displacement (MSD) statistics.
//!
//! Both quantities are recomputed on demand from the borrowed trajectory; the
//! only cached value in the crate is the MSD curve held by a `TrackAnalyzer`.

pub mod parallel;

pub use parallel::*;

use crate::domain::{MsdCurve, Trajectory};
use crate::error::AnalysisError;
use crate::math::{mean, standard_error};

/// Minimum trajectory length for an MSD curve (lags `1..=N-3` must be non-empty).
pub const MIN_MSD_POINTS: usize = 4;

/// Squared displacements at `lag`, sorted ascending.
///
/// Pairs `(i, i + lag)` for `i in 0..N-lag-1`, giving `N - lag - 1` values.
pub fn squared_displacements(trajectory: &Trajectory, lag: usize) -> Result<Vec<f64>, AnalysisError> {
    squared_displacements_within(trajectory, lag, trajectory.len())
}

/// Same as [`squared_displacements`] over the first `n` samples only.
fn squared_displacements_within(trajectory: &Trajectory, lag: usize, n: usize) -> Result<Vec<f64>, AnalysisError> {
    if lag == 0 || lag >= n {
        return Err(AnalysisError::InvalidLag { lag, len: n });
    }

    let mut sd: Vec<f64> = (0..n - lag - 1)
        .map(|i| trajectory.squared_distance(i, i + lag))
        .collect();
    sd.sort_by(f64::total_cmp);
    Ok(sd)
}

/// MSD and its standard error for lags `1..=N-3`.
///
/// `max_lag` truncates the trajectory to its first `max_lag` samples (defaults
/// to the full length). Lags are independent, so with `parallel.workers > 1`
/// they are spread over a worker pool; the result is identical either way.
pub fn mean_squared_displacement(
    trajectory: &Trajectory,
    max_lag: Option<usize>,
    parallel: &ParallelConfig,
) -> Result<MsdCurve, AnalysisError> {
    let n = max_lag.unwrap_or(trajectory.len());
    if n > trajectory.len() {
        return Err(AnalysisError::InvalidLag {
            lag: n,
            len: trajectory.len(),
        });
    }
    if n < MIN_MSD_POINTS {
        return Err(AnalysisError::InsufficientData {
            needed: MIN_MSD_POINTS,
            got: n,
        });
    }

    let lags: Vec<usize> = (1..=n - 3).collect();
    let per_lag = parallel_map(parallel, &lags, |&lag| {
        squared_displacements_within(trajectory, lag, n).map(|sd| (mean(&sd), standard_error(&sd)))
    })?;

    let mut msd = Vec::with_capacity(lags.len());
    let mut msd_error = Vec::with_capacity(lags.len());
    for entry in per_lag {
        let (m, e) = entry?;
        msd.push(m);
        msd_error.push(e);
    }

    log::debug!(
        "MSD computed over {} lags (workers={})",
        msd.len(),
        parallel.workers.max(1)
    );

    Ok(MsdCurve {
        max_lag: n,
        msd,
        msd_error,
    })
}
