//! Fit-range selection.
//!
//! Higher lags average over fewer displacement pairs, so only a leading
//! fraction of a curve is fitted. The range is a contiguous prefix, optionally
//! thinned to geometrically spaced points so that densely sampled short lags do
//! not dominate the fit.

use crate::domain::{FitRange, FitRangeConfig, FitWarning};
use crate::error::AnalysisError;

/// Largest recommended share of a curve to fit.
pub const RECOMMENDED_FIT_FRACTION: f64 = 0.25;

/// Pick the points of a curve sampled at ascending `times` to fit.
///
/// Precedence: `fit_max_time` (points with `t <= fit_max_time`), then
/// `n_fit_points`, then `floor(fraction_fit_points * N)`. The count is clamped
/// to `N`; fewer than 2 points is an error.
pub fn select_fit_range(
    times: &[f64],
    config: &FitRangeConfig,
) -> Result<(FitRange, Vec<FitWarning>), AnalysisError> {
    let available = times.len();

    let requested = if let Some(max_time) = config.fit_max_time {
        times.iter().take_while(|&&t| t <= max_time).count()
    } else if let Some(n) = config.n_fit_points {
        n
    } else {
        (config.fraction_fit_points * available as f64).floor().max(0.0) as usize
    };
    let n_points = requested.min(available);

    if n_points < 2 {
        return Err(AnalysisError::InsufficientFitPoints { n_points });
    }

    let mut warnings = Vec::new();
    let recommended_max = (RECOMMENDED_FIT_FRACTION * available as f64).floor() as usize;
    if n_points > recommended_max {
        log::warn!(
            "Fitting {n_points} of {available} points (recommended <= {recommended_max}); \
             higher lags carry larger measurement errors."
        );
        warnings.push(FitWarning::ExcessiveFitFraction {
            n_points,
            available,
            recommended_max,
        });
    }

    let indexes = if config.enable_log_sampling {
        log_sampled_indexes(n_points, config.log_sampling_dist)
    } else {
        (0..n_points).collect()
    };

    Ok((FitRange { n_points, indexes }, warnings))
}

/// Zero-based indexes of positions `1, 10^dist, 10^(2·dist), …` (rounded,
/// de-duplicated) within `1..=n`, always ending with position `n`.
pub fn log_sampled_indexes(n: usize, dist: f64) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let mut out: Vec<usize> = vec![0];
    if dist > 0.0 && dist.is_finite() {
        let mut k = 1.0_f64;
        loop {
            let position = 10f64.powf(k * dist).round();
            if position >= n as f64 {
                break;
            }
            let last = out[out.len() - 1] + 1;
            let next_k = if position as usize > last {
                out.push(position as usize - 1);
                k + 1.0
            } else {
                // Skip the exponents that round back onto `last`.
                (((last as f64) + 0.5).log10() / dist).ceil().max(k + 1.0)
            };
            if next_k <= k {
                break;
            }
            k = next_k;
        }
    }
    if out[out.len() - 1] != n - 1 {
        out.push(n - 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64 * 0.1).collect()
    }

    #[test]
    fn default_fraction_is_a_quarter() {
        let (range, warnings) = select_fit_range(&times(40), &FitRangeConfig::default()).unwrap();
        assert_eq!(range.n_points, 10);
        assert_eq!(range.indexes, (0..10).collect::<Vec<_>>());
        assert!(warnings.is_empty());
    }

    #[test]
    fn fraction_above_one_uses_every_point_and_warns() {
        let config = FitRangeConfig {
            fraction_fit_points: 1.1,
            ..FitRangeConfig::default()
        };
        let (range, warnings) = select_fit_range(&times(40), &config).unwrap();
        assert_eq!(range.n_points, 40);
        assert_eq!(
            warnings,
            vec![FitWarning::ExcessiveFitFraction {
                n_points: 40,
                available: 40,
                recommended_max: 10
            }]
        );
    }

    #[test]
    fn max_time_overrides_point_count() {
        let config = FitRangeConfig {
            n_fit_points: Some(3),
            fit_max_time: Some(0.5),
            ..FitRangeConfig::default()
        };
        let (range, _) = select_fit_range(&times(40), &config).unwrap();
        assert_eq!(range.n_points, 5);

        let config = FitRangeConfig {
            n_fit_points: Some(3),
            ..FitRangeConfig::default()
        };
        assert_eq!(select_fit_range(&times(40), &config).unwrap().0.n_points, 3);
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = select_fit_range(&times(7), &FitRangeConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientFitPoints { n_points: 1 });
    }

    #[test]
    fn log_sampling_keeps_first_and_last() {
        let idx = log_sampled_indexes(100, 0.2);
        // Positions 1, 2, 3, 4, 6, 10, 16, 25, 40, 63, 100.
        assert_eq!(idx, vec![0, 1, 2, 3, 5, 9, 15, 24, 39, 62, 99]);
        assert_eq!(log_sampled_indexes(2, 0.2), vec![0, 1]);
        assert_eq!(log_sampled_indexes(1, 0.2), vec![0]);
    }

    #[test]
    fn log_sampling_skips_repeated_positions() {
        // 10^0.05 ≈ 1.12 rounds back to position 1 three times before reaching 2.
        assert_eq!(log_sampled_indexes(6, 0.05), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(log_sampled_indexes(30, 0.5), vec![0, 2, 9, 29]);
    }

    #[test]
    fn tiny_log_sampling_distance_keeps_every_point() {
        let config = FitRangeConfig {
            n_fit_points: Some(10),
            enable_log_sampling: true,
            log_sampling_dist: 1e-12,
            ..FitRangeConfig::default()
        };
        let (range, _) = select_fit_range(&times(40), &config).unwrap();
        assert_eq!(range.indexes, (0..10).collect::<Vec<_>>());

        let idx = log_sampled_indexes(5, 1e-300);
        assert_eq!(idx.first(), Some(&0));
        assert_eq!(idx.last(), Some(&4));
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn log_sampling_applies_inside_the_range() {
        let config = FitRangeConfig {
            n_fit_points: Some(20),
            enable_log_sampling: true,
            ..FitRangeConfig::default()
        };
        let (range, _) = select_fit_range(&times(100), &config).unwrap();
        assert_eq!(range.n_points, 20);
        assert_eq!(range.indexes, vec![0, 1, 2, 3, 5, 9, 15, 19]);
    }
}
