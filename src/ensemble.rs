//! Population averages by diffusion category.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, ModelKind, Trajectory};
use crate::error::AnalysisError;

/// Mean curve and population share of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub count: usize,
    /// `count` over the number of classified (non-unknown) tracks.
    pub fraction: f64,
    /// Elementwise mean of the member curves.
    pub mean: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleAverage {
    /// Only categories with at least one member are present.
    pub categories: BTreeMap<ModelKind, CategoryAverage>,
    pub unknown_count: usize,
    pub total: usize,
}

impl EnsembleAverage {
    /// Population share of `kind`; 0 when no track was assigned to it.
    pub fn fraction(&self, kind: ModelKind) -> f64 {
        self.categories.get(&kind).map_or(0.0, |c| c.fraction)
    }

    pub fn mean_curve(&self, kind: ModelKind) -> Option<&[f64]> {
        self.categories.get(&kind).map(|c| c.mean.as_slice())
    }
}

/// Average MSD or Dapp curves per assigned category.
///
/// `trajectories`, `curves` and `categories` are parallel lists. Every
/// classified curve must have the length of the first classified curve;
/// curves of `unknown` tracks are ignored.
pub fn average_by_category<C>(
    trajectories: &[Trajectory],
    curves: &[C],
    categories: &[Category],
) -> Result<EnsembleAverage, AnalysisError>
where
    C: AsRef<[f64]>,
{
    if trajectories.len() != curves.len() || curves.len() != categories.len() {
        return Err(AnalysisError::MismatchedInput(format!(
            "{} trajectories, {} curves and {} categories",
            trajectories.len(),
            curves.len(),
            categories.len()
        )));
    }

    let mut expected: Option<usize> = None;
    let mut sums: BTreeMap<ModelKind, (usize, Vec<f64>)> = BTreeMap::new();
    let mut unknown_count = 0;

    for (index, (curve, category)) in curves.iter().zip(categories).enumerate() {
        let Some(kind) = category.model() else {
            unknown_count += 1;
            continue;
        };
        let curve = curve.as_ref();
        let len = *expected.get_or_insert(curve.len());
        if curve.len() != len {
            return Err(AnalysisError::LengthMismatch {
                index,
                expected: len,
                got: curve.len(),
            });
        }

        let (count, sum) = sums.entry(kind).or_insert_with(|| (0, vec![0.0; len]));
        *count += 1;
        for (acc, v) in sum.iter_mut().zip(curve) {
            *acc += v;
        }
    }

    let classified = categories.len() - unknown_count;
    let categories = sums
        .into_iter()
        .map(|(kind, (count, sum))| {
            let mean = sum.into_iter().map(|v| v / count as f64).collect();
            let average = CategoryAverage {
                count,
                fraction: count as f64 / classified as f64,
                mean,
            };
            (kind, average)
        })
        .collect();

    Ok(EnsembleAverage {
        categories,
        unknown_count,
        total: trajectories.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(n: usize) -> Vec<Trajectory> {
        (0..n)
            .map(|k| {
                let x: Vec<f64> = (0..8).map(|i| (i * k) as f64).collect();
                Trajectory::new_2d(x, vec![0.0; 8], (0..8).map(|i| i as f64).collect()).unwrap()
            })
            .collect()
    }

    #[test]
    fn identical_curves_average_to_themselves() {
        let curve = vec![1.0, 2.5, 4.0];
        let curves = vec![curve.clone(); 3];
        let categories = vec![Category::Classified(ModelKind::Brownian); 3];

        let avg = average_by_category(&tracks(3), &curves, &categories).unwrap();
        assert_eq!(avg.mean_curve(ModelKind::Brownian), Some(curve.as_slice()));
        assert_eq!(avg.fraction(ModelKind::Brownian), 1.0);
        assert_eq!(avg.fraction(ModelKind::Confined), 0.0);
        assert_eq!(avg.fraction(ModelKind::Hop), 0.0);
    }

    #[test]
    fn mixed_population() {
        let curves = vec![vec![1.0, 1.0], vec![3.0, 5.0], vec![9.0, 9.0], vec![0.0]];
        let categories = vec![
            Category::Classified(ModelKind::Brownian),
            Category::Classified(ModelKind::Brownian),
            Category::Classified(ModelKind::Confined),
            Category::Unknown,
        ];

        let avg = average_by_category(&tracks(4), &curves, &categories).unwrap();
        assert_eq!(avg.mean_curve(ModelKind::Brownian), Some([2.0, 3.0].as_slice()));
        assert!((avg.fraction(ModelKind::Brownian) - 2.0 / 3.0).abs() < 1e-15);
        assert!((avg.fraction(ModelKind::Confined) - 1.0 / 3.0).abs() < 1e-15);
        assert_eq!(avg.unknown_count, 1);
        assert_eq!(avg.total, 4);
        assert!(!avg.categories.contains_key(&ModelKind::Hop));
    }

    #[test]
    fn length_mismatch_reports_the_offending_track() {
        let curves = vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];
        let categories = vec![Category::Classified(ModelKind::Hop); 2];
        let err = average_by_category(&tracks(2), &curves, &categories).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::LengthMismatch {
                index: 1,
                expected: 2,
                got: 3
            }
        );
    }

    #[test]
    fn list_lengths_must_agree() {
        let curves = vec![vec![1.0]];
        let err = average_by_category(&tracks(2), &curves, &[Category::Unknown]).unwrap_err();
        assert!(matches!(err, AnalysisError::MismatchedInput(_)));
    }

    #[test]
    fn all_unknown_has_no_categories() {
        let curves = vec![vec![1.0], vec![2.0]];
        let avg = average_by_category(&tracks(2), &curves, &[Category::Unknown; 2]).unwrap();
        assert!(avg.categories.is_empty());
        assert_eq!(avg.unknown_count, 2);
    }
}
