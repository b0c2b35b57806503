//! Density histograms and the displacement-magnitude distributions fitted to them.

use std::f64::consts::PI;

/// Equal-width histogram normalized so the bars integrate to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges spanning `[min, max]`.
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
}

impl Histogram {
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }
}

/// Bin `values` into `bins` equal bins over their own range.
///
/// The last bin is closed on the right so the maximum is counted. Returns
/// `None` when there is nothing to bin or the values span zero width.
pub fn density_histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if !(span.is_finite() && span > 0.0) {
        return None;
    }

    let width = span / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let norm = values.len() as f64 * width;
    let edges = (0..=bins)
        .map(|i| if i == bins { max } else { min + i as f64 * width })
        .collect();
    let density = counts.into_iter().map(|c| c as f64 / norm).collect();

    Some(Histogram { edges, density })
}

/// Distribution of 2D displacement magnitudes with per-axis deviation `sigma`.
pub fn rayleigh_pdf(x: f64, sigma: f64) -> f64 {
    let s2 = sigma * sigma;
    x / s2 * (-x * x / (2.0 * s2)).exp()
}

/// Distribution of 3D displacement magnitudes with per-axis deviation `a`.
pub fn maxwell_pdf(x: f64, a: f64) -> f64 {
    let a2 = a * a;
    (2.0 / PI).sqrt() * x * x / (a2 * a) * (-x * x / (2.0 * a2)).exp()
}
