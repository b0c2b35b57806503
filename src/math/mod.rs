//! Numerical building blocks: summary statistics, SVD least squares, the
//! bounded Levenberg–Marquardt driver and density histograms.

pub mod histogram;
pub mod lm;
pub mod ols;
pub mod stats;

pub use histogram::*;
pub use lm::*;
pub use ols::*;
pub use stats::*;
