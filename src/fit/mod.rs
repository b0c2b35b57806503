//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - choose the fit range (prefix length, optional log thinning)
//! - fit each active model by bounded weighted least squares
//! - select the best model using BIC and report relative likelihoods

pub mod fitter;
pub mod range;
pub mod selection;

pub use fitter::*;
pub use range::*;
pub use selection::*;
