//! `spt-diffusion` library crate.
//!
//! Diffusion analysis of single-particle-tracking trajectories:
//!
//! - squared and mean squared displacements over time lags
//! - bounded weighted nonlinear least-squares fits of a fixed model catalog
//! - BIC model selection with relative likelihoods
//! - per-category ensemble averages
//!
//! The crate is plain library code so that it stays testable without I/O and
//! reusable from notebooks, batch jobs or services.

pub mod analysis;
pub mod displacement;
pub mod domain;
pub mod ensemble;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod report;
pub mod simulation;

pub use analysis::{DappAnalysis, TrackAnalyzer};
pub use domain::{AnalysisConfig, AnalysisResult, Category, ModelKind, Trajectory};
pub use error::AnalysisError;
