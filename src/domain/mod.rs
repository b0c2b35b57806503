//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - validated trajectories and their normalized form (`Trajectory`, `NormalizedTrajectory`)
//! - the model catalog identifiers (`ModelKind`, `ScanContext`, `ModelConfig`)
//! - curves, fit outputs and analysis configuration

pub mod trajectory;
pub mod types;

pub use trajectory::*;
pub use types::*;
