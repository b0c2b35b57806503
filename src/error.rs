//! Error taxonomy for the analysis pipeline.
//!
//! Every fallible operation returns `Result<_, AnalysisError>`. Exit codes
//! follow one scheme so front-ends can map failures to a process status:
//!
//! - `2`: invalid input or configuration
//! - `3`: not enough data to run the requested computation
//! - `4`: numerical / fitting failure

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Invalid lag {lag} for a trajectory of {len} points (must satisfy 1 <= lag < {len})")]
    InvalidLag { lag: usize, len: usize },

    #[error("Insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Insufficient fit points: n_points={n_points} is not enough (need at least 2)")]
    InsufficientFitPoints { n_points: usize },

    #[error("Fit of model '{model}' diverged: {reason}")]
    FitDivergence { model: String, reason: String },

    #[error("Model '{model}' requires R and dt but no model configuration was supplied")]
    UnconfiguredModel { model: String },

    #[error("Model '{0}' is already registered")]
    DuplicateModel(String),

    #[error("Encountered curve with incorrect length for track {index} (got {got}, expected {expected})")]
    LengthMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("Mismatched inputs: {0}")]
    MismatchedInput(String),

    #[error("Invalid trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl AnalysisError {
    /// Process status for front-ends (CLI wrappers, batch runners) built on the library.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::InvalidLag { .. }
            | AnalysisError::DuplicateModel(_)
            | AnalysisError::UnconfiguredModel { .. }
            | AnalysisError::LengthMismatch { .. }
            | AnalysisError::MismatchedInput(_)
            | AnalysisError::InvalidTrajectory(_)
            | AnalysisError::InvalidConfig(_) => 2,
            AnalysisError::InsufficientData { .. } | AnalysisError::InsufficientFitPoints { .. } => 3,
            AnalysisError::FitDivergence { .. } | AnalysisError::ThreadPool(_) => 4,
        }
    }

    pub(crate) fn divergence(model: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::FitDivergence {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that only invalidate a single model fit.
    pub fn is_divergence(&self) -> bool {
        matches!(self, AnalysisError::FitDivergence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_failure_class() {
        assert_eq!(AnalysisError::InvalidLag { lag: 5, len: 5 }.exit_code(), 2);
        assert_eq!(
            AnalysisError::InsufficientData { needed: 4, got: 3 }.exit_code(),
            3
        );
        assert_eq!(AnalysisError::divergence("hop", "budget").exit_code(), 4);
    }

    #[test]
    fn length_mismatch_reports_real_length() {
        let err = AnalysisError::LengthMismatch {
            index: 2,
            expected: 17,
            got: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("got 12"), "{msg}");
        assert!(msg.contains("expected 17"), "{msg}");
    }
}
