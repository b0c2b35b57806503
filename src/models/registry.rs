//! Run-time set of active models for one scanning context.

use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, ScanContext};
use crate::error::AnalysisError;

/// Models fitted by one analysis session.
///
/// Construct once per session and pass it to the analyses that need it.
/// Iteration always follows catalog order, whatever the insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRegistry {
    context: ScanContext,
    models: Vec<ModelKind>,
}

impl ModelRegistry {
    /// Empty registry for `context`.
    pub fn new(context: ScanContext) -> Self {
        Self {
            context,
            models: Vec::new(),
        }
    }

    /// Brownian, confined and hop: the default ADC / SD candidates.
    pub fn dapp_default() -> Self {
        Self {
            context: ScanContext::Dapp,
            models: vec![ModelKind::Brownian, ModelKind::Confined, ModelKind::Hop],
        }
    }

    /// Linear and power-law MSD.
    pub fn msd_default() -> Self {
        Self {
            context: ScanContext::Msd,
            models: vec![ModelKind::Linear, ModelKind::Power],
        }
    }

    pub fn context(&self) -> ScanContext {
        self.context
    }

    pub fn models(&self) -> &[ModelKind] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, model: ModelKind) -> bool {
        self.models.contains(&model)
    }

    pub fn add(&mut self, model: ModelKind) -> Result<(), AnalysisError> {
        if model.context() != self.context {
            return Err(AnalysisError::InvalidConfig(format!(
                "Model '{model}' cannot be fitted in the {:?} context.",
                self.context
            )));
        }
        match self.models.binary_search(&model) {
            Ok(_) => Err(AnalysisError::DuplicateModel(model.name().to_string())),
            Err(pos) => {
                self.models.insert(pos, model);
                Ok(())
            }
        }
    }

    /// Remove `model`; returns whether it was active.
    pub fn remove(&mut self, model: ModelKind) -> bool {
        match self.models.binary_search(&model) {
            Ok(pos) => {
                self.models.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}
