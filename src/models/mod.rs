//! Diffusion model catalog and the run-time registry of active models.
//!
//! Models are implemented as small, pure functions so that fitting and
//! selection code can stay generic over `ModelKind`.

pub mod model;
pub mod registry;

pub use model::*;
pub use registry::*;
