//! # terrasem algorithms
//!
//! Numeric backends and the meaningfulness engine.
//!
//! ## Modules
//!
//! - **engine**: `MeaningfulnessEngine`, dispatching `query`, `aggregate`,
//!   `interpolate` and `density` through the rule table
//! - **interpolation**: variogram fitting and point/block ordinary kriging
//! - **statistics**: per-unit reductions (mean, sum, count, ...)
//! - **density**: quartic kernel intensity of entity patterns

pub mod density;
pub mod engine;
pub mod interpolation;
pub(crate) mod maybe_rayon;
pub mod statistics;

pub use density::KernelDensity;
pub use engine::{Interpolated, Interpolation, MeaningfulnessEngine, Source, Target};
pub use interpolation::{KrigingModel, OrdinaryKriging};
pub use statistics::StandardReducer;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::density::KernelDensity;
    pub use crate::engine::{Interpolated, Interpolation, MeaningfulnessEngine, Source, Target};
    pub use crate::interpolation::{
        FittedVariogram, KrigingModel, OrdinaryKriging, VariogramModel, VariogramParams,
    };
    pub use crate::statistics::StandardReducer;
    pub use terrasem_core::prelude::*;
}
