//! Spatial prediction
//!
//! - Variogram: empirical variogram and model fitting
//! - Ordinary kriging: point and block prediction behind the `Predictor` trait

pub mod kriging;
pub mod variogram;

pub use kriging::{discretize, KrigingHandle, KrigingModel, OrdinaryKriging};
pub use terrasem_core::backend::SamplePoint;
pub use variogram::{
    empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram, FittedVariogram,
    VariogramModel, VariogramParams,
};
