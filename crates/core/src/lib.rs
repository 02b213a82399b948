//! # terrasem core
//!
//! Support-type semantics for spatial data.
//!
//! This crate provides:
//! - `Extent`: validated observation windows and field domains
//! - `Field`, `Objects`, `Lattice`: the three support types
//! - `rules`: the A1–A7 meaningfulness table and its pure classifier
//! - `Diagnostic` / `Assessed`: results paired with their warnings
//! - Backend traits for geometry, prediction, reduction and density

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod raster;
pub mod rules;
pub mod support;

pub use config::{EngineConfig, WindowInference, WindowOverrun};
pub use diagnostics::{Assessed, Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::{Error, Result};
pub use extent::{Extent, Region};
pub use geometry::{GeometryKind, PlanarGeometry, SupportGeometry};
pub use raster::{GeoTransform, GridSpec, Raster};
pub use support::{Entities, Field, Lattice, LatticeOrigin, Objects, Observations, ValueSupport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{
        DensityEstimator, GeometryBackend, Prediction, Predictor, Reducer, Reduction,
        ReductionClass, SamplePoint,
    };
    pub use crate::config::{EngineConfig, WindowInference, WindowOverrun};
    pub use crate::diagnostics::{Assessed, Diagnostic, DiagnosticCode, Diagnostics};
    pub use crate::error::{Error, Result};
    pub use crate::extent::Extent;
    pub use crate::geometry::{PlanarGeometry, SupportGeometry};
    pub use crate::raster::{GeoTransform, GridSpec, Raster};
    pub use crate::rules::{Disposition, Operation, RuleId, SourceKind, TargetKind};
    pub use crate::support::{Entities, Field, Lattice, LatticeOrigin, Objects, Observations};
}
