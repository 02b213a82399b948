//! Reductions of values over aggregation units

pub mod reduce;

pub use reduce::StandardReducer;
