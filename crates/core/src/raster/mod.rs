//! Regular grid geometry and values

mod geotransform;
mod grid;

pub use geotransform::GeoTransform;
pub use grid::{GridSpec, Raster};
