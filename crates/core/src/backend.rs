//! Narrow interfaces to the numeric and geometric collaborators.
//!
//! The support-type layer only decides *whether* an operation may run and
//! on which support; the work itself is delegated through these traits.
//! Every call is a single blocking unit of work with no partial results.

use geo::{Geometry, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::config::WindowInference;
use crate::error::Result;
use crate::geometry::SupportGeometry;
use crate::raster::GridSpec;

/// Containment, lookup and conversion primitives.
pub trait GeometryBackend: Send + Sync {
    /// Whether `geometry` lies inside `region`; the boundary counts as inside.
    fn contains(&self, region: &MultiPolygon<f64>, geometry: &Geometry<f64>) -> bool;

    /// Flat index of the grid cell holding `point`.
    fn cell_lookup(&self, grid: &GridSpec, point: &Point<f64>) -> Option<usize>;

    /// Union of a set of polygons.
    fn union(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64>;

    /// Enclosing polygon of arbitrary geometry, per the inference strategy.
    fn boundary_of(&self, geometry: &Geometry<f64>, strategy: WindowInference) -> Polygon<f64>;

    /// Area shared by two polygons.
    fn intersection_area(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> f64;

    /// Whether two unit sets describe the same features in the same order.
    fn same_geometry(&self, a: &SupportGeometry, b: &SupportGeometry) -> bool;
}

/// Reduction applied to the values falling in a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Mean,
    Sum,
    Count,
    Min,
    Max,
    Median,
    StdDev,
}

/// How a reduction depends on the completeness of what it reduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionClass {
    /// Grows with the amount of data (sum, count).
    Extensive,
    /// Extreme values; changes only when unseen entities are added.
    Extremal,
    /// Per-unit normalized statistics (mean, median, spread).
    Intensive,
}

impl Reduction {
    pub fn class(&self) -> ReductionClass {
        match self {
            Reduction::Sum | Reduction::Count => ReductionClass::Extensive,
            Reduction::Min | Reduction::Max => ReductionClass::Extremal,
            Reduction::Mean | Reduction::Median | Reduction::StdDev => ReductionClass::Intensive,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
            Reduction::Count => "count",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Median => "median",
            Reduction::StdDev => "std_dev",
        }
    }
}

/// Scalar reductions over the values in one unit.
pub trait Reducer: Send + Sync {
    /// `weights`, when given, has the same length as `values`.
    /// Returns `None` when the statistic is undefined (e.g. mean of nothing).
    fn reduce(&self, values: &[f64], weights: Option<&[f64]>, kind: Reduction) -> Option<f64>;
}

/// An observation location with its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// Predicted value and its estimation variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub variance: f64,
}

/// Spatial prediction at point or block support.
pub trait Predictor: Send + Sync {
    /// Model description (variogram, fitting policy, ...).
    type Model;
    /// Fitted state reused across targets.
    type Handle: Send + Sync;

    fn fit(&self, model: &Self::Model, samples: &[SamplePoint]) -> Result<Self::Handle>;

    fn predict_points(
        &self,
        handle: &Self::Handle,
        points: &[Point<f64>],
    ) -> Result<Vec<Prediction>>;

    /// Block-averaged prediction, one per polygon.
    fn predict_blocks(
        &self,
        handle: &Self::Handle,
        blocks: &[Polygon<f64>],
    ) -> Result<Vec<Prediction>>;
}

/// Entity intensity integrated over areal units.
pub trait DensityEstimator: Send + Sync {
    /// One intensity value (entities per unit area) per unit.
    fn estimate(&self, entities: &[Point<f64>], units: &SupportGeometry) -> Result<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_classes() {
        assert_eq!(Reduction::Sum.class(), ReductionClass::Extensive);
        assert_eq!(Reduction::Count.class(), ReductionClass::Extensive);
        assert_eq!(Reduction::Max.class(), ReductionClass::Extremal);
        assert_eq!(Reduction::Mean.class(), ReductionClass::Intensive);
        assert_eq!(Reduction::StdDev.class(), ReductionClass::Intensive);
    }

    #[test]
    fn test_reduction_serde_names() {
        let r: Reduction = serde_json::from_str("\"std_dev\"").unwrap();
        assert_eq!(r, Reduction::StdDev);
        assert_eq!(serde_json::to_string(&Reduction::Sum).unwrap(), "\"sum\"");
    }

    #[test]
    fn test_sample_distance() {
        let p = SamplePoint::new(0.0, 0.0, 1.0);
        assert_eq!(p.dist(3.0, 4.0), 5.0);
        assert_eq!(p.dist_sq(3.0, 4.0), 25.0);
    }
}
