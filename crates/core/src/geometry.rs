//! Observation and unit geometry, and the planar geometry backend

use std::fmt;

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, ConvexHull, Intersects, Relate,
};
use geo_types::{
    Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};

use crate::backend::GeometryBackend;
use crate::config::WindowInference;
use crate::raster::GridSpec;

/// Geometry of a dataset: one feature per observation, entity or unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportGeometry {
    Points(MultiPoint<f64>),
    Lines(MultiLineString<f64>),
    Polygons(MultiPolygon<f64>),
    Grid(GridSpec),
}

/// Shape of the features in a [`SupportGeometry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Grid,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
            GeometryKind::Grid => "grid",
        };
        f.write_str(name)
    }
}

impl SupportGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            SupportGeometry::Points(_) => GeometryKind::Point,
            SupportGeometry::Lines(_) => GeometryKind::Line,
            SupportGeometry::Polygons(_) => GeometryKind::Polygon,
            SupportGeometry::Grid(_) => GeometryKind::Grid,
        }
    }

    /// Number of features (cells for a grid)
    pub fn len(&self) -> usize {
        match self {
            SupportGeometry::Points(mp) => mp.0.len(),
            SupportGeometry::Lines(ml) => ml.0.len(),
            SupportGeometry::Polygons(mp) => mp.0.len(),
            SupportGeometry::Grid(g) => g.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every feature encloses area
    pub fn is_areal(&self) -> bool {
        matches!(self, SupportGeometry::Polygons(_) | SupportGeometry::Grid(_))
    }

    /// Feature `i` as a standalone geometry
    pub fn feature(&self, i: usize) -> Option<Geometry<f64>> {
        match self {
            SupportGeometry::Points(mp) => mp.0.get(i).map(|p| Geometry::Point(*p)),
            SupportGeometry::Lines(ml) => ml.0.get(i).cloned().map(Geometry::LineString),
            SupportGeometry::Polygons(mp) => mp.0.get(i).cloned().map(Geometry::Polygon),
            SupportGeometry::Grid(g) => (i < g.len()).then(|| Geometry::Polygon(g.cell_polygon(i))),
        }
    }

    pub fn features(&self) -> impl Iterator<Item = Geometry<f64>> + '_ {
        (0..self.len()).filter_map(move |i| self.feature(i))
    }

    /// Areal features as polygons; `None` for points and lines
    pub fn polygons(&self) -> Option<Vec<Polygon<f64>>> {
        match self {
            SupportGeometry::Polygons(mp) => Some(mp.0.clone()),
            SupportGeometry::Grid(g) => Some(g.to_polygons().0),
            SupportGeometry::Points(_) | SupportGeometry::Lines(_) => None,
        }
    }

    /// Representative location of each feature: the point itself, the
    /// cell centre, or the centroid of a line or polygon.
    pub fn locations(&self) -> Vec<Point<f64>> {
        match self {
            SupportGeometry::Points(mp) => mp.0.clone(),
            SupportGeometry::Grid(g) => (0..g.len()).map(|i| g.cell_center(i)).collect(),
            SupportGeometry::Lines(ml) => {
                ml.0.iter().map(|l| centroid_or_start(l.centroid(), l)).collect()
            }
            SupportGeometry::Polygons(mp) => mp
                .0
                .iter()
                .map(|p| centroid_or_start(p.centroid(), p.exterior()))
                .collect(),
        }
    }

    /// The whole collection as one geometry
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            SupportGeometry::Points(mp) => Geometry::MultiPoint(mp.clone()),
            SupportGeometry::Lines(ml) => Geometry::MultiLineString(ml.clone()),
            SupportGeometry::Polygons(mp) => Geometry::MultiPolygon(mp.clone()),
            SupportGeometry::Grid(g) => Geometry::Polygon(g.bounds().to_polygon()),
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            SupportGeometry::Grid(g) => (!g.is_empty()).then(|| g.bounds()),
            other => other.to_geometry().bounding_rect(),
        }
    }
}

fn centroid_or_start(centroid: Option<Point<f64>>, line: &LineString<f64>) -> Point<f64> {
    centroid
        .or_else(|| line.0.first().map(|c| Point::from(*c)))
        .unwrap_or_else(|| Point::new(f64::NAN, f64::NAN))
}

/// Planar geometry backend built on the `geo` algorithms.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometry;

impl GeometryBackend for PlanarGeometry {
    fn contains(&self, region: &MultiPolygon<f64>, geometry: &Geometry<f64>) -> bool {
        if region.0.is_empty() {
            return false;
        }
        match geometry {
            Geometry::Point(p) => region.intersects(p),
            Geometry::MultiPoint(mp) => mp.0.iter().all(|p| region.intersects(p)),
            other => {
                // Nothing of `other` (interior or boundary) in the region's exterior.
                Geometry::MultiPolygon(region.clone())
                    .relate(other)
                    .matches("******FF*")
                    .unwrap_or(false)
            }
        }
    }

    fn cell_lookup(&self, grid: &GridSpec, point: &Point<f64>) -> Option<usize> {
        grid.cell_at(point.x(), point.y())
    }

    fn union(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
        polygons.iter().fold(MultiPolygon::new(vec![]), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p.clone()]))
        })
    }

    fn boundary_of(&self, geometry: &Geometry<f64>, strategy: WindowInference) -> Polygon<f64> {
        match strategy {
            WindowInference::ConvexHull => geometry.convex_hull(),
            WindowInference::BoundingBox => geometry
                .bounding_rect()
                .map(|r| r.to_polygon())
                .unwrap_or_else(|| Polygon::new(LineString::new(vec![]), vec![])),
        }
    }

    fn intersection_area(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
        if !a.intersects(b) {
            return 0.0;
        }
        a.intersection(b).unsigned_area()
    }

    fn same_geometry(&self, a: &SupportGeometry, b: &SupportGeometry) -> bool {
        if a == b {
            return true;
        }
        match (a.polygons(), b.polygons()) {
            (Some(pa), Some(pb)) => {
                pa.len() == pb.len()
                    && pa
                        .iter()
                        .zip(&pb)
                        .all(|(x, y)| x.relate(y).is_equal_topo())
            }
            _ => false,
        }
    }
}
