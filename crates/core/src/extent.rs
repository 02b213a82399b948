//! Observation windows and field domains

use geo::{Area, BoundingRect, Intersects};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::backend::GeometryBackend;
use crate::config::WindowInference;
use crate::error::{Error, Result};
use crate::geometry::{PlanarGeometry, SupportGeometry};
use crate::raster::GridSpec;

/// Closed region an extent covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Polygons(MultiPolygon<f64>),
    Grid(GridSpec),
}

/// A spatial window: the region within which a dataset's coverage or
/// completeness claim holds.
///
/// Extents are validated on construction and never change afterwards.
/// An extent inferred from data rather than declared is marked
/// non-authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    region: Region,
    authoritative: bool,
}

impl Extent {
    /// Extent covering the union of `polygons`.
    pub fn from_polygons(polygons: MultiPolygon<f64>) -> Result<Self> {
        if polygons.0.is_empty() {
            return Err(Error::invalid_geometry("extent has no polygons"));
        }
        for (i, p) in polygons.0.iter().enumerate() {
            validate_polygon(p).map_err(|reason| {
                Error::invalid_geometry(format!("polygon #{i}: {reason}"))
            })?;
        }

        let region = if polygons.0.len() == 1 {
            polygons
        } else {
            PlanarGeometry.union(&polygons.0)
        };

        Ok(Self {
            region: Region::Polygons(region),
            authoritative: true,
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Result<Self> {
        Self::from_polygons(MultiPolygon::new(vec![polygon]))
    }

    /// Extent covering the cell bounds of a grid.
    pub fn from_grid(grid: GridSpec) -> Result<Self> {
        if grid.is_empty() {
            return Err(Error::invalid_geometry(format!(
                "grid of {}x{} cells is empty",
                grid.rows, grid.cols
            )));
        }
        if grid.transform.is_degenerate() {
            return Err(Error::invalid_geometry("grid cells have zero area"));
        }
        Ok(Self {
            region: Region::Grid(grid),
            authoritative: true,
        })
    }

    /// Axis-aligned rectangle
    pub fn from_rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let rect = Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y });
        Self::from_polygon(rect.to_polygon())
    }

    /// Extent enclosing areal geometry: grid bounds, or the union of polygons.
    ///
    /// Points and lines enclose no area; use [`Extent::infer`] for them.
    pub fn from_geometry(geometry: &SupportGeometry) -> Result<Self> {
        match geometry {
            SupportGeometry::Grid(g) => Self::from_grid(*g),
            SupportGeometry::Polygons(mp) => Self::from_polygons(mp.clone()),
            other => Err(Error::invalid_geometry(format!(
                "{} geometry encloses no area",
                other.kind()
            ))),
        }
    }

    /// Implicit extent derived from data.
    ///
    /// Always succeeds for non-empty input. When the inferred outline is
    /// degenerate (a single point, collinear points) a slightly padded
    /// bounding box is used instead.
    pub fn infer(geometry: &SupportGeometry, strategy: WindowInference) -> Result<Self> {
        Self::infer_with(&PlanarGeometry, geometry, strategy)
    }

    pub fn infer_with(
        backend: &dyn GeometryBackend,
        geometry: &SupportGeometry,
        strategy: WindowInference,
    ) -> Result<Self> {
        if geometry.is_empty() {
            return Err(Error::invalid_geometry("cannot infer an extent from empty geometry"));
        }

        let mut extent = match geometry {
            SupportGeometry::Grid(g) => Self::from_grid(*g)?,
            other => {
                let outline = backend.boundary_of(&other.to_geometry(), strategy);
                if validate_polygon(&outline).is_ok() {
                    Self {
                        region: Region::Polygons(MultiPolygon::new(vec![outline])),
                        authoritative: false,
                    }
                } else {
                    let rect = other
                        .bounding_rect()
                        .ok_or_else(|| Error::invalid_geometry("geometry has no coordinates"))?;
                    let padded = padded(rect).to_polygon();
                    Self {
                        region: Region::Polygons(MultiPolygon::new(vec![padded])),
                        authoritative: false,
                    }
                }
            }
        };
        extent.authoritative = false;
        Ok(extent)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// False when the extent was inferred from the data it bounds.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// The covered region as polygons.
    pub fn as_multi_polygon(&self) -> MultiPolygon<f64> {
        match &self.region {
            Region::Polygons(mp) => mp.clone(),
            Region::Grid(g) => MultiPolygon::new(vec![g.bounds().to_polygon()]),
        }
    }

    pub fn area(&self) -> f64 {
        match &self.region {
            Region::Polygons(mp) => mp.unsigned_area(),
            Region::Grid(g) => g.len() as f64 * g.transform.cell_area(),
        }
    }

    pub fn bounds(&self) -> Rect<f64> {
        match &self.region {
            Region::Grid(g) => g.bounds(),
            Region::Polygons(mp) => mp
                .bounding_rect()
                .unwrap_or_else(|| Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 })),
        }
    }

    /// Containment test; the boundary counts as inside.
    pub fn contains(&self, geometry: &Geometry<f64>) -> bool {
        self.contains_with(&PlanarGeometry, geometry)
    }

    pub fn contains_with(&self, backend: &dyn GeometryBackend, geometry: &Geometry<f64>) -> bool {
        backend.contains(&self.as_multi_polygon(), geometry)
    }

    pub fn intersects(&self, geometry: &Geometry<f64>) -> bool {
        self.as_multi_polygon().intersects(geometry)
    }
}

fn padded(rect: Rect<f64>) -> Rect<f64> {
    let span = rect.width().max(rect.height());
    let pad = (span * 1e-6).max(1e-9);
    Rect::new(
        Coord {
            x: rect.min().x - pad,
            y: rect.min().y - pad,
        },
        Coord {
            x: rect.max().x + pad,
            y: rect.max().y + pad,
        },
    )
}

fn validate_polygon(polygon: &Polygon<f64>) -> std::result::Result<(), String> {
    let exterior = polygon.exterior();
    if exterior.0.len() < 4 {
        return Err("exterior ring needs at least 3 distinct vertices".into());
    }
    if exterior.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("non-finite coordinate".into());
    }
    if ring_self_intersects(exterior) {
        return Err("exterior ring self-intersects".into());
    }
    if !(polygon.unsigned_area() > 0.0) {
        return Err("polygon has zero area".into());
    }
    if polygon.interiors().iter().any(ring_self_intersects) {
        return Err("interior ring self-intersects".into());
    }
    Ok(())
}

/// Whether two non-adjacent segments of a closed ring touch.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let segments: Vec<_> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if !adjacent && segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}
