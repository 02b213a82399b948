//! The three support types: `Field`, `Objects` and `Lattice`.
//!
//! Each type is built once, validated against its window or domain, and
//! never mutated afterwards. Operations on them (see the engine in
//! `terrasem-algorithms`) produce new values.

use geo::{Distance, Euclidean};
use geo_types::{Geometry, MultiPolygon, Point};
use tracing::warn;

use crate::backend::{GeometryBackend, Reduction, SamplePoint};
use crate::config::WindowInference;
use crate::diagnostics::{Assessed, Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::geometry::{GeometryKind, SupportGeometry};
use crate::raster::Raster;
use crate::rules::SourceKind;

/// Observation geometry with one value per feature.
///
/// NaN values mark features without an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    geometry: SupportGeometry,
    values: Vec<f64>,
}

impl Observations {
    pub fn new(geometry: SupportGeometry, values: Vec<f64>) -> Result<Self> {
        if geometry.is_empty() {
            return Err(Error::invalid_geometry("observations have no features"));
        }
        if values.len() != geometry.len() {
            return Err(Error::SizeMismatch {
                what: "observation values",
                expected: geometry.len(),
                actual: values.len(),
            });
        }
        Ok(Self { geometry, values })
    }

    /// Grid observations taken from a raster, in row-major cell order.
    pub fn from_raster(raster: &Raster) -> Result<Self> {
        Self::new(SupportGeometry::Grid(raster.grid()), raster.values())
    }

    pub fn geometry(&self) -> &SupportGeometry {
        &self.geometry
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Discrete entities, optionally marked with a value each.
#[derive(Debug, Clone, PartialEq)]
pub struct Entities {
    geometry: SupportGeometry,
    marks: Option<Vec<f64>>,
}

impl Entities {
    /// Only point and polygon entities are accepted.
    pub fn new(geometry: SupportGeometry, marks: Option<Vec<f64>>) -> Result<Self> {
        match geometry.kind() {
            GeometryKind::Point | GeometryKind::Polygon => {}
            other => {
                return Err(Error::UnsupportedSupport {
                    operation: "entity construction",
                    support: other.to_string(),
                });
            }
        }
        if let Some(m) = &marks {
            if m.len() != geometry.len() {
                return Err(Error::SizeMismatch {
                    what: "entity marks",
                    expected: geometry.len(),
                    actual: m.len(),
                });
            }
        }
        Ok(Self { geometry, marks })
    }

    /// Unmarked point pattern.
    pub fn points(points: impl Into<geo_types::MultiPoint<f64>>) -> Self {
        Self {
            geometry: SupportGeometry::Points(points.into()),
            marks: None,
        }
    }

    pub fn geometry(&self) -> &SupportGeometry {
        &self.geometry
    }

    /// Mark of entity `i`; an unmarked entity counts as 1.
    pub fn mark(&self, i: usize) -> f64 {
        self.marks.as_ref().map_or(1.0, |m| m[i])
    }

    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Entity locations: the point itself or the polygon centroid.
    pub fn locations(&self) -> Vec<Point<f64>> {
        self.geometry.locations()
    }
}

/// How a field value relates to the geometry it was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSupport {
    /// Valid exactly at the observed location.
    Point,
    /// Constant over the whole cell or polygon.
    AreaConstant,
}

/// A continuous variable defined at every point of its domain.
#[derive(Debug, Clone)]
pub struct Field {
    observations: Observations,
    domain: Extent,
    cells_are_points: bool,
}

impl Field {
    /// Build a field; the domain is inferred from the observations when
    /// omitted.
    ///
    /// `cells_are_points` only matters for grid observations: `true` means
    /// each cell value is a sample at the cell centre, `false` that it fills
    /// the whole cell.
    pub fn new(
        observations: Observations,
        domain: Option<Extent>,
        cells_are_points: bool,
    ) -> Result<Self> {
        Self::with_inference(observations, domain, cells_are_points, WindowInference::default())
    }

    pub fn with_inference(
        observations: Observations,
        domain: Option<Extent>,
        cells_are_points: bool,
        inference: WindowInference,
    ) -> Result<Self> {
        let domain = match domain {
            Some(d) => {
                if !d.intersects(&observations.geometry().to_geometry()) {
                    return Err(Error::invalid_geometry(
                        "observations do not intersect the field domain",
                    ));
                }
                d
            }
            None => Extent::infer(observations.geometry(), inference)?,
        };
        Ok(Self {
            observations,
            domain,
            cells_are_points,
        })
    }

    pub fn from_raster(
        raster: &Raster,
        domain: Option<Extent>,
        cells_are_points: bool,
    ) -> Result<Self> {
        Self::new(Observations::from_raster(raster)?, domain, cells_are_points)
    }

    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    pub fn domain(&self) -> &Extent {
        &self.domain
    }

    pub fn cells_are_points(&self) -> bool {
        self.cells_are_points
    }

    pub fn value_support(&self) -> ValueSupport {
        match self.observations.geometry() {
            SupportGeometry::Points(_) | SupportGeometry::Lines(_) => ValueSupport::Point,
            SupportGeometry::Polygons(_) => ValueSupport::AreaConstant,
            SupportGeometry::Grid(_) if self.cells_are_points => ValueSupport::Point,
            SupportGeometry::Grid(_) => ValueSupport::AreaConstant,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.value_support() {
            ValueSupport::Point => SourceKind::PointField,
            ValueSupport::AreaConstant => SourceKind::AreaField,
        }
    }

    /// Observation locations with their values, NaN observations skipped.
    pub fn samples(&self) -> Vec<SamplePoint> {
        self.observations
            .geometry()
            .locations()
            .iter()
            .zip(self.observations.values())
            .filter(|(_, v)| v.is_finite())
            .map(|(p, v)| SamplePoint::new(p.x(), p.y(), *v))
            .collect()
    }

    /// Value of the field at `point`, if the observations determine one.
    ///
    /// Point-support fields answer only at a sample location (within
    /// `tolerance`); area-constant fields answer anywhere inside an
    /// observed cell or polygon. Nothing is defined outside the domain.
    pub fn value_at(
        &self,
        backend: &dyn GeometryBackend,
        point: &Point<f64>,
        tolerance: f64,
    ) -> Option<f64> {
        if !self.domain.contains_with(backend, &Geometry::Point(*point)) {
            return None;
        }
        let geometry = self.observations.geometry();
        let index = match self.value_support() {
            ValueSupport::Point => coincident_feature(backend, geometry, point, tolerance),
            ValueSupport::AreaConstant => containing_feature(backend, geometry, point),
        }?;
        let value = self.observations.values()[index];
        value.is_finite().then_some(value)
    }
}

/// A set of discrete entities complete within an observation window.
#[derive(Debug, Clone)]
pub struct Objects {
    entities: Entities,
    window: Extent,
}

impl Objects {
    /// Build an entity set.
    ///
    /// With a window, every entity must lie inside it. Without one, an
    /// implicit window is inferred with `inference` and the result carries
    /// a `NoWindow` warning.
    pub fn new(
        entities: Entities,
        window: Option<Extent>,
        inference: WindowInference,
    ) -> Result<Assessed<Self>> {
        match window {
            Some(w) => Self::with_window(entities, w).map(Assessed::clean),
            None => {
                let window = Extent::infer(entities.geometry(), inference)?;
                let message = format!(
                    "no observation window for {} entities; {:?} window inferred, \
                     complete only over the entities' own extent",
                    entities.len(),
                    inference
                );
                warn!(code = %DiagnosticCode::NoWindow, "{message}");
                let mut diagnostics = Diagnostics::new();
                diagnostics.push(Diagnostic::warning(DiagnosticCode::NoWindow, message));
                Ok(Assessed::with(Self { entities, window }, diagnostics))
            }
        }
    }

    /// Build an entity set over a declared window.
    pub fn with_window(entities: Entities, window: Extent) -> Result<Self> {
        let outside: Vec<usize> = entities
            .geometry()
            .features()
            .enumerate()
            .filter(|(_, g)| !window.contains(g))
            .map(|(i, _)| i)
            .collect();
        if !outside.is_empty() {
            return Err(Error::EntitiesOutsideWindow {
                outside,
                total: entities.len(),
            });
        }
        Ok(Self { entities, window })
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn window(&self) -> &Extent {
        &self.window
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::Objects
    }

    /// Mark of the entity at or containing `point`.
    pub fn mark_at(
        &self,
        backend: &dyn GeometryBackend,
        point: &Point<f64>,
        tolerance: f64,
    ) -> Option<f64> {
        let geometry = self.entities.geometry();
        let index = match geometry {
            SupportGeometry::Polygons(_) => containing_feature(backend, geometry, point),
            _ => coincident_feature(backend, geometry, point, tolerance),
        }?;
        Some(self.entities.mark(index))
    }
}

/// Where the values of a lattice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeOrigin {
    /// Supplied by the caller, or no values yet.
    Supplied,
    /// Reduction of a field or entity set.
    Reduced(Reduction),
    /// Entity intensity per unit area.
    Density,
    /// Block-averaged prediction.
    BlockPrediction,
}

/// Areal data: one aggregate value per unit.
///
/// The union of the units is the lattice's domain; there is no separate
/// window.
#[derive(Debug, Clone)]
pub struct Lattice {
    units: SupportGeometry,
    values: Option<Vec<f64>>,
    origin: LatticeOrigin,
}

impl Lattice {
    /// Unvalued lattice over `units`.
    pub fn new(units: SupportGeometry) -> Self {
        Self {
            units,
            values: None,
            origin: LatticeOrigin::Supplied,
        }
    }

    pub fn with_values(
        units: SupportGeometry,
        values: Vec<f64>,
        origin: LatticeOrigin,
    ) -> Result<Self> {
        if values.len() != units.len() {
            return Err(Error::SizeMismatch {
                what: "lattice values",
                expected: units.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            units,
            values: Some(values),
            origin,
        })
    }

    pub fn from_raster(raster: &Raster) -> Self {
        Self {
            units: SupportGeometry::Grid(raster.grid()),
            values: Some(raster.values()),
            origin: LatticeOrigin::Supplied,
        }
    }

    pub fn units(&self) -> &SupportGeometry {
        &self.units
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    pub fn value(&self, unit: usize) -> Option<f64> {
        self.values.as_ref().and_then(|v| v.get(unit).copied())
    }

    pub fn origin(&self) -> LatticeOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::Lattice
    }

    /// Index of the unit holding `point`.
    pub fn unit_at(
        &self,
        backend: &dyn GeometryBackend,
        point: &Point<f64>,
        tolerance: f64,
    ) -> Option<usize> {
        if self.units.is_areal() {
            containing_feature(backend, &self.units, point)
        } else {
            coincident_feature(backend, &self.units, point, tolerance)
        }
    }
}

/// First feature whose location lies within `tolerance` of `point`.
fn coincident_feature(
    backend: &dyn GeometryBackend,
    geometry: &SupportGeometry,
    point: &Point<f64>,
    tolerance: f64,
) -> Option<usize> {
    match geometry {
        SupportGeometry::Grid(g) => backend
            .cell_lookup(g, point)
            .filter(|&i| Euclidean::distance(&g.cell_center(i), point) <= tolerance),
        SupportGeometry::Points(mp) => mp
            .0
            .iter()
            .position(|p| Euclidean::distance(p, point) <= tolerance),
        SupportGeometry::Lines(ml) => ml
            .0
            .iter()
            .position(|l| Euclidean::distance(point, l) <= tolerance),
        SupportGeometry::Polygons(mp) => mp
            .0
            .iter()
            .position(|p| Euclidean::distance(point, p) <= tolerance),
    }
}

/// First areal feature covering `point`.
fn containing_feature(
    backend: &dyn GeometryBackend,
    geometry: &SupportGeometry,
    point: &Point<f64>,
) -> Option<usize> {
    match geometry {
        SupportGeometry::Grid(g) => backend.cell_lookup(g, point),
        SupportGeometry::Polygons(mp) => mp.0.iter().position(|p| {
            backend.contains(&MultiPolygon::new(vec![p.clone()]), &Geometry::Point(*point))
        }),
        _ => None,
    }
}
