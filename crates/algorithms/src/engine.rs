//! The meaningfulness engine
//!
//! Every operation first classifies itself against the rule table, then
//! either refuses, or forwards to a numeric backend and returns the result
//! together with the diagnostics the classification produced.
//!
//! ```text
//! query / aggregate / interpolate / density
//!        │
//!        ├─ rules::classify(op, source, target, predicates)
//!        │      Refuse  ──────────────▶ Err(Refused)
//!        │      warnings ─ config ────▶ Err(Escalated) when promoted
//!        │
//!        └─ backend (geometry, reducer, predictor, density)
//!               └─▶ Assessed { value, diagnostics }
//! ```

use geo_types::{Geometry, MultiPoint, MultiPolygon, Point, Polygon};
use terrasem_core::backend::{
    DensityEstimator, GeometryBackend, Predictor, Reducer, Reduction, SamplePoint,
};
use terrasem_core::config::WindowOverrun;
use terrasem_core::rules::{self, Effect, Operation, Predicates, SourceKind, TargetKind};
use terrasem_core::support::ValueSupport;
use terrasem_core::{
    Assessed, Diagnostic, DiagnosticCode, Diagnostics, EngineConfig, Entities, Error, Extent, Field,
    Lattice, LatticeOrigin, Objects, Observations, PlanarGeometry, Result, SupportGeometry,
};
use tracing::{debug, warn};

use crate::density::KernelDensity;
use crate::interpolation::OrdinaryKriging;
use crate::maybe_rayon::map_batch;
use crate::statistics::StandardReducer;

/// Dataset an operation reads.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Field(&'a Field),
    Objects(&'a Objects),
    Lattice(&'a Lattice),
}

impl Source<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Field(f) => f.source_kind(),
            Source::Objects(o) => o.source_kind(),
            Source::Lattice(l) => l.source_kind(),
        }
    }
}

impl<'a> From<&'a Field> for Source<'a> {
    fn from(f: &'a Field) -> Self {
        Source::Field(f)
    }
}

impl<'a> From<&'a Objects> for Source<'a> {
    fn from(o: &'a Objects) -> Self {
        Source::Objects(o)
    }
}

impl<'a> From<&'a Lattice> for Source<'a> {
    fn from(l: &'a Lattice) -> Self {
        Source::Lattice(l)
    }
}

/// Support an interpolation predicts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Point support; the result is a `Field`.
    Points(MultiPoint<f64>),
    /// Block support; the result is a `Lattice` of block means.
    Blocks(SupportGeometry),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Points(_) => TargetKind::Points,
            Target::Blocks(_) => TargetKind::Blocks,
        }
    }
}

impl From<&Lattice> for Target {
    fn from(l: &Lattice) -> Self {
        Target::Blocks(l.units().clone())
    }
}

/// Predicted dataset
#[derive(Debug, Clone)]
pub enum Interpolated {
    Field(Field),
    Lattice(Lattice),
}

/// Interpolation result with the estimation variance of every target.
#[derive(Debug, Clone)]
pub struct Interpolation {
    pub result: Interpolated,
    pub variances: Vec<f64>,
}

impl Interpolation {
    /// Predicted values in target order.
    pub fn values(&self) -> &[f64] {
        match &self.result {
            Interpolated::Field(f) => f.observations().values(),
            Interpolated::Lattice(l) => l.values().unwrap_or(&[]),
        }
    }
}

fn areal_units(units: &SupportGeometry, operation: &'static str) -> Result<Vec<Polygon<f64>>> {
    units.polygons().ok_or_else(|| Error::UnsupportedSupport {
        operation,
        support: units.kind().to_string(),
    })
}

/// Support-type aware dispatcher for `query`, `aggregate`, `interpolate`
/// and `density`.
pub struct MeaningfulnessEngine<P: Predictor = OrdinaryKriging> {
    config: EngineConfig,
    predictor: P,
    geometry: Box<dyn GeometryBackend>,
    reducer: Box<dyn Reducer>,
    density: Box<dyn DensityEstimator>,
}

impl MeaningfulnessEngine<OrdinaryKriging> {
    /// Engine with the planar geometry, standard reductions, ordinary
    /// kriging and quartic kernel density.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let predictor = OrdinaryKriging {
            block_discretization: config.block_discretization,
            ..Default::default()
        };
        let density = KernelDensity {
            discretization: config.block_discretization,
            ..Default::default()
        };
        Ok(Self {
            config,
            predictor,
            geometry: Box::new(PlanarGeometry),
            reducer: Box::new(StandardReducer),
            density: Box::new(density),
        })
    }
}

impl Default for MeaningfulnessEngine<OrdinaryKriging> {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            predictor: OrdinaryKriging::default(),
            geometry: Box::new(PlanarGeometry),
            reducer: Box::new(StandardReducer),
            density: Box::new(KernelDensity::default()),
        }
    }
}

impl<P: Predictor> MeaningfulnessEngine<P> {
    pub fn with_predictor<Q: Predictor>(self, predictor: Q) -> MeaningfulnessEngine<Q> {
        MeaningfulnessEngine {
            config: self.config,
            predictor,
            geometry: self.geometry,
            reducer: self.reducer,
            density: self.density,
        }
    }

    pub fn with_geometry_backend(mut self, backend: impl GeometryBackend + 'static) -> Self {
        self.geometry = Box::new(backend);
        self
    }

    pub fn with_reducer(mut self, reducer: impl Reducer + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn with_density_estimator(mut self, estimator: impl DensityEstimator + 'static) -> Self {
        self.density = Box::new(estimator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Build an entity set using the configured window inference; the
    /// `NoWindow` warning is subject to escalation like any other.
    pub fn objects(&self, entities: Entities, window: Option<Extent>) -> Result<Assessed<Objects>> {
        let Assessed { value, diagnostics } =
            Objects::new(entities, window, self.config.window_inference)?;
        let diagnostics = self.config.enforce(diagnostics)?;
        Ok(Assessed::with(value, diagnostics))
    }

    /// Classify, log, and turn the verdict into diagnostics or an error.
    fn decide(
        &self,
        op: Operation,
        source: SourceKind,
        target: TargetKind,
        predicates: &Predicates,
    ) -> Result<Diagnostics> {
        let mut verdict = rules::classify(op, source, target, predicates);
        if self.config.window_overrun == WindowOverrun::Warn {
            verdict = verdict.soften(DiagnosticCode::TargetExceedsWindow);
        }
        debug!(
            operation = %op,
            source = %source,
            target = ?target,
            disposition = ?verdict.disposition,
            "classified"
        );

        let message = |code: DiagnosticCode| {
            format!("{op} of {source}: {}", rules::rule(code.rule()).summary)
        };

        if let Some(refusal) = verdict.refusal() {
            let diagnostic = Diagnostic::error(refusal.code, message(refusal.code));
            warn!(code = %refusal.code, rule = %refusal.rule, "refused: {}", diagnostic.message);
            return Err(Error::Refused(diagnostic));
        }

        let mut diagnostics = Diagnostics::new();
        for finding in verdict.findings.iter().filter(|f| f.effect == Effect::Warn) {
            let diagnostic = Diagnostic::warning(finding.code, message(finding.code));
            warn!(code = %finding.code, rule = %finding.rule, "{}", diagnostic.message);
            diagnostics.push(diagnostic);
        }
        self.config.enforce(diagnostics)
    }

    fn covers(&self, region: &MultiPolygon<f64>, geometry: &Geometry<f64>) -> bool {
        self.geometry.contains(region, geometry)
    }

    /// Evaluate `source` at each point.
    ///
    /// Points where the source defines no value yield `None`.
    pub fn query<'a>(
        &self,
        source: impl Into<Source<'a>>,
        points: &MultiPoint<f64>,
    ) -> Result<Assessed<Vec<Option<f64>>>> {
        let source = source.into();
        let diagnostics = self.decide(
            Operation::Query,
            source.kind(),
            TargetKind::Points,
            &Predicates::default(),
        )?;

        let tol = self.config.coincidence_tolerance;
        let backend = self.geometry.as_ref();
        let values = map_batch(&points.0, |p| match source {
            Source::Field(f) => f.value_at(backend, p, tol),
            Source::Objects(o) => o.mark_at(backend, p, tol),
            Source::Lattice(l) => l
                .unit_at(backend, p, tol)
                .and_then(|i| l.value(i))
                .filter(|v| v.is_finite()),
        });
        Ok(Assessed::with(values, diagnostics))
    }

    /// Reduce the source over each of `units`.
    pub fn aggregate<'a>(
        &self,
        source: impl Into<Source<'a>>,
        units: &SupportGeometry,
        reduction: Reduction,
    ) -> Result<Assessed<Lattice>> {
        let mut predicates = Predicates {
            reduction: Some(reduction.class()),
            ..Default::default()
        };

        let (diagnostics, values) = match source.into() {
            Source::Lattice(lattice) => return self.relabel(lattice, units, predicates),
            Source::Field(field) => {
                let polygons = areal_units(units, "aggregate")?;
                let diagnostics = self.decide(
                    Operation::Aggregate,
                    field.source_kind(),
                    TargetKind::Units,
                    &predicates,
                )?;
                (diagnostics, self.reduce_field(field, units, &polygons, reduction))
            }
            Source::Objects(objects) => {
                let polygons = areal_units(units, "aggregate")?;
                let window = objects.window();
                predicates.target_within_extent =
                    self.covers(&window.as_multi_polygon(), &units.to_geometry());
                predicates.window_authoritative = window.is_authoritative();
                let diagnostics = self.decide(
                    Operation::Aggregate,
                    SourceKind::Objects,
                    TargetKind::Units,
                    &predicates,
                )?;
                (diagnostics, self.reduce_objects(objects, units, &polygons, reduction))
            }
        };
        let lattice =
            Lattice::with_values(units.clone(), values, LatticeOrigin::Reduced(reduction))?;
        Ok(Assessed::with(lattice, diagnostics))
    }

    /// Lattice onto lattice: allowed only onto identical units, where the
    /// values and their origin carry over unchanged whatever the reduction.
    fn relabel(
        &self,
        lattice: &Lattice,
        units: &SupportGeometry,
        mut predicates: Predicates,
    ) -> Result<Assessed<Lattice>> {
        predicates.same_units = self.geometry.same_geometry(lattice.units(), units);
        let diagnostics = self.decide(
            Operation::Aggregate,
            SourceKind::Lattice,
            TargetKind::Units,
            &predicates,
        )?;
        let relabeled = match lattice.values() {
            Some(vals) => Lattice::with_values(units.clone(), vals.to_vec(), lattice.origin())?,
            None => Lattice::new(units.clone()),
        };
        Ok(Assessed::with(relabeled, diagnostics))
    }

    /// Indices of the units a location belongs to. Grid cells partition the
    /// plane, so a location falls in at most one cell; other units may
    /// overlap and each covering unit receives it.
    fn assign(
        &self,
        units: &SupportGeometry,
        regions: &[MultiPolygon<f64>],
        p: &Point<f64>,
    ) -> Vec<usize> {
        match units {
            SupportGeometry::Grid(g) => self.geometry.cell_lookup(g, p).into_iter().collect(),
            _ => regions
                .iter()
                .enumerate()
                .filter(|(_, r)| self.covers(r, &Geometry::Point(*p)))
                .map(|(i, _)| i)
                .collect(),
        }
    }

    fn regions(polygons: &[Polygon<f64>]) -> Vec<MultiPolygon<f64>> {
        polygons.iter().map(|p| MultiPolygon::new(vec![p.clone()])).collect()
    }

    /// Values assigned to each unit by location, then reduced.
    fn reduce_by_location(
        &self,
        units: &SupportGeometry,
        polygons: &[Polygon<f64>],
        located: impl Iterator<Item = (Point<f64>, f64)>,
        reduction: Reduction,
    ) -> Vec<f64> {
        let regions = Self::regions(polygons);
        let mut per_unit: Vec<Vec<f64>> = vec![Vec::new(); polygons.len()];
        for (p, v) in located {
            for i in self.assign(units, &regions, &p) {
                per_unit[i].push(v);
            }
        }
        per_unit
            .iter()
            .map(|vals| self.reducer.reduce(vals, None, reduction).unwrap_or(f64::NAN))
            .collect()
    }

    fn reduce_field(
        &self,
        field: &Field,
        units: &SupportGeometry,
        polygons: &[Polygon<f64>],
        reduction: Reduction,
    ) -> Vec<f64> {
        let obs = field.observations();
        match (field.value_support(), obs.geometry().polygons()) {
            (ValueSupport::AreaConstant, Some(cells)) => {
                // Each observation contributes in proportion to the area it shares with the unit
                let backend = self.geometry.as_ref();
                map_batch(polygons, |unit| {
                    let (values, weights): (Vec<f64>, Vec<f64>) = cells
                        .iter()
                        .zip(obs.values())
                        .map(|(cell, v)| (*v, backend.intersection_area(cell, unit)))
                        .filter(|(_, w)| *w > 0.0)
                        .unzip();
                    self.reducer
                        .reduce(&values, Some(&weights), reduction)
                        .unwrap_or(f64::NAN)
                })
            }
            _ => {
                let located = obs
                    .geometry()
                    .locations()
                    .into_iter()
                    .zip(obs.values().iter().copied());
                self.reduce_by_location(units, polygons, located, reduction)
            }
        }
    }

    fn reduce_objects(
        &self,
        objects: &Objects,
        units: &SupportGeometry,
        polygons: &[Polygon<f64>],
        reduction: Reduction,
    ) -> Vec<f64> {
        let entities = objects.entities();
        let located = entities
            .locations()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, entities.mark(i)));
        self.reduce_by_location(units, polygons, located, reduction)
    }

    /// Predict the source at point or block support.
    pub fn interpolate<'a>(
        &self,
        source: impl Into<Source<'a>>,
        target: &Target,
        model: &P::Model,
    ) -> Result<Assessed<Interpolation>> {
        let source = source.into();
        let blocks = match target {
            Target::Points(_) => None,
            Target::Blocks(units) => Some(areal_units(units, "block interpolation")?),
        };

        let (samples, domain): (Vec<SamplePoint>, Option<&Extent>) = match source {
            Source::Field(f) => (f.samples(), Some(f.domain())),
            Source::Objects(o) => {
                let e = o.entities();
                let samples = e
                    .locations()
                    .iter()
                    .enumerate()
                    .map(|(i, p)| SamplePoint::new(p.x(), p.y(), e.mark(i)))
                    .collect();
                (samples, Some(o.window()))
            }
            Source::Lattice(_) => (Vec::new(), None),
        };

        let target_geometry = match target {
            Target::Points(points) => Geometry::MultiPoint(points.clone()),
            Target::Blocks(units) => units.to_geometry(),
        };
        let within = domain.is_none_or(|d| self.covers(&d.as_multi_polygon(), &target_geometry));
        let predicates = Predicates {
            target_within_extent: within,
            ..Default::default()
        };
        let diagnostics =
            self.decide(Operation::Interpolate, source.kind(), target.kind(), &predicates)?;

        let handle = self.predictor.fit(model, &samples)?;
        let interpolation = match (target, blocks) {
            (Target::Blocks(units), Some(polygons)) => {
                let preds = self.predictor.predict_blocks(&handle, &polygons)?;
                let (values, variances): (Vec<f64>, Vec<f64>) =
                    preds.iter().map(|p| (p.value, p.variance)).unzip();
                let lattice =
                    Lattice::with_values(units.clone(), values, LatticeOrigin::BlockPrediction)?;
                Interpolation {
                    result: Interpolated::Lattice(lattice),
                    variances,
                }
            }
            (Target::Points(points), _) => {
                let preds = self.predictor.predict_points(&handle, &points.0)?;
                let (values, variances): (Vec<f64>, Vec<f64>) =
                    preds.iter().map(|p| (p.value, p.variance)).unzip();
                let obs = Observations::new(SupportGeometry::Points(points.clone()), values)?;
                let field_domain = domain.filter(|_| within).cloned();
                let field =
                    Field::with_inference(obs, field_domain, true, self.config.window_inference)?;
                Interpolation {
                    result: Interpolated::Field(field),
                    variances,
                }
            }
            (Target::Blocks(units), None) => {
                return Err(Error::UnsupportedSupport {
                    operation: "block interpolation",
                    support: units.kind().to_string(),
                });
            }
        };
        Ok(Assessed::with(interpolation, diagnostics))
    }

    /// Entity intensity per unit area over each of `units`.
    ///
    /// Density is a neighbourhood aggregate, so the result is always a
    /// `Lattice`, whatever the resolution of `units`.
    pub fn density(&self, objects: &Objects, units: &SupportGeometry) -> Result<Lattice> {
        self.decide(
            Operation::Density,
            SourceKind::Objects,
            TargetKind::Units,
            &Predicates::default(),
        )?;
        let values = self.density.estimate(&objects.entities().locations(), units)?;
        Lattice::with_values(units.clone(), values, LatticeOrigin::Density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{FittedVariogram, KrigingModel, VariogramModel};
    use approx::assert_relative_eq;
    use terrasem_core::{GeoTransform, GridSpec, Raster, WindowInference};
    use geo_types::polygon;

    fn square(min: f64, max: f64) -> Polygon<f64> {
        geo_types::polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
            (x: min, y: min),
        ]
    }

    fn units(polys: Vec<Polygon<f64>>) -> SupportGeometry {
        SupportGeometry::Polygons(MultiPolygon::new(polys))
    }

    fn model() -> KrigingModel {
        let vg = FittedVariogram::new(VariogramModel::Exponential, 0.0, 10.0, 6.0).unwrap();
        KrigingModel::Fixed(vg)
    }

    fn area_field() -> Field {
        // 2x2 cells of size 1 over [0,2]², values 1 2 / 3 4
        let raster = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        Field::from_raster(&raster, None, false).unwrap()
    }

    #[test]
    fn test_area_field_aggregate_is_area_weighted() {
        let engine = MeaningfulnessEngine::default();
        let field = area_field();
        // Left half of the grid plus a quarter of the top-right cell
        let target = units(vec![geo_types::polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.5), (x: 1.5, y: 1.5),
            (x: 1.5, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        let mean = engine.aggregate(&field, &target, Reduction::Mean).unwrap();
        assert!(mean.is_clean());
        // (1·1 + 3·1 + 2·0.25) / 2.25
        assert_relative_eq!(mean.value.value(0).unwrap(), 4.5 / 2.25, epsilon = 1e-9);

        let sum = engine.aggregate(&field, &target, Reduction::Sum).unwrap();
        assert_relative_eq!(sum.value.value(0).unwrap(), 4.5, epsilon = 1e-9);
        assert_eq!(sum.value.origin(), LatticeOrigin::Reduced(Reduction::Sum));
    }

    #[test]
    fn test_point_field_aggregate_counts_samples_once() {
        let engine = MeaningfulnessEngine::default();
        let raster = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let field = Field::from_raster(&raster, None, true).unwrap();
        let grid =
            SupportGeometry::Grid(GridSpec::new(1, 2, GeoTransform::new(0.0, 2.0, 1.0, -2.0)));
        let out = engine.aggregate(&field, &grid, Reduction::Mean).unwrap();
        assert_eq!(out.value.values(), Some(&[2.0, 3.0][..]));
    }

    #[test]
    fn test_overlapping_units_each_receive_shared_values() {
        let engine = MeaningfulnessEngine::default();
        let obs = Observations::new(
            SupportGeometry::Points(MultiPoint::from(vec![(0.5, 0.5), (1.5, 1.5)])),
            vec![3.0, 4.0],
        )
        .unwrap();
        let domain = Extent::from_rect(0.0, 0.0, 2.0, 2.0).unwrap();
        let points = Field::new(obs, Some(domain), true).unwrap();
        let nested = units(vec![square(0.0, 2.0), square(1.0, 2.0)]);
        let out = engine.aggregate(&points, &nested, Reduction::Sum).unwrap();
        assert_eq!(out.value.values(), Some(&[7.0, 4.0][..]));
    }

    #[test]
    fn test_line_units_are_unsupported() {
        let engine = MeaningfulnessEngine::default();
        let lines = SupportGeometry::Lines(geo_types::MultiLineString::new(vec![]));
        assert!(matches!(
            engine.aggregate(&area_field(), &lines, Reduction::Mean),
            Err(Error::UnsupportedSupport { .. })
        ));
    }

    #[test]
    fn test_lattice_same_units_relabels() {
        let engine = MeaningfulnessEngine::default();
        let grid = GridSpec::new(1, 2, GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        let lattice = Lattice::with_values(
            SupportGeometry::Grid(grid),
            vec![5.0, 7.0],
            LatticeOrigin::Reduced(Reduction::Sum),
        )
        .unwrap();
        let same = SupportGeometry::Polygons(grid.to_polygons());
        for reduction in [Reduction::Mean, Reduction::Count, Reduction::StdDev, Reduction::Max] {
            let out = engine.aggregate(&lattice, &same, reduction).unwrap();
            assert!(out.is_clean());
            assert_eq!(out.value.values(), Some(&[5.0, 7.0][..]), "{reduction:?}");
            assert_eq!(out.value.origin(), LatticeOrigin::Reduced(Reduction::Sum));
        }

        let coarser = units(vec![square(0.0, 2.0)]);
        let err = engine.aggregate(&lattice, &coarser, Reduction::Mean).unwrap_err();
        assert_eq!(err.diagnostic_code(), Some(DiagnosticCode::CannotReaggregateLattice));
    }

    #[test]
    fn test_objects_query_returns_marks() {
        let engine = MeaningfulnessEngine::default();
        let geom =
            SupportGeometry::Polygons(MultiPolygon::new(vec![square(0.0, 1.0), square(2.0, 3.0)]));
        let entities = Entities::new(geom, Some(vec![10.0, 20.0])).unwrap();
        let window = Extent::from_rect(0.0, 0.0, 3.0, 3.0).unwrap();
        let objects = engine.objects(entities, Some(window)).unwrap().value;
        let q = engine
            .query(&objects, &MultiPoint::from(vec![(0.5, 0.5), (2.5, 2.5), (1.5, 1.5)]))
            .unwrap();
        assert!(q.is_clean());
        assert_eq!(q.value, vec![Some(10.0), Some(20.0), None]);
    }

    #[test]
    fn test_engine_objects_escalates_no_window() {
        let config = EngineConfig {
            escalate: vec![DiagnosticCode::NoWindow],
            window_inference: WindowInference::BoundingBox,
            ..Default::default()
        };
        let engine = MeaningfulnessEngine::new(config).unwrap();
        let err = engine
            .objects(Entities::points(vec![(0.0, 0.0), (1.0, 1.0)]), None)
            .unwrap_err();
        assert!(matches!(err, Error::Escalated(_)));
    }

    #[test]
    fn test_interpolate_from_lattice_is_refused() {
        let engine = MeaningfulnessEngine::default();
        let lattice =
            Lattice::with_values(units(vec![square(0.0, 1.0)]), vec![1.0], LatticeOrigin::Supplied)
                .unwrap();
        let err = engine
            .interpolate(&lattice, &Target::Points(MultiPoint::from(vec![(0.5, 0.5)])), &model())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Refused(ref d) if d.code == DiagnosticCode::CannotReaggregateLattice
        ));
    }

    #[test]
    fn test_interpolate_objects_warns() {
        let engine = MeaningfulnessEngine::default();
        let geom = SupportGeometry::Points(MultiPoint::from(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (0.0, 4.0),
            (4.0, 4.0),
        ]));
        let entities = Entities::new(geom, Some(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let window = Extent::from_rect(0.0, 0.0, 4.0, 4.0).unwrap();
        let objects = Objects::with_window(entities, window).unwrap();
        let out = engine
            .interpolate(&objects, &Target::Points(MultiPoint::from(vec![(2.0, 2.0)])), &model())
            .unwrap();
        assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::InterpolatingEntityPattern]);
        assert_relative_eq!(out.value.values()[0], 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_extrapolation_warns_and_still_predicts() {
        let engine = MeaningfulnessEngine::default();
        let far = Target::Points(MultiPoint::from(vec![(10.0, 10.0)]));
        let out = engine.interpolate(&area_field(), &far, &model()).unwrap();
        assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::ExtrapolationBeyondDomain]);
        assert!(out.value.values()[0].is_finite());
        match &out.value.result {
            Interpolated::Field(f) => assert!(!f.domain().is_authoritative()),
            Interpolated::Lattice(_) => panic!("point target must yield a field"),
        }
    }

    #[test]
    fn test_density_is_lattice() {
        let engine = MeaningfulnessEngine::default();
        let objects = Objects::with_window(
            Entities::points(vec![(1.0, 1.0), (2.0, 2.0), (3.0, 1.0)]),
            Extent::from_rect(0.0, 0.0, 4.0, 4.0).unwrap(),
        )
        .unwrap();
        let grid =
            SupportGeometry::Grid(GridSpec::new(2, 2, GeoTransform::new(0.0, 4.0, 2.0, -2.0)));
        let lattice = engine.density(&objects, &grid).unwrap();
        assert_eq!(lattice.origin(), LatticeOrigin::Density);
        assert_eq!(lattice.len(), 4);
        assert!(lattice.values().unwrap().iter().all(|v| *v >= 0.0));
    }
}
