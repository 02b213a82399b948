//! End-to-end checks of the engine against the support-type rules.

use approx::assert_relative_eq;
use geo_types::{polygon, MultiPoint, MultiPolygon, Point, Polygon};
use terrasem_algorithms::interpolation::{discretize, FittedVariogram, KrigingModel, VariogramModel};
use terrasem_algorithms::{Interpolated, MeaningfulnessEngine, Target};
use terrasem_core::backend::Reduction;
use terrasem_core::{
    DiagnosticCode, EngineConfig, Entities, Error, Extent, Field, GeoTransform, Lattice, Objects,
    Observations, Raster, SupportGeometry, WindowOverrun,
};

fn square(min: f64, max: f64) -> Polygon<f64> {
    polygon![
        (x: min, y: min),
        (x: max, y: min),
        (x: max, y: max),
        (x: min, y: max),
        (x: min, y: min),
    ]
}

fn units(poly: Polygon<f64>) -> SupportGeometry {
    SupportGeometry::Polygons(MultiPolygon::new(vec![poly]))
}

/// Corners and centre of [0,4]²; their convex hull is the square itself.
fn five_entities() -> Entities {
    Entities::points(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (2.0, 2.0)])
}

fn five_objects(engine: &MeaningfulnessEngine) -> Objects {
    let window = Extent::from_polygon(square(0.0, 4.0)).unwrap();
    let built = engine.objects(five_entities(), Some(window)).unwrap();
    assert!(built.is_clean());
    built.value
}

/// 3x3 grid with cell centres on integer coordinates 0..=2.
fn grid_3x3() -> Raster {
    Raster::from_vec((1..=9).map(f64::from).collect(), 3, 3)
        .unwrap()
        .with_transform(GeoTransform::new(-0.5, 2.5, 1.0, -1.0))
}

fn points(coords: &[(f64, f64)]) -> MultiPoint<f64> {
    MultiPoint::from(coords.to_vec())
}

// ─── Window containment ─────────────────────────────────────────────────

#[test]
fn test_entity_outside_window_fails_construction() {
    let engine = MeaningfulnessEngine::default();
    let entities = Entities::points(vec![(1.0, 1.0), (3.0, 3.0), (7.0, 1.0)]);
    let window = Extent::from_rect(0.0, 0.0, 4.0, 4.0).unwrap();

    let err = engine.objects(entities, Some(window)).unwrap_err();
    match err {
        Error::EntitiesOutsideWindow { outside, total } => {
            assert_eq!(outside, vec![2]);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_entities_inside_window_construct_cleanly() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    assert_eq!(objects.len(), 5);
    assert!(objects.window().is_authoritative());
}

#[test]
fn test_missing_window_is_inferred_and_flagged() {
    let engine = MeaningfulnessEngine::default();
    let built = engine.objects(five_entities(), None).unwrap();
    assert_eq!(built.diagnostics.codes(), vec![DiagnosticCode::NoWindow]);
    assert!(!built.value.window().is_authoritative());
    assert_relative_eq!(built.value.window().area(), 16.0, epsilon = 1e-9);
}

// ─── Point/area duality of grids ────────────────────────────────────────

#[test]
fn test_point_grid_answers_only_at_cell_centres() {
    let engine = MeaningfulnessEngine::default();
    let field = Field::from_raster(&grid_3x3(), None, true).unwrap();

    let out = engine
        .query(&field, &points(&[(0.0, 2.0), (0.5, 0.5), (0.5, 2.0), (1.0, 1.0)]))
        .unwrap();
    assert!(out.is_clean());
    assert_eq!(out.value, vec![Some(1.0), None, None, Some(5.0)]);
}

#[test]
fn test_area_grid_answers_anywhere_in_a_cell() {
    let engine = MeaningfulnessEngine::default();
    let field = Field::from_raster(&grid_3x3(), None, false).unwrap();

    let out = engine
        .query(&field, &points(&[(0.0, 2.0), (0.3, 1.8), (0.6, 2.0), (1.9, 0.1), (9.0, 9.0)]))
        .unwrap();
    assert!(out.is_clean());
    assert_eq!(out.value, vec![Some(1.0), Some(1.0), Some(2.0), Some(9.0), None]);
}

// ─── Lattices ───────────────────────────────────────────────────────────

#[test]
fn test_lattice_query_always_warns() {
    let engine = MeaningfulnessEngine::default();
    let coarse = Lattice::from_raster(&grid_3x3());
    let fine = Lattice::from_raster(
        &Raster::filled(30, 30, 2.0).with_transform(GeoTransform::new(-0.5, 2.5, 0.1, -0.1)),
    );

    for lattice in [&coarse, &fine] {
        for p in [(1.0, 1.0), (0.05, 0.05), (50.0, 50.0)] {
            let out = engine.query(lattice, &points(&[p])).unwrap();
            assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::AggregateQueriedAtPoint]);
        }
    }
}

#[test]
fn test_lattice_cannot_be_reaggregated() {
    let engine = MeaningfulnessEngine::default();
    let lattice = Lattice::from_raster(&grid_3x3());
    let err = engine
        .aggregate(&lattice, &units(square(0.0, 1.0)), Reduction::Sum)
        .unwrap_err();
    assert_eq!(err.diagnostic_code(), Some(DiagnosticCode::CannotReaggregateLattice));
}

#[test]
fn test_lattice_onto_its_own_units_keeps_values() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let target = units(square(0.0, 4.0));

    let counted = engine.aggregate(&objects, &target, Reduction::Count).unwrap().value;
    assert_eq!(counted.value(0), Some(5.0));

    for reduction in [Reduction::Count, Reduction::StdDev] {
        let out = engine.aggregate(&counted, &target, reduction).unwrap();
        assert!(out.is_clean());
        assert_eq!(out.value.value(0), Some(5.0), "{reduction:?}");
        assert_eq!(out.value.origin(), counted.origin());
    }
}

// ─── Entity aggregation over the window ─────────────────────────────────

#[test]
fn test_sum_over_window_counts_entities() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);

    let out = engine
        .aggregate(&objects, &units(square(0.0, 4.0)), Reduction::Sum)
        .unwrap();
    assert!(out.is_clean());
    assert_eq!(out.value.value(0), Some(5.0));
}

#[test]
fn test_nested_units_each_count_their_entities() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let nested = SupportGeometry::Polygons(MultiPolygon::new(vec![
        square(0.0, 4.0),
        square(1.0, 3.0),
    ]));

    let out = engine.aggregate(&objects, &nested, Reduction::Sum).unwrap();
    assert!(out.is_clean());
    assert_eq!(out.value.values(), Some(&[5.0, 1.0][..]));
}

#[test]
fn test_sum_over_expanded_window_refused() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    // 50% larger than the window, same centre
    let expanded = units(square(-1.0, 5.0));

    let err = engine.aggregate(&objects, &expanded, Reduction::Sum).unwrap_err();
    assert!(matches!(err, Error::Refused(_)));
    assert_eq!(err.diagnostic_code(), Some(DiagnosticCode::TargetExceedsWindow));

    let err = engine.aggregate(&objects, &expanded, Reduction::Max).unwrap_err();
    assert_eq!(err.diagnostic_code(), Some(DiagnosticCode::TargetExceedsWindow));
}

#[test]
fn test_expanded_window_warns_when_configured() {
    let engine = MeaningfulnessEngine::new(EngineConfig {
        window_overrun: WindowOverrun::Warn,
        ..Default::default()
    })
    .unwrap();
    let objects = five_objects(&engine);

    let out = engine
        .aggregate(&objects, &units(square(-1.0, 5.0)), Reduction::Sum)
        .unwrap();
    assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::TargetExceedsWindow]);
    assert_eq!(out.value.value(0), Some(5.0));
}

#[test]
fn test_mean_of_entities_always_warns() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let target = units(square(0.0, 4.0));

    for reduction in [Reduction::Mean, Reduction::Median, Reduction::StdDev] {
        let out = engine.aggregate(&objects, &target, reduction).unwrap();
        assert!(out.diagnostics.contains(DiagnosticCode::MeanOfCounts), "{reduction:?}");
    }
    for reduction in [Reduction::Sum, Reduction::Count, Reduction::Min, Reduction::Max] {
        let out = engine.aggregate(&objects, &target, reduction).unwrap();
        assert!(!out.diagnostics.contains(DiagnosticCode::MeanOfCounts), "{reduction:?}");
    }
}

#[test]
fn test_mean_warns_even_inside_a_smaller_unit() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let out = engine
        .aggregate(&objects, &units(square(1.0, 3.0)), Reduction::Mean)
        .unwrap();
    assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::MeanOfCounts]);
    assert_eq!(out.value.value(0), Some(1.0));
}

#[test]
fn test_escalated_warning_fails() {
    let config = EngineConfig::from_json_str(r#"{ "escalate": ["MeanOfCounts"] }"#).unwrap();
    let engine = MeaningfulnessEngine::new(config).unwrap();
    let objects = five_objects(&engine);

    let err = engine
        .aggregate(&objects, &units(square(0.0, 4.0)), Reduction::Mean)
        .unwrap_err();
    assert!(matches!(err, Error::Escalated(_)));
    assert_eq!(err.diagnostic_code(), Some(DiagnosticCode::MeanOfCounts));
}

// ─── Support round trip through kriging ─────────────────────────────────

const SAMPLES: [(f64, f64, f64); 10] = [
    (1.1, 1.3, 4.0),
    (3.7, 0.9, 6.5),
    (8.2, 1.7, 9.0),
    (2.3, 4.6, 5.2),
    (5.4, 5.1, 7.7),
    (9.1, 4.4, 11.0),
    (0.8, 8.3, 3.1),
    (4.2, 7.9, 6.0),
    (7.1, 8.8, 8.4),
    (6.3, 2.8, 8.1),
];

fn sample_field() -> Field {
    let coords: Vec<(f64, f64)> = SAMPLES.iter().map(|&(x, y, _)| (x, y)).collect();
    let values = SAMPLES.iter().map(|&(_, _, v)| v).collect();
    let obs = Observations::new(SupportGeometry::Points(points(&coords)), values).unwrap();
    Field::new(obs, Some(Extent::from_rect(0.0, 0.0, 10.0, 10.0).unwrap()), true).unwrap()
}

fn fixed_model() -> KrigingModel {
    KrigingModel::Fixed(FittedVariogram::new(VariogramModel::Exponential, 0.0, 10.0, 6.0).unwrap())
}

#[test]
fn test_point_kriging_reproduces_observations() {
    let engine = MeaningfulnessEngine::new(EngineConfig::default()).unwrap();
    let field = sample_field();
    let coords: Vec<(f64, f64)> = SAMPLES.iter().map(|&(x, y, _)| (x, y)).collect();

    let out = engine
        .interpolate(&field, &Target::Points(points(&coords)), &fixed_model())
        .unwrap();
    assert!(out.is_clean());
    assert!(matches!(out.value.result, Interpolated::Field(_)));
    for (predicted, &(_, _, observed)) in out.value.values().iter().zip(SAMPLES.iter()) {
        assert_relative_eq!(*predicted, observed, epsilon = 1e-9);
    }
    for variance in &out.value.variances {
        assert_relative_eq!(*variance, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_block_prediction_is_mean_of_point_predictions() {
    let engine = MeaningfulnessEngine::new(EngineConfig::default()).unwrap();
    let field = sample_field();
    let block = square(0.0, 10.0);

    let block_out = engine
        .interpolate(&field, &Target::Blocks(units(block.clone())), &fixed_model())
        .unwrap();
    assert!(block_out.is_clean());
    assert!(matches!(block_out.value.result, Interpolated::Lattice(_)));
    let block_value = block_out.value.values()[0];

    let support = discretize(&block, engine.predictor().block_discretization).unwrap();
    let dense: Vec<Point<f64>> = support.iter().map(|&(x, y)| Point::new(x, y)).collect();
    let point_out = engine
        .interpolate(&field, &Target::Points(MultiPoint::new(dense)), &fixed_model())
        .unwrap();
    let predictions = point_out.value.values();
    let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;

    assert_relative_eq!(block_value, mean, epsilon = 1e-6);
    // Averaging over the block removes most of the point-scale uncertainty
    let block_variance = block_out.value.variances[0];
    let mean_point_variance =
        point_out.value.variances.iter().sum::<f64>() / point_out.value.variances.len() as f64;
    assert!(block_variance < mean_point_variance);
}

#[test]
fn test_prediction_outside_domain_warns() {
    let engine = MeaningfulnessEngine::default();
    let out = engine
        .interpolate(&sample_field(), &Target::Points(points(&[(15.0, 5.0)])), &fixed_model())
        .unwrap();
    assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::ExtrapolationBeyondDomain]);
}

#[test]
fn test_entity_pattern_interpolation_warns() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let out = engine
        .interpolate(&objects, &Target::Points(points(&[(1.0, 3.0)])), &fixed_model())
        .unwrap();
    assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::InterpolatingEntityPattern]);
    // Unmarked entities all count as one
    assert_relative_eq!(out.value.values()[0], 1.0, epsilon = 1e-9);
}

// ─── Density ────────────────────────────────────────────────────────────

#[test]
fn test_density_yields_lattice_over_units() {
    let engine = MeaningfulnessEngine::default();
    let objects = five_objects(&engine);
    let grid = Raster::new(4, 4).with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
    let target = SupportGeometry::Grid(grid.grid());

    let lattice = engine.density(&objects, &target).unwrap();
    assert_eq!(lattice.len(), 16);
    let values = lattice.values().unwrap();
    assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(values.iter().any(|v| *v > 0.0));

    // The result is aggregate data: querying it warns
    let out = engine.query(&lattice, &points(&[(2.0, 2.0)])).unwrap();
    assert_eq!(out.diagnostics.codes(), vec![DiagnosticCode::AggregateQueriedAtPoint]);
}

#[test]
fn test_density_of_a_single_entity() {
    let engine = MeaningfulnessEngine::default();
    let window = Extent::from_rect(0.0, 0.0, 2.0, 2.0).unwrap();
    let objects = engine
        .objects(Entities::points(vec![(1.0, 1.0)]), Some(window))
        .unwrap()
        .value;
    let grid = Raster::new(2, 2).with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));

    let lattice = engine.density(&objects, &SupportGeometry::Grid(grid.grid())).unwrap();
    let values = lattice.values().unwrap();
    assert_eq!(values.len(), 4);
    assert!(values.iter().all(|v| v.is_finite() && *v > 0.0));
}
