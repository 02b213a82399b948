//! JSON scenarios: one dataset and one operation to run on it.

use std::path::Path;

use anyhow::{Context, Result};
use geo_types::MultiPoint;
use serde::{Deserialize, Serialize};
use terrasem_algorithms::{
    Interpolated, KernelDensity, KrigingModel, MeaningfulnessEngine, Source, Target,
};
use terrasem_core::backend::Reduction;
use terrasem_core::{
    Diagnostics, Entities, Extent, Field, Lattice, LatticeOrigin, Objects, Observations,
    SupportGeometry,
};

fn yes() -> bool {
    true
}

/// Dataset description.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    Field {
        geometry: SupportGeometry,
        values: Vec<f64>,
        #[serde(default)]
        domain: Option<SupportGeometry>,
        #[serde(default = "yes")]
        cells_are_points: bool,
    },
    Objects {
        geometry: SupportGeometry,
        #[serde(default)]
        marks: Option<Vec<f64>>,
        #[serde(default)]
        window: Option<SupportGeometry>,
    },
    Lattice {
        units: SupportGeometry,
        #[serde(default)]
        values: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSpec {
    Points(MultiPoint<f64>),
    Blocks(SupportGeometry),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationSpec {
    Query {
        points: MultiPoint<f64>,
    },
    Aggregate {
        units: SupportGeometry,
        reduction: Reduction,
    },
    Interpolate {
        target: TargetSpec,
        #[serde(default)]
        model: KrigingModel,
    },
    Density {
        units: SupportGeometry,
        #[serde(default)]
        bandwidth: Option<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub source: SourceSpec,
    pub operation: OperationSpec,
}

/// What a scenario produced.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// `field`, `lattice` or `values`
    pub kind: &'static str,
    pub values: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variances: Option<Vec<f64>>,
    pub diagnostics: Diagnostics,
}

enum Dataset {
    Field(Field),
    Objects(Objects),
    Lattice(Lattice),
}

impl Dataset {
    fn as_source(&self) -> Source<'_> {
        match self {
            Dataset::Field(f) => Source::Field(f),
            Dataset::Objects(o) => Source::Objects(o),
            Dataset::Lattice(l) => Source::Lattice(l),
        }
    }
}

fn finite(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.is_finite().then_some(*v)).collect()
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn build(&self, engine: &MeaningfulnessEngine) -> Result<(Dataset, Diagnostics)> {
        let extent = |g: &Option<SupportGeometry>| -> Result<Option<Extent>> {
            g.as_ref()
                .map(Extent::from_geometry)
                .transpose()
                .context("Invalid window or domain")
        };
        Ok(match &self.source {
            SourceSpec::Field {
                geometry,
                values,
                domain,
                cells_are_points,
            } => {
                let obs = Observations::new(geometry.clone(), values.clone())?;
                let field = Field::with_inference(
                    obs,
                    extent(domain)?,
                    *cells_are_points,
                    engine.config().window_inference,
                )?;
                (Dataset::Field(field), Diagnostics::new())
            }
            SourceSpec::Objects {
                geometry,
                marks,
                window,
            } => {
                let entities = Entities::new(geometry.clone(), marks.clone())?;
                let built = engine.objects(entities, extent(window)?)?;
                (Dataset::Objects(built.value), built.diagnostics)
            }
            SourceSpec::Lattice { units, values } => {
                let lattice = match values {
                    Some(v) => {
                        Lattice::with_values(units.clone(), v.clone(), LatticeOrigin::Supplied)?
                    }
                    None => Lattice::new(units.clone()),
                };
                (Dataset::Lattice(lattice), Diagnostics::new())
            }
        })
    }

    /// Build the dataset and run the operation. Construction diagnostics
    /// come first in the outcome.
    pub fn run(&self, engine: MeaningfulnessEngine) -> Result<Outcome> {
        let (dataset, mut diagnostics) = self.build(&engine)?;
        let source = dataset.as_source();

        let mut outcome = match &self.operation {
            OperationSpec::Query { points } => {
                let out = engine.query(source, points)?;
                Outcome {
                    kind: "values",
                    values: out.value,
                    variances: None,
                    diagnostics: out.diagnostics,
                }
            }
            OperationSpec::Aggregate { units, reduction } => {
                let out = engine.aggregate(source, units, *reduction)?;
                Outcome {
                    kind: "lattice",
                    values: finite(out.value.values().unwrap_or(&[])),
                    variances: None,
                    diagnostics: out.diagnostics,
                }
            }
            OperationSpec::Interpolate { target, model } => {
                let target = match target {
                    TargetSpec::Points(p) => Target::Points(p.clone()),
                    TargetSpec::Blocks(b) => Target::Blocks(b.clone()),
                };
                let out = engine.interpolate(source, &target, model)?;
                let kind = match out.value.result {
                    Interpolated::Field(_) => "field",
                    Interpolated::Lattice(_) => "lattice",
                };
                Outcome {
                    kind,
                    values: finite(out.value.values()),
                    variances: Some(out.value.variances),
                    diagnostics: out.diagnostics,
                }
            }
            OperationSpec::Density { units, bandwidth } => {
                let Dataset::Objects(objects) = &dataset else {
                    anyhow::bail!("density needs an objects source");
                };
                let discretization = engine.config().block_discretization;
                let engine = engine.with_density_estimator(KernelDensity {
                    bandwidth: *bandwidth,
                    discretization,
                });
                let lattice = engine.density(objects, units)?;
                Outcome {
                    kind: "lattice",
                    values: finite(lattice.values().unwrap_or(&[])),
                    variances: None,
                    diagnostics: Diagnostics::new(),
                }
            }
        };

        diagnostics.extend(outcome.diagnostics);
        outcome.diagnostics = diagnostics;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrasem_core::{DiagnosticCode, EngineConfig, Error, WindowOverrun};

    const OBJECTS_SUM: &str = include_str!("../scenarios/objects_sum.json");
    const LATTICE_QUERY: &str = include_str!("../scenarios/lattice_query.json");

    #[test]
    fn test_objects_sum_scenario() {
        let scenario = Scenario::from_json_str(OBJECTS_SUM).unwrap();
        let outcome = scenario.run(MeaningfulnessEngine::default()).unwrap();
        assert_eq!(outcome.kind, "lattice");
        assert_eq!(outcome.values, vec![Some(5.0)]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_lattice_query_scenario_warns() {
        let scenario = Scenario::from_json_str(LATTICE_QUERY).unwrap();
        let outcome = scenario.run(MeaningfulnessEngine::default()).unwrap();
        assert_eq!(outcome.values, vec![Some(12.5), None]);
        assert_eq!(outcome.diagnostics.codes(), vec![DiagnosticCode::AggregateQueriedAtPoint]);
    }

    #[test]
    fn test_refusal_propagates() {
        let json = r#"{
            "source": {
                "type": "objects",
                "geometry": { "points": [{ "x": 1.0, "y": 1.0 }] },
                "window": { "grid": { "rows": 1, "cols": 1, "transform": {
                    "origin_x": 0.0, "origin_y": 2.0, "pixel_width": 2.0, "pixel_height": -2.0 } } }
            },
            "operation": {
                "op": "aggregate",
                "reduction": "count",
                "units": { "grid": { "rows": 1, "cols": 1, "transform": {
                    "origin_x": 0.0, "origin_y": 4.0, "pixel_width": 4.0, "pixel_height": -4.0 } } }
            }
        }"#;
        let scenario = Scenario::from_json_str(json).unwrap();
        let err = scenario.run(MeaningfulnessEngine::default()).unwrap_err();
        let core = err.downcast_ref::<Error>().unwrap();
        assert_eq!(core.diagnostic_code(), Some(DiagnosticCode::TargetExceedsWindow));

        let lenient = MeaningfulnessEngine::new(EngineConfig {
            window_overrun: WindowOverrun::Warn,
            ..Default::default()
        })
        .unwrap();
        let outcome = scenario.run(lenient).unwrap();
        assert_eq!(outcome.values, vec![Some(1.0)]);
        assert_eq!(outcome.diagnostics.codes(), vec![DiagnosticCode::TargetExceedsWindow]);
    }

    #[test]
    fn test_invalid_fixed_model_rejected_on_load() {
        let json = r#"{
            "source": {
                "type": "field",
                "geometry": { "points": [{ "x": 0.0, "y": 0.0 }, { "x": 2.0, "y": 2.0 }] },
                "values": [1.0, 3.0]
            },
            "operation": {
                "op": "interpolate",
                "target": { "points": [{ "x": 1.0, "y": 1.0 }] },
                "model": { "fixed": {
                    "model": "exponential", "nugget": 0.0, "sill": 10.0, "range": 0.0 } }
            }
        }"#;
        assert!(Scenario::from_json_str(json).is_err());
        assert!(Scenario::from_json_str(&json.replace("\"range\": 0.0", "\"range\": 6.0")).is_ok());
    }
}
