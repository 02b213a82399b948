//! Kernel intensity of a point pattern, integrated over areal units
//!
//! The intensity surface λ(s) = Σ K_h(s − xᵢ) uses the quartic kernel
//! ```text
//! K_h(d) = 3 / (π h²) · (1 − d²/h²)²   for d < h, 0 beyond
//! ```
//! which integrates to one, so λ integrates to the number of entities.
//! A unit's value is the mean of λ over the unit (entities per unit area),
//! approximated on the same lattice used for block prediction.

use std::f64::consts::PI;

use geo_types::Point;
use terrasem_core::backend::DensityEstimator;
use terrasem_core::{Error, Result, SupportGeometry};
use tracing::debug;

use crate::interpolation::discretize;
use crate::maybe_rayon::map_batch;

/// Quartic kernel density estimator.
#[derive(Debug, Clone)]
pub struct KernelDensity {
    /// Kernel radius; estimated from the pattern when `None`
    pub bandwidth: Option<f64>,
    /// Lattice points per unit side
    pub discretization: usize,
}

impl Default for KernelDensity {
    fn default() -> Self {
        Self {
            bandwidth: None,
            discretization: 16,
        }
    }
}

/// Scott-style rule for bivariate data: `sqrt((σx² + σy²)/2) · n^(-1/6)`.
pub fn default_bandwidth(points: &[Point<f64>]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (mx, my) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x() / n, sy + p.y() / n));
    let (vx, vy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| {
        (sx + (p.x() - mx).powi(2) / (n - 1.0), sy + (p.y() - my).powi(2) / (n - 1.0))
    });
    let h = ((vx + vy) / 2.0).sqrt() * n.powf(-1.0 / 6.0);
    (h > 0.0 && h.is_finite()).then_some(h)
}

/// Radius for patterns without spread (a single entity, or coincident
/// ones): a quarter of the side of a square as large as the units' envelope.
pub fn extent_bandwidth(units: &SupportGeometry) -> Option<f64> {
    let rect = units.bounding_rect()?;
    let h = (rect.width() * rect.height()).sqrt() / 4.0;
    (h > 0.0 && h.is_finite()).then_some(h)
}

impl KernelDensity {
    fn intensity(points: &[Point<f64>], h: f64, x: f64, y: f64) -> f64 {
        let h2 = h * h;
        let norm = 3.0 / (PI * h2);
        points
            .iter()
            .map(|p| {
                let d2 = (p.x() - x).powi(2) + (p.y() - y).powi(2);
                if d2 < h2 {
                    let t = 1.0 - d2 / h2;
                    norm * t * t
                } else {
                    0.0
                }
            })
            .sum()
    }
}

impl DensityEstimator for KernelDensity {
    fn estimate(&self, entities: &[Point<f64>], units: &SupportGeometry) -> Result<Vec<f64>> {
        let polygons = units.polygons().ok_or_else(|| Error::UnsupportedSupport {
            operation: "density",
            support: units.kind().to_string(),
        })?;
        if entities.is_empty() {
            return Ok(vec![0.0; polygons.len()]);
        }

        let h = match self.bandwidth {
            Some(h) if h > 0.0 && h.is_finite() => h,
            Some(h) => {
                return Err(Error::InvalidParameter {
                    name: "bandwidth",
                    value: h.to_string(),
                    reason: "must be positive".into(),
                });
            }
            None => default_bandwidth(entities)
                .or_else(|| extent_bandwidth(units))
                .ok_or_else(|| Error::InvalidParameter {
                    name: "bandwidth",
                    value: "auto".into(),
                    reason: "neither the entities nor the units have any spread".into(),
                })?,
        };
        debug!(bandwidth = h, entities = entities.len(), units = polygons.len(), "kernel density");

        map_batch(&polygons, |unit| {
            let support = discretize(unit, self.discretization)?;
            let total: f64 = support
                .iter()
                .map(|&(x, y)| Self::intensity(entities, h, x, y))
                .sum();
            Ok(total / support.len() as f64)
        })
        .into_iter()
        .collect()
    }
}
