//! Ordinary kriging at point and block support
//!
//! Best Linear Unbiased Estimator for a stationary field. For a target
//! support S (a single point, or the discretization of a block) the
//! weights solve
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₙ) 1] [w₁]   [γ̄(x₁,S)]
//! [   ...     ...    ...    .]  [. ] = [   ...   ]
//! [γ(xₙ,x₁) ... γ(xₙ,xₙ) 1] [wₙ]   [γ̄(xₙ,S)]
//! [  1       ...    1       0] [μ ]   [    1    ]
//! ```
//! where γ̄(xᵢ,S) is the semivariance between sample i and the support,
//! averaged over the support's points. The estimation variance is
//! `Σ wᵢ γ̄(xᵢ,S) + μ − γ̄(S,S)`; for a point γ̄(S,S) = 0.
//!
//! Reference:
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley, §3.2.
//! Journel, A.G. & Huijbregts, C.J. (1978). Mining Geostatistics, §V.

use geo::{BoundingRect, Centroid, Intersects};
use geo_types::{Point, Polygon};
use serde::{Deserialize, Serialize};
use terrasem_core::backend::{Prediction, Predictor, SamplePoint};
use terrasem_core::{Error, Result};
use tracing::debug;

use super::variogram::{empirical_variogram, fit_best_variogram, FittedVariogram, VariogramParams};
use crate::maybe_rayon::map_batch;

/// Variogram used by the predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KrigingModel {
    /// A supplied model, used as-is.
    Fixed(FittedVariogram),
    /// Estimated from the samples: empirical variogram, then the best
    /// fitting model family.
    Auto(VariogramParams),
}

impl Default for KrigingModel {
    fn default() -> Self {
        KrigingModel::Auto(VariogramParams::default())
    }
}

/// Ordinary kriging predictor.
#[derive(Debug, Clone)]
pub struct OrdinaryKriging {
    /// Nearest samples used per target (default 16)
    pub max_points: usize,
    /// Samples farther than this from the target are ignored
    pub max_radius: Option<f64>,
    /// Discretization points per block side (default 8)
    pub block_discretization: usize,
}

impl Default for OrdinaryKriging {
    fn default() -> Self {
        Self {
            max_points: 16,
            max_radius: None,
            block_discretization: 8,
        }
    }
}

/// Samples and the variogram they were fitted with.
#[derive(Debug, Clone)]
pub struct KrigingHandle {
    samples: Vec<SamplePoint>,
    variogram: FittedVariogram,
}

impl KrigingHandle {
    pub fn variogram(&self) -> &FittedVariogram {
        &self.variogram
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }
}

impl Predictor for OrdinaryKriging {
    type Model = KrigingModel;
    type Handle = KrigingHandle;

    fn fit(&self, model: &KrigingModel, samples: &[SamplePoint]) -> Result<KrigingHandle> {
        if samples.len() < 2 {
            return Err(Error::Algorithm(format!(
                "kriging requires at least 2 samples, got {}",
                samples.len()
            )));
        }
        let variogram = match model {
            KrigingModel::Fixed(v) => v.clone(),
            KrigingModel::Auto(params) => {
                let emp = empirical_variogram(samples, params)?;
                fit_best_variogram(&emp)?
            }
        };
        debug!(
            model = ?variogram.model,
            nugget = variogram.nugget,
            sill = variogram.sill,
            range = variogram.range,
            samples = samples.len(),
            "kriging model fitted"
        );
        Ok(KrigingHandle {
            samples: samples.to_vec(),
            variogram,
        })
    }

    fn predict_points(
        &self,
        handle: &KrigingHandle,
        points: &[Point<f64>],
    ) -> Result<Vec<Prediction>> {
        Ok(map_batch(points, |p| self.estimate(handle, &[(p.x(), p.y())])))
    }

    fn predict_blocks(
        &self,
        handle: &KrigingHandle,
        blocks: &[Polygon<f64>],
    ) -> Result<Vec<Prediction>> {
        map_batch(blocks, |b| {
            let support = discretize(b, self.block_discretization)?;
            Ok(self.estimate(handle, &support))
        })
        .into_iter()
        .collect()
    }
}

impl OrdinaryKriging {
    /// Kriging estimate over a support given by one or more points.
    fn estimate(&self, handle: &KrigingHandle, support: &[(f64, f64)]) -> Prediction {
        let samples = &handle.samples;
        let vg = &handle.variogram;
        let m = support.len() as f64;
        let (cx, cy) = support
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x / m, sy + y / m));

        let mut neighbors: Vec<(usize, f64)> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.dist(cx, cy)))
            .filter(|(_, d)| self.max_radius.is_none_or(|r| *d <= r))
            .collect();
        if neighbors.is_empty() {
            return Prediction {
                value: f64::NAN,
                variance: f64::NAN,
            };
        }
        neighbors.sort_by(|a, b| a.1.total_cmp(&b.1));
        neighbors.truncate(self.max_points.max(1));

        if support.len() == 1 && neighbors[0].1 < 1e-12 {
            return Prediction {
                value: samples[neighbors[0].0].value,
                variance: 0.0,
            };
        }

        // Mean semivariance between each neighbour and the support
        let gamma_to_support: Vec<f64> = neighbors
            .iter()
            .map(|&(i, _)| {
                let s = &samples[i];
                support.iter().map(|&(x, y)| vg.evaluate(s.dist(x, y))).sum::<f64>() / m
            })
            .collect();

        let k = neighbors.len();
        let n = k + 1;
        let mut mat = vec![0.0_f64; n * n];
        let mut rhs = vec![0.0_f64; n];
        for (a, &(i, _)) in neighbors.iter().enumerate() {
            let si = &samples[i];
            for (b, &(j, _)) in neighbors.iter().enumerate() {
                if a != b {
                    let sj = &samples[j];
                    mat[a * n + b] = vg.evaluate(si.dist(sj.x, sj.y));
                }
            }
            mat[a * n + k] = 1.0;
            mat[k * n + a] = 1.0;
            rhs[a] = gamma_to_support[a];
        }
        rhs[k] = 1.0;

        match solve_system(n, &mut mat, &mut rhs) {
            Ok(w) => {
                let value = (0..k).map(|a| w[a] * samples[neighbors[a].0].value).sum();
                let within = within_support_semivariance(vg, support);
                let explained = (0..k).map(|a| w[a] * gamma_to_support[a]).sum::<f64>();
                let variance = explained + w[k] - within;
                Prediction {
                    value,
                    variance: variance.max(0.0),
                }
            }
            Err(_) => inverse_distance(samples, &neighbors),
        }
    }
}

/// γ̄(S,S): mean semivariance over all pairs of support points.
fn within_support_semivariance(vg: &FittedVariogram, support: &[(f64, f64)]) -> f64 {
    if support.len() < 2 {
        return 0.0;
    }
    let m = support.len() as f64;
    let total: f64 = support
        .iter()
        .map(|&(x1, y1)| {
            support
                .iter()
                .map(|&(x2, y2)| vg.evaluate(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()))
                .sum::<f64>()
        })
        .sum();
    total / (m * m)
}

/// Fallback when the kriging system is singular; no variance is reported.
fn inverse_distance(samples: &[SamplePoint], neighbors: &[(usize, f64)]) -> Prediction {
    if let Some(&(i, _)) = neighbors.iter().find(|(_, d)| *d < 1e-12) {
        return Prediction {
            value: samples[i].value,
            variance: f64::NAN,
        };
    }
    let (sum_w, sum_wz) = neighbors.iter().fold((0.0, 0.0), |(sw, swz), &(i, d)| {
        let w = 1.0 / (d * d);
        (sw + w, swz + w * samples[i].value)
    });
    Prediction {
        value: sum_wz / sum_w,
        variance: f64::NAN,
    }
}

/// Points of a `d × d` lattice over the block's bounding box that fall in
/// the block; the centroid when none does.
pub fn discretize(block: &Polygon<f64>, d: usize) -> Result<Vec<(f64, f64)>> {
    let rect = block
        .bounding_rect()
        .ok_or_else(|| Error::InvalidGeometry {
            reason: "block has no coordinates".into(),
        })?;
    let d = d.max(1);
    let (dx, dy) = (rect.width() / d as f64, rect.height() / d as f64);
    let mut points = Vec::with_capacity(d * d);
    for r in 0..d {
        for c in 0..d {
            let x = rect.min().x + (c as f64 + 0.5) * dx;
            let y = rect.min().y + (r as f64 + 0.5) * dy;
            if block.intersects(&Point::new(x, y)) {
                points.push((x, y));
            }
        }
    }
    if points.is_empty() {
        let c = block.centroid().ok_or_else(|| Error::InvalidGeometry {
            reason: "block has no centroid".into(),
        })?;
        points.push((c.x(), c.y()));
    }
    Ok(points)
}

/// Solve the dense system `mat · x = rhs` (row-major, n × n) by Gaussian
/// elimination with partial pivoting. `mat` and `rhs` are overwritten.
pub(crate) fn solve_system(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| mat[a * n + col].abs().total_cmp(&mat[b * n + col].abs()))
            .unwrap_or(col);
        if mat[pivot_row * n + col].abs() < 1e-14 {
            return Err(Error::Algorithm("singular kriging system".into()));
        }
        if pivot_row != col {
            for j in 0..n {
                mat.swap(col * n + j, pivot_row * n + j);
            }
            rhs.swap(col, pivot_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let tail: f64 = ((col + 1)..n).map(|j| mat[col * n + j] * x[j]).sum();
        x[col] = (rhs[col] - tail) / mat[col * n + col];
    }
    Ok(x)
}
