//! Variogram estimation and model fitting
//!
//! The semivariance γ(h) measures how dissimilar two observations are as
//! a function of their separation h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   over pairs with |xᵢ-xⱼ| ∈ h±Δh/2
//! ```
//! A fitted model is what the kriging predictor consumes.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::{Deserialize, Serialize};
use terrasem_core::backend::SamplePoint;
use terrasem_core::{Error, Result};

/// Binned semivariances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Lag bin centres
    pub lags: Vec<f64>,
    /// γ(h) per bin, NaN for empty bins
    pub semivariance: Vec<f64>,
    pub pair_counts: Vec<usize>,
}

impl EmpiricalVariogram {
    /// Non-empty bins as `(lag, semivariance, pairs)`.
    fn populated(&self) -> Vec<(f64, f64, usize)> {
        self.lags
            .iter()
            .zip(&self.semivariance)
            .zip(&self.pair_counts)
            .filter(|((_, sv), n)| sv.is_finite() && **n > 0)
            .map(|((&lag, &sv), &n)| (lag, sv, n))
            .collect()
    }
}

/// Theoretical variogram family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c beyond
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
}

impl VariogramModel {
    pub const ALL: [VariogramModel; 3] = [
        VariogramModel::Spherical,
        VariogramModel::Exponential,
        VariogramModel::Gaussian,
    ];
}

/// A variogram model with its parameters.
///
/// Deserialized models go through the same checks as [`FittedVariogram::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariogramFields")]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// c₀, semivariance as h → 0
    pub nugget: f64,
    /// c₀ + c, the plateau
    pub sill: f64,
    /// a, distance at which the plateau is (practically) reached
    pub range: f64,
    /// Weighted residual sum of squares of the fit; 0 for a supplied model
    pub rss: f64,
}

#[derive(Deserialize)]
struct VariogramFields {
    model: VariogramModel,
    nugget: f64,
    sill: f64,
    range: f64,
    #[serde(default)]
    rss: f64,
}

impl TryFrom<VariogramFields> for FittedVariogram {
    type Error = Error;

    fn try_from(f: VariogramFields) -> Result<Self> {
        let mut v = Self::new(f.model, f.nugget, f.sill, f.range)?;
        v.rss = f.rss;
        Ok(v)
    }
}

impl FittedVariogram {
    /// A user-supplied model.
    pub fn new(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> Result<Self> {
        if !(nugget >= 0.0 && nugget.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "nugget",
                value: nugget.to_string(),
                reason: "must be finite and non-negative".into(),
            });
        }
        if !(sill > nugget && sill.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "sill",
                value: sill.to_string(),
                reason: format!("must exceed the nugget ({nugget})"),
            });
        }
        if !(range > 0.0 && range.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "range",
                value: range.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            model,
            nugget,
            sill,
            range,
            rss: 0.0,
        })
    }

    /// c = sill − nugget
    pub fn partial_sill(&self) -> f64 {
        self.sill - self.nugget
    }

    /// γ(h); zero at the origin.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }
        let (c0, c, a) = (self.nugget, self.partial_sill(), self.range);
        match self.model {
            VariogramModel::Spherical if h >= a => c0 + c,
            VariogramModel::Spherical => {
                let r = h / a;
                c0 + c * (1.5 * r - 0.5 * r * r * r)
            }
            VariogramModel::Exponential => c0 + c * (1.0 - (-3.0 * h / a).exp()),
            VariogramModel::Gaussian => c0 + c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
        }
    }

    fn weighted_rss(&self, bins: &[(f64, f64, usize)]) -> f64 {
        bins.iter()
            .map(|&(lag, sv, n)| {
                let r = sv - self.evaluate(lag);
                n as f64 * r * r
            })
            .sum()
    }
}

/// Binning for the empirical variogram
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramParams {
    pub n_lags: usize,
    /// Largest lag considered; half the largest pair distance when `None`
    pub max_lag: Option<f64>,
    /// Accepted distance from a bin centre, as a fraction of the bin width
    pub lag_tolerance: f64,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            max_lag: None,
            lag_tolerance: 1.0,
        }
    }
}

fn max_pair_distance(points: &[SamplePoint]) -> f64 {
    let mut max = 0.0_f64;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            max = max.max(a.dist(b.x, b.y));
        }
    }
    max
}

/// Empirical variogram of `points`.
pub fn empirical_variogram(
    points: &[SamplePoint],
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    if points.len() < 2 {
        return Err(Error::Algorithm("variogram needs at least 2 samples".into()));
    }
    if params.n_lags == 0 {
        return Err(Error::InvalidParameter {
            name: "n_lags",
            value: "0".into(),
            reason: "at least one lag bin is required".into(),
        });
    }

    let max_lag = params
        .max_lag
        .unwrap_or_else(|| max_pair_distance(points) / 2.0);
    if !(max_lag > 0.0) {
        return Err(Error::Algorithm("maximum lag must be positive".into()));
    }

    let n_lags = params.n_lags;
    let width = max_lag / n_lags as f64;
    let half_tol = width * params.lag_tolerance / 2.0;
    let lags: Vec<f64> = (0..n_lags).map(|k| (k as f64 + 0.5) * width).collect();
    let mut sums = vec![0.0_f64; n_lags];
    let mut pair_counts = vec![0_usize; n_lags];

    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            let d = a.dist(b.x, b.y);
            let bin = (d / width - 0.5).round();
            if bin < 0.0 || bin >= n_lags as f64 {
                continue;
            }
            let bin = bin as usize;
            if (d - lags[bin]).abs() <= half_tol {
                let dz = a.value - b.value;
                sums[bin] += dz * dz;
                pair_counts[bin] += 1;
            }
        }
    }

    let semivariance = sums
        .iter()
        .zip(&pair_counts)
        .map(|(&s, &n)| if n > 0 { s / (2.0 * n as f64) } else { f64::NAN })
        .collect();

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
    })
}

/// Fit `model` to an empirical variogram by pair-weighted least squares
/// over a (nugget, sill, range) grid.
pub fn fit_variogram(
    empirical: &EmpiricalVariogram,
    model: VariogramModel,
) -> Result<FittedVariogram> {
    let bins = empirical.populated();
    if bins.len() < 3 {
        return Err(Error::Algorithm(
            "variogram fit needs at least 3 populated lag bins".into(),
        ));
    }

    let max_lag = bins.last().map_or(1.0, |b| b.0);
    let max_sv = bins.iter().map(|b| b.1).fold(0.0_f64, f64::max);
    if max_sv <= 0.0 {
        return Err(Error::Algorithm("all semivariances are zero".into()));
    }

    const NUGGET_STEPS: usize = 10;
    const SILL_STEPS: usize = 10;
    const RANGE_STEPS: usize = 20;

    let mut best: Option<FittedVariogram> = None;
    for i in 0..=NUGGET_STEPS {
        let nugget = max_sv * i as f64 / (2.0 * NUGGET_STEPS as f64);
        for j in 1..=SILL_STEPS {
            let sill = max_sv * j as f64 / SILL_STEPS as f64;
            if sill <= nugget {
                continue;
            }
            for k in 1..=RANGE_STEPS {
                let range = max_lag * 2.0 * k as f64 / RANGE_STEPS as f64;
                let mut trial = FittedVariogram {
                    model,
                    nugget,
                    sill,
                    range,
                    rss: 0.0,
                };
                trial.rss = trial.weighted_rss(&bins);
                if best.as_ref().is_none_or(|b| trial.rss < b.rss) {
                    best = Some(trial);
                }
            }
        }
    }

    best.ok_or_else(|| Error::Algorithm("no admissible variogram parameters".into()))
}

/// Fit every model family and keep the lowest residual.
pub fn fit_best_variogram(empirical: &EmpiricalVariogram) -> Result<FittedVariogram> {
    VariogramModel::ALL
        .iter()
        .filter_map(|&m| fit_variogram(empirical, m).ok())
        .min_by(|a, b| a.rss.total_cmp(&b.rss))
        .ok_or_else(|| Error::Algorithm("could not fit any variogram model".into()))
}
