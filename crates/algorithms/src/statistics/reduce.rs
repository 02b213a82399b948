//! Per-unit reductions
//!
//! Values are optionally weighted; with area weights (the share of an
//! area-constant observation inside a unit) `Sum` is the areal integral
//! and `Mean` the area-weighted mean. NaN values and non-positive weights
//! are skipped.

use terrasem_core::backend::{Reducer, Reduction};

/// Reducer implementing every [`Reduction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardReducer;

impl Reducer for StandardReducer {
    fn reduce(&self, values: &[f64], weights: Option<&[f64]>, kind: Reduction) -> Option<f64> {
        let mut pairs: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, weights.map_or(1.0, |w| w.get(i).copied().unwrap_or(0.0))))
            .filter(|(v, w)| v.is_finite() && *w > 0.0)
            .collect();

        // fold from +0.0: an empty `sum()` yields -0.0
        let total_weight = pairs.iter().fold(0.0_f64, |acc, (_, w)| acc + w);
        let weighted_sum = pairs.iter().fold(0.0_f64, |acc, (v, w)| acc + v * w);

        match kind {
            Reduction::Count => Some(pairs.len() as f64),
            Reduction::Sum => Some(weighted_sum),
            _ if pairs.is_empty() => None,
            Reduction::Mean => Some(weighted_sum / total_weight),
            Reduction::Min => pairs.iter().map(|(v, _)| *v).reduce(f64::min),
            Reduction::Max => pairs.iter().map(|(v, _)| *v).reduce(f64::max),
            Reduction::StdDev => {
                let mean = weighted_sum / total_weight;
                let var = pairs.iter().map(|(v, w)| w * (v - mean) * (v - mean)).sum::<f64>()
                    / total_weight;
                Some(var.sqrt())
            }
            Reduction::Median => {
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                Some(weighted_median(&pairs, total_weight))
            }
        }
    }
}

/// Median of sorted `(value, weight)` pairs. When the cumulative weight
/// lands exactly on half the total, the two straddling values are averaged.
fn weighted_median(sorted: &[(f64, f64)], total: f64) -> f64 {
    let half = total / 2.0;
    let eps = total * 1e-12;
    let mut cumulative = 0.0;
    for (i, &(v, w)) in sorted.iter().enumerate() {
        cumulative += w;
        if cumulative >= half - eps {
            return match sorted.get(i + 1) {
                Some(&(next, _)) if (cumulative - half).abs() <= eps => (v + next) / 2.0,
                _ => v,
            };
        }
    }
    sorted.last().map_or(f64::NAN, |p| p.0)
}
