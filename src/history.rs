use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feature_vector::FeatureValue;
use crate::team_features::{TeamMetric, TeamSeasonFeatures};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub half_life: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { half_life: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSummary {
    pub last1: FeatureValue,
    pub expw: FeatureValue,
    pub trend: FeatureValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub history_len: usize,
    pub promoted: bool,
    pub missing_prev: bool,
    pub metrics: BTreeMap<TeamMetric, MetricSummary>,
}

impl HistorySummary {
    pub fn metric(&self, metric: TeamMetric) -> Option<&MetricSummary> {
        self.metrics.get(&metric)
    }
}

pub fn exp_decay_weights(n: usize, half_life: f64) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5_f64.powf(i as f64 / half_life))
        .collect()
}

// Weights are renormalised over the seasons that carry a value.
pub fn exp_weighted(values: &[Option<f64>], half_life: f64) -> Option<f64> {
    let weights = exp_decay_weights(values.len(), half_life);
    let mut num = 0.0;
    let mut den = 0.0;
    for (value, w) in values.iter().zip(weights) {
        if let Some(v) = finite(*value) {
            num += v * w;
            den += w;
        }
    }
    if den > 0.0 { Some(num / den) } else { None }
}

// x is the position in the most-recent-first sequence.
pub fn linear_trend(values: &[Option<f64>]) -> Option<f64> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| finite(*v).map(|v| (i as f64, v)))
        .collect();
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in &points {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
    }
    if sxx <= 0.0 {
        return None;
    }
    Some(sxy / sxx)
}

/// `rows` is most recent first. `promoted` is the negation of `present_in_latest`.
pub fn aggregate_history(
    rows: &[TeamSeasonFeatures],
    metrics: &[TeamMetric],
    present_in_latest: bool,
    cfg: &HistoryConfig,
) -> HistorySummary {
    let mut out = BTreeMap::new();
    for &metric in metrics {
        let seq: Vec<Option<f64>> = rows.iter().map(|r| r.get(metric)).collect();
        let last1 = seq.first().copied().flatten();
        out.insert(
            metric,
            MetricSummary {
                last1: FeatureValue::from_option(finite(last1)),
                expw: FeatureValue::from_option(exp_weighted(&seq, cfg.half_life)),
                trend: linear_trend(&seq)
                    .map(FeatureValue::Present)
                    .unwrap_or(FeatureValue::StructuralZero),
            },
        );
    }

    HistorySummary {
        history_len: rows.len(),
        promoted: !present_in_latest,
        missing_prev: rows.is_empty(),
        metrics: out,
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_halve_each_season() {
        let w = exp_decay_weights(3, 1.0);
        assert_eq!(w, vec![1.0, 0.5, 0.25]);
        let w2 = exp_decay_weights(3, 2.0);
        assert!((w2[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn expw_skips_missing_and_renormalises() {
        let v = exp_weighted(&[Some(10.0), None, Some(4.0)], 1.0).unwrap();
        // weights 1.0 and 0.25 over the present seasons
        assert!((v - (10.0 + 1.0) / 1.25).abs() < 1e-12);
        assert_eq!(exp_weighted(&[None, None], 1.0), None);
        assert_eq!(exp_weighted(&[], 1.0), None);
    }

    #[test]
    fn trend_matches_analytic_slope() {
        // Most recent first: the team improves by 0.5 each season.
        let seq: Vec<Option<f64>> = [3.0, 2.5, 2.0, 1.5, 1.0].into_iter().map(Some).collect();
        let slope = linear_trend(&seq).unwrap();
        assert!((slope + 0.5).abs() < 1e-12);
    }

    #[test]
    fn trend_keeps_sequence_positions_across_gaps() {
        let slope = linear_trend(&[Some(4.0), None, Some(0.0)]).unwrap();
        assert!((slope + 2.0).abs() < 1e-12);
        assert_eq!(linear_trend(&[Some(1.0), None]), None);
    }

    #[test]
    fn non_finite_values_count_as_missing() {
        assert_eq!(exp_weighted(&[Some(f64::NAN)], 1.0), None);
        assert_eq!(linear_trend(&[Some(f64::INFINITY), Some(1.0)]), None);
    }
}
