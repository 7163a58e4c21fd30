use std::collections::HashSet;

use serde::Serialize;

use crate::error::{ImpactError, ImpactResult};
use crate::history::{HistoryConfig, HistorySummary, aggregate_history};
use crate::season::Season;
use crate::team_features::{BASE_METRICS, TRACKED_METRICS, TeamMetric, TeamSeasonFeatures};

/// A feature cell. `StructuralZero` is a defined zero (a trend with too few
/// points to fit) and must not be confused with a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FeatureValue {
    Present(f64),
    Missing,
    StructuralZero,
}

impl FeatureValue {
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => FeatureValue::Present(v),
            _ => FeatureValue::Missing,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            FeatureValue::Present(v) => Some(v),
            FeatureValue::StructuralZero => Some(0.0),
            FeatureValue::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, FeatureValue::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Last1(TeamMetric),
    Expw(TeamMetric),
    Trend(TeamMetric),
    HistoryLen,
    Promoted,
    MissingPrev,
}

impl FeatureColumn {
    pub fn name(self) -> String {
        match self {
            FeatureColumn::Last1(m) => format!("last1_{}", m.name()),
            FeatureColumn::Expw(m) => format!("expw_{}", m.name()),
            FeatureColumn::Trend(m) => format!("trend_{}", m.name()),
            FeatureColumn::HistoryLen => "history_len".to_string(),
            FeatureColumn::Promoted => "promoted".to_string(),
            FeatureColumn::MissingPrev => "missing_prev".to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw {
            "history_len" => return Some(FeatureColumn::HistoryLen),
            "promoted" => return Some(FeatureColumn::Promoted),
            "missing_prev" => return Some(FeatureColumn::MissingPrev),
            _ => {}
        }
        if let Some(rest) = raw.strip_prefix("last1_") {
            return TeamMetric::from_name(rest).map(FeatureColumn::Last1);
        }
        if let Some(rest) = raw.strip_prefix("expw_") {
            return TeamMetric::from_name(rest).map(FeatureColumn::Expw);
        }
        if let Some(rest) = raw.strip_prefix("trend_") {
            return TeamMetric::from_name(rest).map(FeatureColumn::Trend);
        }
        None
    }
}

pub fn default_feature_columns() -> Vec<FeatureColumn> {
    let mut cols = Vec::with_capacity(36);
    cols.extend(BASE_METRICS.iter().map(|&m| FeatureColumn::Last1(m)));
    cols.extend(BASE_METRICS.iter().map(|&m| FeatureColumn::Expw(m)));
    cols.push(FeatureColumn::Last1(TeamMetric::TeamMinutes));
    cols.push(FeatureColumn::Expw(TeamMetric::TeamMinutes));
    cols.push(FeatureColumn::HistoryLen);
    cols.push(FeatureColumn::Promoted);
    cols.push(FeatureColumn::MissingPrev);
    cols.extend(BASE_METRICS.iter().map(|&m| FeatureColumn::Trend(m)));
    cols.push(FeatureColumn::Trend(TeamMetric::TeamMinutes));
    cols
}

pub fn default_schema() -> Vec<String> {
    default_feature_columns().into_iter().map(FeatureColumn::name).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub season: Season,
    pub squad: String,
    pub summary: HistorySummary,
}

impl FeatureVector {
    pub fn new(season: Season, squad: &str, summary: HistorySummary) -> Self {
        Self {
            season,
            squad: squad.trim().to_string(),
            summary,
        }
    }

    pub fn value(&self, column: FeatureColumn) -> FeatureValue {
        let s = &self.summary;
        match column {
            FeatureColumn::HistoryLen => FeatureValue::Present(s.history_len as f64),
            FeatureColumn::Promoted => FeatureValue::Present(flag(s.promoted)),
            FeatureColumn::MissingPrev => FeatureValue::Present(flag(s.missing_prev)),
            FeatureColumn::Last1(m) => s.metric(m).map_or(FeatureValue::Missing, |x| x.last1),
            FeatureColumn::Expw(m) => s.metric(m).map_or(FeatureValue::Missing, |x| x.expw),
            FeatureColumn::Trend(m) => s.metric(m).map_or(FeatureValue::Missing, |x| x.trend),
        }
    }

    pub fn produced_columns(&self) -> Vec<FeatureColumn> {
        let mut cols = vec![
            FeatureColumn::HistoryLen,
            FeatureColumn::Promoted,
            FeatureColumn::MissingPrev,
        ];
        for &m in self.summary.metrics.keys() {
            cols.push(FeatureColumn::Last1(m));
            cols.push(FeatureColumn::Expw(m));
            cols.push(FeatureColumn::Trend(m));
        }
        cols
    }

    // Unknown schema columns become Missing; unnamed produced columns are dropped.
    pub fn to_row(&self, schema: &[String]) -> ImpactResult<FeatureRow> {
        if schema.is_empty() {
            return Err(ImpactError::SchemaMismatch(
                "predictor declares no feature columns".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(schema.len());
        for name in schema {
            if !seen.insert(name.as_str()) {
                return Err(ImpactError::SchemaMismatch(format!(
                    "duplicate column `{name}` in predictor schema"
                )));
            }
        }

        let produced: HashSet<FeatureColumn> = self.produced_columns().into_iter().collect();
        let mut overlap = 0usize;
        let values: Vec<FeatureValue> = schema
            .iter()
            .map(|name| match FeatureColumn::parse(name) {
                Some(col) if produced.contains(&col) => {
                    overlap += 1;
                    self.value(col)
                }
                _ => FeatureValue::Missing,
            })
            .collect();
        if overlap == 0 {
            return Err(ImpactError::SchemaMismatch(
                "predictor schema shares no column with the assembled features".to_string(),
            ));
        }

        Ok(FeatureRow {
            season: self.season,
            squad: self.squad.clone(),
            columns: schema.to_vec(),
            values,
        })
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub season: Season,
    pub squad: String,
    pub columns: Vec<String>,
    pub values: Vec<FeatureValue>,
}

impl FeatureRow {
    pub fn get(&self, column: &str) -> Option<FeatureValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx).copied())
    }

    pub fn numeric(&self) -> Vec<Option<f64>> {
        self.values.iter().map(|v| v.as_f64()).collect()
    }

    pub fn ensure_schema(&self, schema: &[String]) -> ImpactResult<()> {
        if self.columns.len() != schema.len() {
            return Err(ImpactError::SchemaMismatch(format!(
                "row has {} columns, predictor expects {}",
                self.columns.len(),
                schema.len()
            )));
        }
        if let Some((got, want)) = self.columns.iter().zip(schema).find(|(a, b)| a != b) {
            return Err(ImpactError::SchemaMismatch(format!(
                "column `{got}` where predictor expects `{want}`"
            )));
        }
        Ok(())
    }
}

pub fn tracked_metrics() -> &'static [TeamMetric] {
    &TRACKED_METRICS
}

pub fn assemble(
    target: Season,
    squad: &str,
    history: &[TeamSeasonFeatures],
    present_in_latest: bool,
    cfg: &HistoryConfig,
) -> FeatureVector {
    let summary = aggregate_history(history, tracked_metrics(), present_in_latest, cfg);
    FeatureVector::new(target, squad, summary)
}
