use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::history::HistoryConfig;
use crate::transfer::RedistributionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Competition filter applied to team rosters (substring, case-insensitive).
    pub league_name: String,
    pub history: HistoryConfig,
    pub redistribution: RedistributionConfig,
    pub data_dir: PathBuf,
    pub players_file_prefix: String,
    pub targets_file_suffix: String,
    pub model_path: PathBuf,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            league_name: "Premier League".to_string(),
            history: HistoryConfig::default(),
            redistribution: RedistributionConfig::default(),
            data_dir: PathBuf::from("data"),
            players_file_prefix: "fbref_merged_".to_string(),
            targets_file_suffix: "_team_clean.csv".to_string(),
            model_path: PathBuf::from("model/linear_predictor.json"),
        }
    }
}

impl ImpactConfig {
    /// Replaces out-of-range modelling constants with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = ImpactConfig::default();
        if !(self.history.half_life > 0.0 && self.history.half_life.is_finite()) {
            warn!(half_life = self.history.half_life, "invalid half-life; using default");
            self.history.half_life = defaults.history.half_life;
        }
        let cap = self.redistribution.cap_fraction;
        if !(cap > 0.0 && cap <= 1.0) {
            warn!(cap_fraction = cap, "invalid donor cap fraction; using default");
            self.redistribution.cap_fraction = defaults.redistribution.cap_fraction;
        }
        if !(self.redistribution.epsilon >= 0.0 && self.redistribution.epsilon.is_finite()) {
            self.redistribution.epsilon = defaults.redistribution.epsilon;
        }
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let number = |key: &str| {
            let raw = text(key)?;
            match raw.parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring non-numeric override");
                    None
                }
            }
        };
        if let Some(dir) = text("TRANSFER_IMPACT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = text("TRANSFER_IMPACT_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(league) = text("TRANSFER_IMPACT_LEAGUE") {
            self.league_name = league;
        }
        if let Some(v) = number("TRANSFER_IMPACT_HALF_LIFE") {
            self.history.half_life = v;
        }
        if let Some(v) = number("TRANSFER_IMPACT_DONOR_CAP") {
            self.redistribution.cap_fraction = v;
        }
    }
}

/// Reads `path` (JSON) when given and present, then applies `TRANSFER_IMPACT_*`
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ImpactConfig> {
    load_with(path, |key| env::var(key).ok())
}

fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<ImpactConfig> {
    let mut cfg = match path {
        Some(p) if p.exists() => {
            let raw = fs::read_to_string(p)
                .with_context(|| format!("read config {}", p.display()))?;
            serde_json::from_str::<ImpactConfig>(&raw)
                .with_context(|| format!("parse config {}", p.display()))?
        }
        _ => ImpactConfig::default(),
    };
    cfg.apply_overrides(lookup);
    Ok(cfg.sanitized())
}
