use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ImpactConfig;
use crate::feature_vector::{FeatureRow, assemble};
use crate::player::name_key;
use crate::season::{Season, history_seasons};
use crate::season_store::SeasonStore;
use crate::team_features::{TeamSeasonFeatures, team_features_by_squad};

type SeasonFeatures = BTreeMap<String, TeamSeasonFeatures>;

/// One labelled training example: a team's history-aggregated features going
/// into `row.season` and the points it finished that season with.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub points: f64,
    pub row: FeatureRow,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    pub columns: Vec<String>,
    pub rows: Vec<TrainingRow>,
    /// Target seasons dropped because no earlier feature season exists.
    pub skipped_seasons: Vec<Season>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub version: u32,
    pub generated_at: String,
    pub league_name: String,
    pub half_life: f64,
    pub rows: usize,
    pub target_seasons: Vec<Season>,
    #[serde(default)]
    pub skipped_seasons: Vec<Season>,
    pub feature_columns: Vec<String>,
}

impl TrainingDataset {
    pub fn manifest(&self, cfg: &ImpactConfig) -> DatasetManifest {
        let mut target_seasons: Vec<Season> = self.rows.iter().map(|r| r.row.season).collect();
        target_seasons.dedup();
        DatasetManifest {
            version: 1,
            generated_at: chrono::Utc::now().to_rfc3339(),
            league_name: cfg.league_name.clone(),
            half_life: cfg.history.half_life,
            rows: self.rows.len(),
            target_seasons,
            skipped_seasons: self.skipped_seasons.clone(),
            feature_columns: self.columns.clone(),
        }
    }
}

/// Builds the labelled table for every season that has a standings table and
/// at least one earlier player season. Rows come out sorted by season, then squad.
pub fn build_training_dataset<S>(
    store: &S,
    cfg: &ImpactConfig,
    schema: &[String],
) -> Result<TrainingDataset>
where
    S: SeasonStore + Sync + ?Sized,
{
    let feature_seasons = store.available_seasons()?;
    let features: BTreeMap<Season, SeasonFeatures> = feature_seasons
        .par_iter()
        .map(|&season| -> Result<(Season, SeasonFeatures)> {
            let rows = store
                .load_players(season)
                .with_context(|| format!("load players {season}"))?;
            Ok((season, team_features_by_squad(&rows, &cfg.league_name)))
        })
        .collect::<Result<_>>()?;

    // The season after the newest player table can still be a target.
    let mut targets = feature_seasons.clone();
    if let Some(last) = feature_seasons.last() {
        targets.push(Season::new(last.start_year() + 1));
    }

    let per_season: Vec<(Season, Option<Vec<TrainingRow>>)> = targets
        .par_iter()
        .map(|&target| -> Result<(Season, Option<Vec<TrainingRow>>)> {
            let rows = season_rows(store, cfg, schema, &features, &feature_seasons, target)?;
            Ok((target, rows))
        })
        .collect::<Result<_>>()?;

    let mut out = TrainingDataset {
        columns: schema.to_vec(),
        ..Default::default()
    };
    for (season, rows) in per_season {
        match rows {
            Some(rows) => out.rows.extend(rows),
            None => out.skipped_seasons.push(season),
        }
    }
    out.rows.sort_by(|a, b| {
        a.row
            .season
            .cmp(&b.row.season)
            .then_with(|| a.row.squad.cmp(&b.row.squad))
    });
    info!(
        rows = out.rows.len(),
        skipped = out.skipped_seasons.len(),
        "training dataset built"
    );
    Ok(out)
}

/// `None` when the season has to be skipped for lack of history.
fn season_rows<S>(
    store: &S,
    cfg: &ImpactConfig,
    schema: &[String],
    features: &BTreeMap<Season, SeasonFeatures>,
    feature_seasons: &[Season],
    target: Season,
) -> Result<Option<Vec<TrainingRow>>>
where
    S: SeasonStore + Sync + ?Sized,
{
    let standings = store
        .load_targets(target)
        .with_context(|| format!("load standings {target}"))?;
    let seasons = history_seasons(target, feature_seasons);
    if seasons.is_empty() {
        if !standings.is_empty() {
            warn!(%target, "no earlier player season; skipping target season");
        }
        return Ok(None);
    }

    let mut rows = Vec::with_capacity(standings.len());
    for team in standings {
        if let Some(comp) = &team.comp
            && !comp.to_lowercase().contains(&cfg.league_name.trim().to_lowercase())
        {
            continue;
        }
        let key = name_key(&team.squad);
        let history: Vec<TeamSeasonFeatures> = seasons
            .iter()
            .filter_map(|s| features.get(s).and_then(|m| m.get(&key)).cloned())
            .collect();
        let present_in_latest = features
            .get(&seasons[0])
            .is_some_and(|m| m.contains_key(&key));
        let vector = assemble(target, &team.squad, &history, present_in_latest, &cfg.history);
        let row = vector
            .to_row(schema)
            .with_context(|| format!("lay out features for {} {target}", team.squad))?;
        rows.push(TrainingRow {
            points: team.points,
            row,
        });
    }
    Ok(Some(rows))
}

/// Writes `Season, Squad, points, <columns>`; missing values are empty cells.
pub fn write_dataset_csv(path: &Path, dataset: &TrainingDataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;

    let mut header = vec!["Season".to_string(), "Squad".to_string(), "points".to_string()];
    header.extend(dataset.columns.iter().cloned());
    writer.write_record(&header).context("write header")?;

    for entry in &dataset.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(entry.row.season.to_string());
        record.push(entry.row.squad.clone());
        record.push(entry.points.to_string());
        record.extend(
            entry
                .row
                .numeric()
                .into_iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .with_context(|| format!("write row {} {}", entry.row.squad, entry.row.season))?;
    }
    writer.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

pub fn write_manifest(path: &Path, manifest: &DatasetManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let raw = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_vector::{FeatureValue, default_schema};
    use crate::player::{CountStat, PlayerSeasonRecord};
    use crate::season_store::{MemoryStore, TeamTarget};

    fn rec(name: &str, squad: &str, minutes: f64, goals: f64) -> PlayerSeasonRecord {
        PlayerSeasonRecord::new(name, squad, minutes)
            .with_comp("eng Premier League")
            .with_count(CountStat::Gls, goals)
    }

    fn target(season: Season, squad: &str, points: f64) -> TeamTarget {
        TeamTarget {
            season,
            squad: squad.to_string(),
            comp: Some("Premier League".to_string()),
            points,
        }
    }

    fn store() -> MemoryStore {
        let (s22, s23, s24) = (Season::new(2022), Season::new(2023), Season::new(2024));
        let mut store = MemoryStore::new();
        store.insert_players(s22, vec![rec("A", "Town FC", 3000.0, 9.0)]);
        store.insert_players(
            s23,
            vec![rec("A", "Town FC", 3000.0, 12.0), rec("B", "City", 3000.0, 20.0)],
        );
        store.insert_targets(s22, vec![target(s22, "Town FC", 50.0)]);
        store.insert_targets(
            s23,
            vec![target(s23, "Town FC", 55.0), target(s23, "City", 80.0)],
        );
        store.insert_targets(
            s24,
            vec![
                target(s24, "Town FC", 58.0),
                target(s24, "City", 85.0),
                target(s24, "Rovers", 40.0),
            ],
        );
        store
    }

    #[test]
    fn builds_sorted_rows_and_skips_first_season() {
        let cfg = ImpactConfig::default();
        let ds = build_training_dataset(&store(), &cfg, &default_schema()).unwrap();

        assert_eq!(ds.skipped_seasons, vec![Season::new(2022)]);
        let keys: Vec<(String, String)> = ds
            .rows
            .iter()
            .map(|r| (r.row.season.to_string(), r.row.squad.clone()))
            .collect();
        let expected = [
            ("2023-2024", "City"),
            ("2023-2024", "Town FC"),
            ("2024-2025", "City"),
            ("2024-2025", "Rovers"),
            ("2024-2025", "Town FC"),
        ]
        .map(|(s, t)| (s.to_string(), t.to_string()));
        assert_eq!(keys, expected);
    }

    #[test]
    fn promoted_and_missing_history_flags() {
        let cfg = ImpactConfig::default();
        let ds = build_training_dataset(&store(), &cfg, &default_schema()).unwrap();
        let find = |season: i32, squad: &str| {
            ds.rows
                .iter()
                .find(|r| r.row.season == Season::new(season) && r.row.squad == squad)
                .unwrap()
        };

        // City first appears in 2022-2023, so going into 2023-2024 it has no history.
        let city = find(2023, "City");
        assert_eq!(city.points, 80.0);
        assert_eq!(city.row.get("missing_prev"), Some(FeatureValue::Present(1.0)));
        assert_eq!(city.row.get("promoted"), Some(FeatureValue::Present(1.0)));

        let town = find(2024, "Town FC");
        assert_eq!(town.row.get("history_len"), Some(FeatureValue::Present(2.0)));
        assert_eq!(town.row.get("promoted"), Some(FeatureValue::Present(0.0)));
        let last1 = town.row.get("last1_gls_per90").unwrap().as_f64().unwrap();
        assert!((last1 - 12.0 / (3000.0 / 90.0)).abs() < 1e-12);
        let trend = town.row.get("trend_gls_per90").unwrap().as_f64().unwrap();
        assert!((trend - (9.0 - 12.0) / (3000.0 / 90.0)).abs() < 1e-12);

        let rovers = find(2024, "Rovers");
        assert_eq!(rovers.row.get("last1_gls_per90"), Some(FeatureValue::Missing));
        assert_eq!(rovers.row.get("trend_gls_per90"), Some(FeatureValue::StructuralZero));
    }

    #[test]
    fn manifest_lists_target_seasons_once() {
        let cfg = ImpactConfig::default();
        let ds = build_training_dataset(&store(), &cfg, &default_schema()).unwrap();
        let manifest = ds.manifest(&cfg);
        assert_eq!(manifest.rows, 5);
        assert_eq!(manifest.target_seasons, vec![Season::new(2023), Season::new(2024)]);
        assert_eq!(manifest.feature_columns.len(), 36);
    }
}
