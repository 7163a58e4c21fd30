use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ImpactConfig;
use crate::player::{CountStat, PlayerSeasonRecord};
use crate::season::Season;

/// Final league table entry used as the training label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTarget {
    pub season: Season,
    pub squad: String,
    #[serde(default)]
    pub comp: Option<String>,
    pub points: f64,
}

/// Source of already-normalised per-season player tables.
pub trait SeasonStore {
    fn available_seasons(&self) -> Result<Vec<Season>>;

    /// Every player row for `season`, all competitions.
    fn load_players(&self, season: Season) -> Result<Vec<PlayerSeasonRecord>>;

    fn load_targets(&self, season: Season) -> Result<Vec<TeamTarget>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    players: BTreeMap<Season, Vec<PlayerSeasonRecord>>,
    targets: BTreeMap<Season, Vec<TeamTarget>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_players(&mut self, season: Season, rows: Vec<PlayerSeasonRecord>) {
        self.players.entry(season).or_default().extend(rows);
    }

    pub fn insert_targets(&mut self, season: Season, rows: Vec<TeamTarget>) {
        self.targets.entry(season).or_default().extend(rows);
    }
}

impl SeasonStore for MemoryStore {
    fn available_seasons(&self) -> Result<Vec<Season>> {
        Ok(self.players.keys().copied().collect())
    }

    fn load_players(&self, season: Season) -> Result<Vec<PlayerSeasonRecord>> {
        Ok(self.players.get(&season).cloned().unwrap_or_default())
    }

    fn load_targets(&self, season: Season) -> Result<Vec<TeamTarget>> {
        Ok(self.targets.get(&season).cloned().unwrap_or_default())
    }
}

/// Directory of CSV exports: `<prefix><YYYY_YYYY>.csv` player tables and
/// `*_<YYYY_YYYY><suffix>` league tables.
#[derive(Debug, Clone)]
pub struct CsvSeasonStore {
    data_dir: PathBuf,
    players_prefix: String,
    targets_suffix: String,
}

impl CsvSeasonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let defaults = ImpactConfig::default();
        Self {
            data_dir: data_dir.into(),
            players_prefix: defaults.players_file_prefix,
            targets_suffix: defaults.targets_file_suffix,
        }
    }

    pub fn from_config(cfg: &ImpactConfig) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            players_prefix: cfg.players_file_prefix.clone(),
            targets_suffix: cfg.targets_file_suffix.clone(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn players_path(&self, season: Season) -> PathBuf {
        self.data_dir
            .join(format!("{}{}.csv", self.players_prefix, season.file_stem()))
    }

    fn file_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.data_dir)
            .with_context(|| format!("list data dir {}", self.data_dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", self.data_dir.display()))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl SeasonStore for CsvSeasonStore {
    fn available_seasons(&self) -> Result<Vec<Season>> {
        let mut seasons: Vec<Season> = self
            .file_names()?
            .iter()
            .filter_map(|name| {
                name.strip_prefix(&self.players_prefix)?
                    .strip_suffix(".csv")
                    .and_then(Season::parse_loose)
            })
            .collect();
        seasons.sort();
        seasons.dedup();
        Ok(seasons)
    }

    fn load_players(&self, season: Season) -> Result<Vec<PlayerSeasonRecord>> {
        let path = self.players_path(season);
        let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let rows = read_players(file).with_context(|| format!("parse {}", path.display()))?;
        debug!(path = %path.display(), rows = rows.len(), "loaded player table");
        Ok(rows)
    }

    fn load_targets(&self, season: Season) -> Result<Vec<TeamTarget>> {
        let suffix = format!("_{}{}", season.file_stem(), self.targets_suffix);
        let mut out = Vec::new();
        for name in self.file_names()? {
            if !name.ends_with(&suffix) {
                continue;
            }
            let path = self.data_dir.join(&name);
            let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
            let rows =
                read_targets(file, season).with_context(|| format!("parse {}", path.display()))?;
            debug!(path = %path.display(), rows = rows.len(), "loaded league table");
            out.extend(rows);
        }
        if out.is_empty() {
            warn!(%season, "no league table found");
        }
        Ok(out)
    }
}

struct Headers {
    index: HashMap<String, usize>,
}

impl Headers {
    fn new(record: &csv::StringRecord) -> Self {
        let index = record
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn text<'r>(&self, row: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        let idx = *self.index.get(name)?;
        row.get(idx).map(str::trim).filter(|s| !s.is_empty())
    }

    fn num(&self, row: &csv::StringRecord, name: &str) -> Option<f64> {
        self.text(row, name)
            .and_then(|s| s.replace(',', "").parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

fn read_players<R: Read>(rdr: R) -> Result<Vec<PlayerSeasonRecord>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = Headers::new(reader.headers().context("read header row")?);
    let mut out = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, %err, "skipping malformed player row");
                continue;
            }
        };
        let (Some(player), Some(squad)) = (headers.text(&row, "Player"), headers.text(&row, "Squad"))
        else {
            continue;
        };
        // Minutes are mandatory; this also drops echoed header rows.
        let Some(minutes) = headers.num(&row, "Min") else {
            continue;
        };

        let mut rec = PlayerSeasonRecord::new(player, squad, minutes);
        rec.comp = headers.text(&row, "Comp").map(str::to_string);
        rec.position = headers.text(&row, "Pos").map(str::to_string);
        rec.age = headers.num(&row, "Age");
        for stat in CountStat::ALL {
            rec.counts.set(stat, headers.num(&row, stat.column()));
            rec.per90.set(stat, headers.num(&row, stat.per90_column()));
        }
        rec.counts.derive_tkl_int();
        out.push(rec);
    }
    Ok(out)
}

fn read_targets<R: Read>(rdr: R, season: Season) -> Result<Vec<TeamTarget>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = Headers::new(reader.headers().context("read header row")?);
    let mut out = Vec::new();
    for result in reader.records() {
        let Ok(row) = result else {
            continue;
        };
        let Some(squad) = headers.text(&row, "Squad") else {
            continue;
        };
        let Some(points) = headers.num(&row, "Pts").or_else(|| headers.num(&row, "Points")) else {
            continue;
        };
        out.push(TeamTarget {
            season,
            squad: squad.to_string(),
            comp: headers.text(&row, "Comp").map(str::to_string),
            points,
        });
    }
    Ok(out)
}
