use serde::{Deserialize, Serialize};

/// Additive per-season statistics. Minutes are carried separately on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountStat {
    Gls,
    Ast,
    Sh,
    SoT,
    Sca,
    Tkl,
    Int,
    Blocks,
    PrgP,
    PrgC,
    PrgR,
    TklInt,
}

pub const COUNT_STAT_LEN: usize = 12;

impl CountStat {
    pub const ALL: [CountStat; COUNT_STAT_LEN] = [
        CountStat::Gls,
        CountStat::Ast,
        CountStat::Sh,
        CountStat::SoT,
        CountStat::Sca,
        CountStat::Tkl,
        CountStat::Int,
        CountStat::Blocks,
        CountStat::PrgP,
        CountStat::PrgC,
        CountStat::PrgR,
        CountStat::TklInt,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Canonical column header.
    pub fn column(self) -> &'static str {
        match self {
            CountStat::Gls => "Gls",
            CountStat::Ast => "Ast",
            CountStat::Sh => "Sh",
            CountStat::SoT => "SoT",
            CountStat::Sca => "SCA",
            CountStat::Tkl => "Tkl",
            CountStat::Int => "Int",
            CountStat::Blocks => "Blocks",
            CountStat::PrgP => "PrgP",
            CountStat::PrgC => "PrgC",
            CountStat::PrgR => "PrgR",
            CountStat::TklInt => "Tkl+Int",
        }
    }

    /// Header of the matching per-90 rate column, e.g. `gls_per90`.
    pub fn per90_column(self) -> &'static str {
        match self {
            CountStat::Gls => "gls_per90",
            CountStat::Ast => "ast_per90",
            CountStat::Sh => "sh_per90",
            CountStat::SoT => "sot_per90",
            CountStat::Sca => "sca_per90",
            CountStat::Tkl => "tkl_per90",
            CountStat::Int => "int_per90",
            CountStat::Blocks => "blocks_per90",
            CountStat::PrgP => "prgp_per90",
            CountStat::PrgC => "prgc_per90",
            CountStat::PrgR => "prgr_per90",
            CountStat::TklInt => "tklint_per90",
        }
    }

    pub fn from_column(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|s| s.column() == raw)
    }
}

/// One optional value per [`CountStat`]. `None` means the column was absent or unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatLine {
    values: [Option<f64>; COUNT_STAT_LEN],
}

impl StatLine {
    pub fn get(&self, stat: CountStat) -> Option<f64> {
        self.values[stat.index()]
    }

    pub fn set(&mut self, stat: CountStat, value: Option<f64>) {
        self.values[stat.index()] = value;
    }

    pub fn with(mut self, stat: CountStat, value: f64) -> Self {
        self.set(stat, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (CountStat, Option<f64>)> + '_ {
        CountStat::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    pub fn scale(&mut self, factor: f64) {
        for v in self.values.iter_mut().flatten() {
            *v *= factor;
        }
    }

    pub fn clamp_non_negative(&mut self) {
        for v in self.values.iter_mut().flatten() {
            if *v < 0.0 || v.is_nan() {
                *v = 0.0;
            }
        }
    }

    /// Fills `Tkl+Int` from its components when only the components are present.
    pub fn derive_tkl_int(&mut self) {
        if self.get(CountStat::TklInt).is_some() {
            return;
        }
        if let (Some(tkl), Some(int)) = (self.get(CountStat::Tkl), self.get(CountStat::Int)) {
            self.set(CountStat::TklInt, Some(tkl + int));
        }
    }
}

/// One player's season totals for one club.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerSeasonRecord {
    pub player: String,
    pub squad: String,
    #[serde(default)]
    pub comp: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    pub minutes: f64,
    #[serde(default)]
    pub counts: StatLine,
    /// Explicit per-90 rates, when the source row carried them.
    #[serde(default)]
    pub per90: StatLine,
}

impl PlayerSeasonRecord {
    pub fn new(player: &str, squad: &str, minutes: f64) -> Self {
        Self {
            player: player.trim().to_string(),
            squad: squad.trim().to_string(),
            minutes,
            ..Default::default()
        }
    }

    pub fn with_count(mut self, stat: CountStat, value: f64) -> Self {
        self.counts.set(stat, Some(value));
        self
    }

    pub fn with_age(mut self, age: f64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_position(mut self, pos: &str) -> Self {
        self.position = Some(pos.to_string());
        self
    }

    pub fn with_comp(mut self, comp: &str) -> Self {
        self.comp = Some(comp.to_string());
        self
    }

    pub fn is_goalkeeper(&self) -> bool {
        self.position
            .as_deref()
            .is_some_and(|p| p.to_ascii_uppercase().contains("GK"))
    }

    pub fn plays_for(&self, team: &str) -> bool {
        name_key(&self.squad) == name_key(team)
    }

    pub fn in_competition(&self, league: &str) -> bool {
        let needle = league.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        // Rows without a competition are left to the caller's own filtering.
        self.comp
            .as_deref()
            .is_none_or(|c| c.to_lowercase().contains(&needle))
    }

    /// Scales minutes and every count stat by the same factor.
    pub fn scale_workload(&mut self, factor: f64) {
        self.minutes *= factor;
        self.counts.scale(factor);
    }

    /// Per-90 rate for `stat`: the explicit rate when present, otherwise derived
    /// from the season total and minutes.
    pub fn per90_rate(&self, stat: CountStat) -> Option<f64> {
        if let Some(rate) = self.per90.get(stat)
            && rate.is_finite()
        {
            return Some(rate);
        }
        if self.minutes > 0.0 {
            return self.counts.get(stat).map(|total| total / (self.minutes / 90.0));
        }
        None
    }
}

/// Case-insensitive, whitespace-trimmed key used for team and player matching.
pub fn name_key(input: &str) -> String {
    input.trim().to_lowercase()
}

pub fn total_minutes(rows: &[PlayerSeasonRecord]) -> f64 {
    rows.iter().map(|r| r.minutes).sum()
}
