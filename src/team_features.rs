use std::collections::BTreeMap;

use serde::Serialize;

use crate::player::{CountStat, PlayerSeasonRecord, name_key};

/// Team-level metrics derived from one season of player rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TeamMetric {
    GlsPer90,
    AstPer90,
    ShPer90,
    SotPer90,
    ScaPer90,
    TklIntPer90,
    BlocksPer90,
    PrgPPer90,
    PrgCPer90,
    PrgRPer90,
    AvgAgeMwa,
    TeamMinutes,
}

pub const TEAM_METRIC_LEN: usize = 12;

/// Metrics carried into the history features, in predictor column order.
pub const BASE_METRICS: [TeamMetric; 10] = [
    TeamMetric::GlsPer90,
    TeamMetric::AstPer90,
    TeamMetric::SotPer90,
    TeamMetric::ScaPer90,
    TeamMetric::TklIntPer90,
    TeamMetric::BlocksPer90,
    TeamMetric::PrgPPer90,
    TeamMetric::PrgCPer90,
    TeamMetric::PrgRPer90,
    TeamMetric::AvgAgeMwa,
];

/// [`BASE_METRICS`] plus team minutes.
pub const TRACKED_METRICS: [TeamMetric; 11] = [
    TeamMetric::GlsPer90,
    TeamMetric::AstPer90,
    TeamMetric::SotPer90,
    TeamMetric::ScaPer90,
    TeamMetric::TklIntPer90,
    TeamMetric::BlocksPer90,
    TeamMetric::PrgPPer90,
    TeamMetric::PrgCPer90,
    TeamMetric::PrgRPer90,
    TeamMetric::AvgAgeMwa,
    TeamMetric::TeamMinutes,
];

impl TeamMetric {
    pub const ALL: [TeamMetric; TEAM_METRIC_LEN] = [
        TeamMetric::GlsPer90,
        TeamMetric::AstPer90,
        TeamMetric::ShPer90,
        TeamMetric::SotPer90,
        TeamMetric::ScaPer90,
        TeamMetric::TklIntPer90,
        TeamMetric::BlocksPer90,
        TeamMetric::PrgPPer90,
        TeamMetric::PrgCPer90,
        TeamMetric::PrgRPer90,
        TeamMetric::AvgAgeMwa,
        TeamMetric::TeamMinutes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TeamMetric::GlsPer90 => "gls_per90",
            TeamMetric::AstPer90 => "ast_per90",
            TeamMetric::ShPer90 => "sh_per90",
            TeamMetric::SotPer90 => "sot_per90",
            TeamMetric::ScaPer90 => "sca_per90",
            TeamMetric::TklIntPer90 => "tklint_per90",
            TeamMetric::BlocksPer90 => "blocks_per90",
            TeamMetric::PrgPPer90 => "prgp_per90",
            TeamMetric::PrgCPer90 => "prgc_per90",
            TeamMetric::PrgRPer90 => "prgr_per90",
            TeamMetric::AvgAgeMwa => "avg_age_mwa",
            TeamMetric::TeamMinutes => "team_minutes",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == raw)
    }

    /// The count stat a per-90 metric is computed from.
    pub fn source_stat(self) -> Option<CountStat> {
        match self {
            TeamMetric::GlsPer90 => Some(CountStat::Gls),
            TeamMetric::AstPer90 => Some(CountStat::Ast),
            TeamMetric::ShPer90 => Some(CountStat::Sh),
            TeamMetric::SotPer90 => Some(CountStat::SoT),
            TeamMetric::ScaPer90 => Some(CountStat::Sca),
            TeamMetric::TklIntPer90 => Some(CountStat::TklInt),
            TeamMetric::BlocksPer90 => Some(CountStat::Blocks),
            TeamMetric::PrgPPer90 => Some(CountStat::PrgP),
            TeamMetric::PrgCPer90 => Some(CountStat::PrgC),
            TeamMetric::PrgRPer90 => Some(CountStat::PrgR),
            TeamMetric::AvgAgeMwa | TeamMetric::TeamMinutes => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One team's aggregate for one season. Always rebuilt from player rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSeasonFeatures {
    pub squad: String,
    values: [Option<f64>; TEAM_METRIC_LEN],
}

impl TeamSeasonFeatures {
    pub fn get(&self, metric: TeamMetric) -> Option<f64> {
        self.values[metric.index()]
    }

    pub fn team_minutes(&self) -> f64 {
        self.get(TeamMetric::TeamMinutes).unwrap_or(0.0)
    }
}

/// Collapses one team's player rows for one season into a feature row.
///
/// Absent stat values count as zero in the totals; rates are undefined when
/// the team logged no minutes. Row order does not affect the result.
pub fn extract_team_features(squad: &str, rows: &[PlayerSeasonRecord]) -> TeamSeasonFeatures {
    let team_minutes: f64 = rows.iter().map(|r| r.minutes).sum();
    let mut values = [None; TEAM_METRIC_LEN];
    values[TeamMetric::TeamMinutes.index()] = Some(team_minutes);

    for metric in TeamMetric::ALL {
        let Some(stat) = metric.source_stat() else {
            continue;
        };
        let total: f64 = rows
            .iter()
            .filter_map(|r| r.counts.get(stat))
            .filter(|v| v.is_finite())
            .sum();
        values[metric.index()] = per90(total, team_minutes);
    }

    let mut age_weighted = 0.0;
    let mut age_minutes = 0.0;
    for row in rows {
        if let Some(age) = row.age
            && age.is_finite()
        {
            age_weighted += age * row.minutes;
            age_minutes += row.minutes;
        }
    }
    values[TeamMetric::AvgAgeMwa.index()] = if age_minutes > 0.0 {
        Some(age_weighted / age_minutes)
    } else {
        None
    };

    TeamSeasonFeatures {
        squad: squad.trim().to_string(),
        values,
    }
}

fn per90(total: f64, minutes: f64) -> Option<f64> {
    if minutes > 0.0 {
        Some(total / (minutes / 90.0))
    } else {
        None
    }
}

/// Groups a season's rows by club (restricted to `league`) and extracts each
/// club's features. Keys are case-folded club names.
pub fn team_features_by_squad(
    rows: &[PlayerSeasonRecord],
    league: &str,
) -> BTreeMap<String, TeamSeasonFeatures> {
    let mut groups: BTreeMap<String, (String, Vec<PlayerSeasonRecord>)> = BTreeMap::new();
    for row in rows {
        if row.squad.trim().is_empty() || !row.in_competition(league) {
            continue;
        }
        groups
            .entry(name_key(&row.squad))
            .or_insert_with(|| (row.squad.trim().to_string(), Vec::new()))
            .1
            .push(row.clone());
    }

    groups
        .into_iter()
        .map(|(key, (display, members))| (key, extract_team_features(&display, &members)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<PlayerSeasonRecord> {
        vec![
            PlayerSeasonRecord::new("A", "Town FC", 1800.0)
                .with_count(CountStat::Gls, 10.0)
                .with_count(CountStat::Sh, 40.0)
                .with_age(24.0),
            PlayerSeasonRecord::new("B", "Town FC", 900.0)
                .with_count(CountStat::Gls, 2.0)
                .with_age(30.0),
            PlayerSeasonRecord::new("C", "Town FC", 0.0).with_age(19.0),
        ]
    }

    #[test]
    fn per90_rates_use_team_minutes() {
        let f = extract_team_features("Town FC", &roster());
        assert_eq!(f.team_minutes(), 2700.0);
        // 12 goals over 30 full matches.
        assert!((f.get(TeamMetric::GlsPer90).unwrap() - 0.4).abs() < 1e-12);
        assert!((f.get(TeamMetric::ShPer90).unwrap() - 40.0 / 30.0).abs() < 1e-12);
        assert_eq!(f.get(TeamMetric::AstPer90), Some(0.0));
    }

    #[test]
    fn age_is_minutes_weighted() {
        let f = extract_team_features("Town FC", &roster());
        let expected = (24.0 * 1800.0 + 30.0 * 900.0) / 2700.0;
        assert!((f.get(TeamMetric::AvgAgeMwa).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_minutes_leaves_rates_undefined() {
        let rows = vec![PlayerSeasonRecord::new("A", "Town FC", 0.0).with_count(CountStat::Gls, 3.0)];
        let f = extract_team_features("Town FC", &rows);
        assert_eq!(f.team_minutes(), 0.0);
        assert_eq!(f.get(TeamMetric::GlsPer90), None);
        assert_eq!(f.get(TeamMetric::AvgAgeMwa), None);
    }

    #[test]
    fn grouping_filters_league_and_folds_case() {
        let rows = vec![
            PlayerSeasonRecord::new("A", "Town FC", 900.0).with_comp("Premier League"),
            PlayerSeasonRecord::new("B", "TOWN FC", 900.0).with_comp("Premier League"),
            PlayerSeasonRecord::new("C", "City", 900.0).with_comp("La Liga"),
        ];
        let by_squad = team_features_by_squad(&rows, "premier league");
        assert_eq!(by_squad.len(), 1);
        assert_eq!(by_squad["town fc"].team_minutes(), 1800.0);
    }

    #[test]
    fn metric_names_resolve() {
        for m in TeamMetric::ALL {
            assert_eq!(TeamMetric::from_name(m.name()), Some(m));
        }
        assert_eq!(TRACKED_METRICS.len(), BASE_METRICS.len() + 1);
    }
}
