use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::player::{CountStat, PlayerSeasonRecord, StatLine, name_key, total_minutes};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedistributionConfig {
    pub cap_fraction: f64,
    pub epsilon: f64,
}

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self {
            cap_fraction: 0.25,
            epsilon: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferScenario {
    pub outgoing_minutes: BTreeMap<String, f64>,
    pub incoming: PlayerSeasonRecord,
    pub projected_minutes: f64,
    pub cross_league_scale: f64,
}

impl TransferScenario {
    pub fn new(incoming: PlayerSeasonRecord, projected_minutes: f64) -> Self {
        Self {
            outgoing_minutes: BTreeMap::new(),
            incoming,
            projected_minutes,
            cross_league_scale: 1.0,
        }
    }

    pub fn with_outgoing(mut self, player: &str, minutes: f64) -> Self {
        self.outgoing_minutes.insert(player.to_string(), minutes);
        self
    }

    pub fn with_cross_league_scale(mut self, scale: f64) -> Self {
        self.cross_league_scale = scale;
        self
    }
}

/// Applies `scenario` to one season's roster and returns the replacement roster.
///
/// Team minutes are conserved: whatever the outgoing reduction and incoming
/// projection add or remove is taken from, or handed back to, the incumbent
/// outfield players. The input roster is never modified.
pub fn apply_transfer(
    roster: &[PlayerSeasonRecord],
    scenario: &TransferScenario,
    cfg: &RedistributionConfig,
) -> Vec<PlayerSeasonRecord> {
    let mut rows = roster.to_vec();
    let baseline_minutes = total_minutes(&rows);

    reduce_outgoing(&mut rows, &scenario.outgoing_minutes);

    rows.push(project_incoming(roster.first(), scenario));
    let incoming_idx = rows.len() - 1;

    let delta = total_minutes(&rows) - baseline_minutes;
    debug!(
        baseline_minutes,
        delta,
        incoming = %scenario.incoming.player,
        "transfer minutes delta"
    );

    if delta.abs() > cfg.epsilon {
        let donors: Vec<usize> = (0..incoming_idx)
            .filter(|&i| !rows[i].is_goalkeeper())
            .collect();
        if delta > 0.0 {
            absorb_surplus(&mut rows, &donors, delta, cfg);
        } else {
            cover_deficit(&mut rows, &donors, -delta);
        }
    }

    for row in &mut rows {
        if row.minutes < 0.0 || row.minutes.is_nan() {
            row.minutes = 0.0;
        }
        row.counts.clamp_non_negative();
    }
    rows
}

fn reduce_outgoing(rows: &mut [PlayerSeasonRecord], outgoing: &BTreeMap<String, f64>) {
    for (name, &minutes_out) in outgoing {
        if !(minutes_out > 0.0) {
            continue;
        }
        let key = name_key(name);
        let current: f64 = rows
            .iter()
            .filter(|r| name_key(&r.player) == key)
            .map(|r| r.minutes)
            .sum();
        if current <= 0.0 {
            debug!(player = %name, "outgoing player not on roster or without minutes; skipped");
            continue;
        }
        let frac = (minutes_out / current).clamp(0.0, 1.0);
        for row in rows.iter_mut().filter(|r| name_key(&r.player) == key) {
            row.scale_workload(1.0 - frac);
        }
    }
}

// Raw totals are used only for stats with no obtainable rate.
fn project_incoming(
    template: Option<&PlayerSeasonRecord>,
    scenario: &TransferScenario,
) -> PlayerSeasonRecord {
    let source = &scenario.incoming;
    let minutes = scenario.projected_minutes.max(0.0);
    let scale = scenario.cross_league_scale;

    let mut counts = StatLine::default();
    for stat in CountStat::ALL {
        let projected = source
            .per90_rate(stat)
            .map(|rate| rate * (minutes / 90.0) * scale)
            .or_else(|| source.counts.get(stat).map(|total| total * scale));
        counts.set(stat, projected);
    }

    let mut row = source.clone();
    if let Some(t) = template {
        row.squad = t.squad.clone();
        row.comp = t.comp.clone();
    }
    row.minutes = minutes;
    row.counts = counts;
    row.per90 = StatLine::default();
    row
}

fn absorb_surplus(
    rows: &mut [PlayerSeasonRecord],
    donors: &[usize],
    surplus: f64,
    cfg: &RedistributionConfig,
) {
    let mut order = donors.to_vec();
    order.sort_by(|&a, &b| rows[b].minutes.total_cmp(&rows[a].minutes));

    let mut remaining = surplus;
    for idx in order {
        if remaining <= cfg.epsilon {
            break;
        }
        let current = rows[idx].minutes;
        if current <= 0.0 {
            continue;
        }
        let take = (current * cfg.cap_fraction).min(remaining);
        let factor = ((current - take) / current.max(1e-9)).max(0.0);
        rows[idx].scale_workload(factor);
        remaining -= take;
    }

    if remaining <= cfg.epsilon {
        return;
    }

    // Capped pass could not absorb everything: spread the rest in proportion
    // to each donor's remaining minutes.
    let pool: f64 = donors.iter().map(|&i| rows[i].minutes.max(0.0)).sum();
    if pool <= 0.0 {
        warn!(remaining, "no donor minutes left to absorb transfer surplus");
        return;
    }
    debug!(remaining, pool, "uncapped proportional pass");
    for &idx in donors {
        let current = rows[idx].minutes;
        if current <= 0.0 {
            continue;
        }
        let share = (current / pool).clamp(0.0, 1.0);
        let factor = (1.0 - remaining * share / current).max(0.0);
        rows[idx].scale_workload(factor);
    }
}

fn cover_deficit(rows: &mut [PlayerSeasonRecord], donors: &[usize], deficit: f64) {
    let pool: f64 = donors.iter().map(|&i| rows[i].minutes).sum();
    if pool <= 0.0 {
        warn!(deficit, "donor pool has no minutes; deficit left uncovered");
        return;
    }
    let factor = 1.0 + deficit / pool;
    for &idx in donors {
        rows[idx].scale_workload(factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, minutes: f64, goals: f64) -> PlayerSeasonRecord {
        PlayerSeasonRecord::new(name, "Town FC", minutes).with_count(CountStat::Gls, goals)
    }

    fn incoming(minutes: f64, goals: f64) -> PlayerSeasonRecord {
        PlayerSeasonRecord::new("New Signing", "Away United", minutes).with_count(CountStat::Gls, goals)
    }

    fn find<'a>(rows: &'a [PlayerSeasonRecord], name: &str) -> &'a PlayerSeasonRecord {
        rows.iter().find(|r| r.player == name).unwrap()
    }

    #[test]
    fn outgoing_reduction_scales_counts_and_skips_unknowns() {
        let roster = vec![player("A", 2000.0, 10.0), player("B", 1000.0, 2.0)];
        let scenario = TransferScenario::new(incoming(900.0, 0.0), 0.0)
            .with_outgoing("a", 500.0)
            .with_outgoing("Ghost", 300.0)
            .with_outgoing("B", -10.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());

        // 500 removed from A, then handed back to the outfield pool by the
        // deficit pass (factor 1 + 500/2500).
        let a = find(&out, "A");
        assert!((a.minutes - 1500.0 * 1.2).abs() < 1e-9);
        assert!((a.counts.get(CountStat::Gls).unwrap() - 7.5 * 1.2).abs() < 1e-9);
        assert!((total_minutes(&out) - 3000.0).abs() < 1e-6);
    }

    #[test]
    fn outgoing_fraction_is_clamped_to_whole_season() {
        let roster = vec![player("A", 1000.0, 5.0), player("B", 1000.0, 1.0)];
        let scenario = TransferScenario::new(incoming(900.0, 9.0), 1000.0).with_outgoing("A", 5000.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        let a = find(&out, "A");
        assert_eq!(a.minutes, 0.0);
        assert_eq!(a.counts.get(CountStat::Gls), Some(0.0));
        assert!((total_minutes(&out) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn incoming_projected_from_per90_with_scale() {
        let roster = vec![player("A", 3000.0, 10.0)];
        let scenario = TransferScenario::new(incoming(900.0, 10.0), 450.0).with_cross_league_scale(0.8);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        let inc = find(&out, "New Signing");
        assert_eq!(inc.squad, "Town FC");
        assert_eq!(inc.minutes, 450.0);
        // 1.0 per 90 over 5 full matches, scaled by 0.8
        assert!((inc.counts.get(CountStat::Gls).unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn raw_counts_used_when_no_rate_known() {
        let roster = vec![player("A", 3000.0, 10.0)];
        let scenario = TransferScenario::new(incoming(0.0, 6.0), 0.0).with_cross_league_scale(0.5);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        assert_eq!(find(&out, "New Signing").counts.get(CountStat::Gls), Some(3.0));
    }

    #[test]
    fn capped_pass_takes_from_biggest_donors_first() {
        let roster = vec![
            player("Big", 3000.0, 12.0),
            player("Mid", 2000.0, 4.0),
            player("Small", 1000.0, 1.0),
        ];
        let scenario = TransferScenario::new(incoming(900.0, 0.0), 900.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        // 750 from Big (cap), remaining 150 from Mid.
        assert!((find(&out, "Big").minutes - 2250.0).abs() < 1e-9);
        assert!((find(&out, "Big").counts.get(CountStat::Gls).unwrap() - 9.0).abs() < 1e-9);
        assert!((find(&out, "Mid").minutes - 1850.0).abs() < 1e-9);
        assert_eq!(find(&out, "Small").minutes, 1000.0);
        assert!((total_minutes(&out) - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn goalkeepers_are_not_donors() {
        let roster = vec![
            player("Keeper", 3420.0, 0.0).with_position("GK"),
            player("A", 2000.0, 3.0).with_position("FW"),
            player("B", 2000.0, 3.0),
        ];
        let scenario = TransferScenario::new(incoming(900.0, 3.0), 600.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        assert_eq!(find(&out, "Keeper").minutes, 3420.0);
        assert!((total_minutes(&out) - 7420.0).abs() < 1e-6);
    }

    #[test]
    fn uncapped_pass_covers_large_surplus() {
        let roster = vec![player("A", 1000.0, 4.0), player("B", 1000.0, 2.0)];
        let scenario = TransferScenario::new(incoming(900.0, 9.0), 1500.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        // Capped pass absorbs 500; the remaining 1000 comes off the last 1500.
        assert!((total_minutes(&out) - 2000.0).abs() < 1e-6);
        assert!((find(&out, "A").minutes - 250.0).abs() < 1e-9);
        assert!((find(&out, "B").minutes - 250.0).abs() < 1e-9);
        assert!(out.iter().all(|r| r.counts.get(CountStat::Gls).unwrap() >= 0.0));
    }

    #[test]
    fn surplus_beyond_pool_floors_at_zero() {
        let roster = vec![player("A", 100.0, 4.0)];
        let scenario = TransferScenario::new(incoming(900.0, 9.0), 3000.0);
        let out = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        let a = find(&out, "A");
        assert_eq!(a.minutes, 0.0);
        assert_eq!(a.counts.get(CountStat::Gls), Some(0.0));
    }

    #[test]
    fn input_roster_is_untouched() {
        let roster = vec![player("A", 2000.0, 10.0)];
        let before = roster.clone();
        let scenario = TransferScenario::new(incoming(900.0, 5.0), 900.0).with_outgoing("A", 400.0);
        let _ = apply_transfer(&roster, &scenario, &RedistributionConfig::default());
        assert_eq!(roster, before);
    }
}
