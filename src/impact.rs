use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ImpactConfig;
use crate::error::{ImpactError, ImpactResult};
use crate::feature_vector::{FeatureRow, FeatureVector, assemble};
use crate::player::{PlayerSeasonRecord, name_key};
use crate::predictor::Predictor;
use crate::season::{Season, history_seasons};
use crate::season_store::SeasonStore;
use crate::team_features::{TeamSeasonFeatures, extract_team_features};
use crate::transfer::{TransferScenario, apply_transfer};

/// What-if request as a caller states it; the incoming player is looked up by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub incoming_player: String,
    /// When set, must be the season immediately before the target.
    #[serde(default)]
    pub incoming_source_season: Option<Season>,
    pub projected_minutes: f64,
    #[serde(default)]
    pub outgoing_minutes: BTreeMap<String, f64>,
    #[serde(default = "default_scale")]
    pub cross_league_scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl TransferRequest {
    pub fn new(incoming_player: &str, projected_minutes: f64) -> Self {
        Self {
            incoming_player: incoming_player.to_string(),
            incoming_source_season: None,
            projected_minutes,
            outgoing_minutes: BTreeMap::new(),
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

/// Predicted outcome with and without the transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferImpact {
    pub season_target: Season,
    pub season_features_from: Season,
    pub points_base: f64,
    pub points_with: f64,
    pub delta: f64,
}

/// Builds feature vectors from a season store and scores them with an
/// injected predictor. Holds no mutable state; every call reloads from the store.
pub struct ImpactEngine<'a, S: SeasonStore + ?Sized, P: Predictor + ?Sized> {
    store: &'a S,
    predictor: &'a P,
    config: ImpactConfig,
}

impl<'a, S: SeasonStore + ?Sized, P: Predictor + ?Sized> ImpactEngine<'a, S, P> {
    pub fn new(store: &'a S, predictor: &'a P, config: &'a ImpactConfig) -> Self {
        Self {
            store,
            predictor,
            config: config.clone().sanitized(),
        }
    }

    pub fn baseline_vector(&self, team: &str, target: Season) -> ImpactResult<FeatureVector> {
        let seasons = self.history_seasons(target)?;
        let (rows, present_in_latest) = self.team_history(team, &seasons, None)?;
        debug!(team, %target, history_len = rows.len(), "baseline history");
        Ok(assemble(
            target,
            team,
            &rows,
            present_in_latest,
            &self.config.history,
        ))
    }

    pub fn scenario_vector(
        &self,
        team: &str,
        target: Season,
        request: &TransferRequest,
    ) -> ImpactResult<FeatureVector> {
        let prev = target.previous();
        if let Some(source) = request.incoming_source_season
            && source != prev
        {
            return Err(ImpactError::HistoryContinuity {
                expected: prev,
                found: Some(source),
            });
        }

        let seasons = self.history_seasons(target)?;
        if seasons.first() != Some(&prev) {
            return Err(ImpactError::HistoryContinuity {
                expected: prev,
                found: seasons.first().copied(),
            });
        }

        let pool = self.store.load_players(prev)?;
        let roster: Vec<PlayerSeasonRecord> = pool
            .iter()
            .filter(|r| r.plays_for(team) && r.in_competition(&self.config.league_name))
            .cloned()
            .collect();
        if roster.is_empty() {
            return Err(ImpactError::TeamNotFound {
                team: team.to_string(),
                season: prev,
            });
        }

        let wanted = name_key(&request.incoming_player);
        let Some(incoming) = pool.iter().find(|r| name_key(&r.player) == wanted) else {
            return Err(ImpactError::PlayerNotFound {
                player: request.incoming_player.clone(),
                season: prev,
            });
        };

        let scenario = TransferScenario {
            outgoing_minutes: request.outgoing_minutes.clone(),
            incoming: incoming.clone(),
            projected_minutes: request.projected_minutes,
            cross_league_scale: request.cross_league_scale,
        };
        let simulated = apply_transfer(&roster, &scenario, &self.config.redistribution);
        let spliced = extract_team_features(&roster[0].squad, &simulated);
        info!(
            team,
            %target,
            incoming = %incoming.player,
            projected_minutes = request.projected_minutes,
            team_minutes = spliced.team_minutes(),
            "simulated transfer"
        );

        let (rows, present_in_latest) = self.team_history(team, &seasons, Some((prev, spliced)))?;
        Ok(assemble(
            target,
            team,
            &rows,
            present_in_latest,
            &self.config.history,
        ))
    }

    /// Lays `vector` out in the predictor's declared column order.
    pub fn feature_row(&self, vector: &FeatureVector) -> ImpactResult<FeatureRow> {
        vector.to_row(self.predictor.feature_columns())
    }

    pub fn predict(&self, vector: &FeatureVector) -> ImpactResult<f64> {
        let row = self.feature_row(vector)?;
        self.predictor.predict(&row)
    }

    /// Scores the team with and without the transfer.
    pub fn compare(
        &self,
        team: &str,
        target: Season,
        request: &TransferRequest,
    ) -> ImpactResult<TransferImpact> {
        let base = self.baseline_vector(team, target)?;
        let with = self.scenario_vector(team, target, request)?;
        let points_base = self.predict(&base)?;
        let points_with = self.predict(&with)?;
        Ok(TransferImpact {
            season_target: target,
            season_features_from: target.previous(),
            points_base,
            points_with,
            delta: points_with - points_base,
        })
    }

    fn history_seasons(&self, target: Season) -> ImpactResult<Vec<Season>> {
        let available = self.store.available_seasons()?;
        Ok(history_seasons(target, &available))
    }

    /// Team feature rows for `seasons` (most recent first), skipping seasons the
    /// team has no rows in. `replace` substitutes one season's row.
    fn team_history(
        &self,
        team: &str,
        seasons: &[Season],
        mut replace: Option<(Season, TeamSeasonFeatures)>,
    ) -> ImpactResult<(Vec<TeamSeasonFeatures>, bool)> {
        let mut out = Vec::with_capacity(seasons.len());
        let mut present_in_latest = seasons.is_empty();
        for (idx, &season) in seasons.iter().enumerate() {
            let row = match replace.take_if(|(s, _)| *s == season) {
                Some((_, features)) => Some(features),
                None => self.team_row(team, season)?,
            };
            if let Some(row) = row {
                if idx == 0 {
                    present_in_latest = true;
                }
                out.push(row);
            }
        }
        Ok((out, present_in_latest))
    }

    fn team_row(&self, team: &str, season: Season) -> ImpactResult<Option<TeamSeasonFeatures>> {
        let rows: Vec<PlayerSeasonRecord> = self
            .store
            .load_players(season)?
            .into_iter()
            .filter(|r| r.plays_for(team) && r.in_competition(&self.config.league_name))
            .collect();
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(extract_team_features(&rows[0].squad, &rows)))
    }
}
