use thiserror::Error;

use crate::season::Season;

#[derive(Debug, Error)]
pub enum ImpactError {
    #[error("team `{team}` has no player rows in {season}")]
    TeamNotFound { team: String, season: Season },

    #[error("incoming player `{player}` not found in the {season} player pool")]
    PlayerNotFound { player: String, season: Season },

    #[error("expected most recent history season {expected}, found {}", describe(.found))]
    HistoryContinuity {
        expected: Season,
        found: Option<Season>,
    },

    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe(season: &Option<Season>) -> String {
    season.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
}

pub type ImpactResult<T> = std::result::Result<T, ImpactError>;
