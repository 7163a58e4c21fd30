pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_vector;
pub mod history;
pub mod impact;
pub mod player;
pub mod predictor;
pub mod season;
pub mod season_store;
pub mod team_features;
pub mod transfer;

pub use config::{ImpactConfig, load_config};
pub use error::{ImpactError, ImpactResult};
pub use feature_vector::{FeatureRow, FeatureValue, FeatureVector, default_schema};
pub use impact::{ImpactEngine, TransferImpact, TransferRequest};
pub use predictor::{LinearPredictor, Predictor, load_linear_predictor};
pub use season::Season;
pub use season_store::{CsvSeasonStore, MemoryStore, SeasonStore};
