//! XP, levels and level rewards.

pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod query;

pub use config::{ConfigService, MultiplierChange};
pub use engine::{AwardEngine, AwardOutcome, MessageEvent};
pub use error::LevelingError;
pub use gateway::{Gateway, RoleInfo, SerenityGateway};
pub use query::{LevelQueries, RankQuery, SettingsView};
