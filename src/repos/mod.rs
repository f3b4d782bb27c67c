pub mod guild_settings_repo;
pub mod progress_repo;

pub use guild_settings_repo::{GuildSettings, GuildSettingsRepo};
pub use progress_repo::{LeaderboardEntry, ProgressRepo, UserProgress};
