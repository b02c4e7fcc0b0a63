// Data models
pub mod entries;
pub mod guild_snapshot;
pub mod server_config;
