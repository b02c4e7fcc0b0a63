// Utility functions module
pub mod config;
pub mod cooldown;
pub mod discord;
pub mod error_log;
pub mod formatters;
pub mod purge;
pub mod sessions;
