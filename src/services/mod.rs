// Stateful services shared through Data
pub mod config_manager;
pub mod config_validator;
pub mod scheduler;
