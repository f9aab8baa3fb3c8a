/// Database connection and table creation
pub mod database;

/// Runtime settings loaded from config.toml and the environment
pub mod settings;
