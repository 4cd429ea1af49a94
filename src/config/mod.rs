/// Database configuration and connection management
pub mod database;

/// Plan type reference data loading from config.toml
pub mod plans;

/// Environment-driven application settings
pub mod settings;

pub use settings::Settings;
