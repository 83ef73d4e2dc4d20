/// Access code seeding from config.toml
pub mod access_codes;

/// Database configuration and connection management
pub mod database;

/// Environment-driven application settings
pub mod settings;
