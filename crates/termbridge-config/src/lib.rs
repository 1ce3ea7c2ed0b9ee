//! Termbridge configuration system.
//!
//! TOML-based configuration for the session bridge. All sections use
//! sensible defaults so partial configs work out of the box.

pub mod errors;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use errors::ConfigError;
pub use schema::BridgeConfig;

/// Convenience function to load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creates a default
/// if none exists, and validates the result.
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}
