//! Configuration validation.
//!
//! Validates numeric ranges and the logging level directive.

use crate::errors::ConfigError;
use crate::schema::BridgeConfig;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    // Geometry constraints (the pty rejects absurd sizes anyway; catch
    // them here with a readable message)
    validate_range(&mut errors, "session.rows", config.session.rows as u64, 1, 500);
    validate_range(&mut errors, "session.cols", config.session.cols as u64, 1, 500);

    // Bridge tuning constraints
    validate_range(
        &mut errors,
        "bridge.output_capacity",
        config.bridge.output_capacity as u64,
        1,
        4096,
    );
    validate_range(
        &mut errors,
        "bridge.read_chunk",
        config.bridge.read_chunk as u64,
        512,
        1_048_576,
    );

    // Logging level must parse as a directive
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(format!(
            "logging.level must be one of {LEVELS:?}, got '{}'",
            config.logging.level
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, field: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{field} must be in range {min}-{max}, got {value}"));
    }
}
