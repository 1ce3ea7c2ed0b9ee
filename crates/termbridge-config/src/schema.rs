//! Configuration schema types for the terminal session bridge.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Session Config
// =============================================================================

/// Settings applied to every spawned interactive process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Program to run. `None` means the user's default shell.
    pub shell: Option<String>,
    /// Start unix shells as login shells (`-l`).
    pub login_shell: bool,
    /// Value of `TERM` inside the session.
    pub term: String,
    /// Initial terminal rows (valid range: 1-500).
    pub rows: u16,
    /// Initial terminal columns (valid range: 1-500).
    pub cols: u16,
    /// Extra environment variables set in the child, on top of the
    /// sanitized inherited set.
    pub env: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: None,
            login_shell: true,
            term: "xterm-256color".into(),
            rows: 24,
            cols: 80,
            env: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Bridge Config
// =============================================================================

/// Tuning knobs for the output delivery path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeTuning {
    /// Capacity of the ordered output event channel, in chunks
    /// (valid range: 1-4096). A full channel back-pressures the
    /// session read loop instead of dropping chunks.
    pub output_capacity: usize,
    /// Maximum bytes read from a pty in one pass (valid range: 512-1048576).
    pub read_chunk: usize,
}

impl Default for BridgeTuning {
    fn default() -> Self {
        Self {
            output_capacity: 64,
            read_chunk: 8_192,
        }
    }
}

// =============================================================================
// Logging Config
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level directive (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// =============================================================================
// Top-level Config
// =============================================================================

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub session: SessionConfig,
    pub bridge: BridgeTuning,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_config() {
        let session = SessionConfig::default();
        assert!(session.shell.is_none());
        assert!(session.login_shell);
        assert_eq!(session.term, "xterm-256color");
        assert_eq!(session.rows, 24);
        assert_eq!(session.cols, 80);
        assert!(session.env.is_empty());
    }

    #[test]
    fn default_bridge_tuning() {
        let tuning = BridgeTuning::default();
        assert_eq!(tuning.output_capacity, 64);
        assert_eq!(tuning.read_chunk, 8_192);
    }

    #[test]
    fn empty_toml_deserializes_to_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.session.rows, 24);
        assert_eq!(config.bridge.output_capacity, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
[session]
shell = "/bin/zsh"
rows = 40

[session.env]
EDITOR = "vim"
"#,
        )
        .unwrap();
        assert_eq!(config.session.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.session.rows, 40);
        assert_eq!(config.session.cols, 80);
        assert_eq!(config.session.env.get("EDITOR").unwrap(), "vim");
        assert_eq!(config.bridge.read_chunk, 8_192);
    }
}
