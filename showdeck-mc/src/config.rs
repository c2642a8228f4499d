//! Configuration management for the showdeck media controller
//!
//! Bootstrap configuration comes from a TOML file; anything that can change
//! at runtime goes through the API instead. Missing values fall back to
//! built-in defaults defined here in code, not in external files.
//!
//! Settings sources priority:
//! 1. Command-line arguments (--port, --config)
//! 2. Environment variables (SHOWDECK_MC_PORT)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime; restart to pick up changes.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Native backend discovery settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Simulated decoder settings
    #[serde(default)]
    pub simulated: SimulatedConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            backend: BackendConfig::default(),
            simulated: SimulatedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Native decoder backend discovery settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    /// Extra directories searched for the native decoding library, tried
    /// before the install/executable directories
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,

    /// Skip probing entirely and run on the simulated decoder
    #[serde(default)]
    pub force_simulated: bool,
}

/// Simulated decoder settings
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedConfig {
    /// Virtual media duration in seconds reported for every loaded item
    #[serde(default = "default_simulated_duration")]
    pub duration_secs: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_simulated_duration(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5746
}

fn default_simulated_duration() -> f64 {
    100.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file is not an error: the built-in defaults apply, since
    /// running without a config file is the common dev case. This runs before
    /// the tracing subscriber exists, so it stays silent; the caller logs
    /// where the config came from.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5746);
        assert_eq!(config.simulated.duration_secs, 100.0);
        assert!(!config.backend.force_simulated);
        assert!(config.backend.search_dirs.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            port = 6000

            [backend]
            search_dirs = ["/opt/showdeck/lib"]
            force_simulated = true

            [simulated]
            duration_secs = 30.0

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.port, 6000);
        assert!(config.backend.force_simulated);
        assert_eq!(config.backend.search_dirs.len(), 1);
        assert_eq!(config.simulated.duration_secs, 30.0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_partial_config_fills_defaults() {
        let raw = r#"
            [simulated]
            duration_secs = 42.5
        "#;

        let config: TomlConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.port, 5746);
        assert_eq!(config.simulated.duration_secs, 42.5);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = TomlConfig::load(Path::new("/nonexistent/showdeck.toml")).unwrap();
        assert_eq!(config.port, 5746);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("showdeck.toml");
        std::fs::write(&path, "port = \"not a number").unwrap();

        let err = TomlConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
