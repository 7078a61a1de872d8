//! Configuration for the pulselink agent.

use crate::output::OutputSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identity criteria for the auto-connect flow
    pub auto_connect: AutoConnectConfig,

    /// Whether the heart-rate monitor streams indefinitely rather than
    /// taking a one-shot measurement
    pub continuous_mode: bool,

    /// Output sink toggles and targets
    pub outputs: OutputSettings,

    /// Path for sink output files when relative paths are configured
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulselink");

        Self {
            auto_connect: AutoConnectConfig::default(),
            continuous_mode: true,
            outputs: OutputSettings::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulselink")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Resolve the configured sink file paths against `data_path`.
    /// Absolute paths are kept as-is.
    pub fn resolved_outputs(&self) -> OutputSettings {
        let mut outputs = self.outputs.clone();
        if outputs.file_path.is_relative() {
            outputs.file_path = self.data_path.join(&outputs.file_path);
        }
        if outputs.csv_path.is_relative() {
            outputs.csv_path = self.data_path.join(&outputs.csv_path);
        }
        outputs
    }
}

/// Identity criteria consumed by the auto-connect flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoConnectConfig {
    /// Whether auto-connect runs at startup
    pub enabled: bool,
    /// Exact advertised name of the target device
    pub device_name: String,
    /// Hardware revision tag ("2"/"3" or "4"/"5"); validated when the
    /// flow starts, not at load time
    pub device_version: String,
    /// Pre-shared auth key, required by revisions "4"/"5"
    pub auth_key: Option<String>,
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device_name: String::new(),
            device_version: "4".to_string(),
            auth_key: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.continuous_mode);
        assert!(!config.auto_connect.enabled);
        assert!(!config.outputs.file);
        assert!(!config.outputs.csv);
        assert!(config.outputs.osc);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.auto_connect.device_name = "MiBand".to_string();
        config.auto_connect.auth_key = Some("abc".to_string());
        config.outputs.csv = true;
        config.continuous_mode = false;

        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.auto_connect.device_name, "MiBand");
        assert_eq!(loaded.auto_connect.auth_key.as_deref(), Some("abc"));
        assert!(loaded.outputs.csv);
        assert!(!loaded.continuous_mode);
    }

    #[test]
    fn test_resolved_outputs_joins_relative_paths() {
        let mut config = Config::default();
        config.data_path = PathBuf::from("/tmp/pulselink-data");

        let outputs = config.resolved_outputs();
        assert_eq!(
            outputs.file_path,
            PathBuf::from("/tmp/pulselink-data/heartrate.txt")
        );
        assert_eq!(
            outputs.csv_path,
            PathBuf::from("/tmp/pulselink-data/heartrate.csv")
        );

        config.outputs.csv_path = PathBuf::from("/var/log/hr.csv");
        assert_eq!(
            config.resolved_outputs().csv_path,
            PathBuf::from("/var/log/hr.csv")
        );
    }
}
