use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::DeviceSelector;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "launchpad.json";

const POLL_INTERVAL_RANGE_MS: (u64, u64) = (1, 10_000);

/// Device and listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchpadConfig {
    /// Input port; `None` runs output-only
    pub input: Option<DeviceSelector>,
    /// Output port; `None` runs input-only
    pub output: Option<DeviceSelector>,
    pub poll_interval_ms: u64,
}

impl LaunchpadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for LaunchpadConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            poll_interval_ms: 100,
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub config: LaunchpadConfig,
    pub created_at: String,
    pub modified_at: String,
}

/// Loads and saves [`LaunchpadConfig`] as JSON.
pub struct ConfigManager {
    config_path: PathBuf,
    config: LaunchpadConfig,
    created_at: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'launchpad.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            config: LaunchpadConfig::default(),
            created_at: None,
        }
    }

    /// Load the configuration file, writing defaults first if it doesn't exist.
    pub fn load(&mut self) -> Result<LaunchpadConfig, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            tracing::warn!(
                "Config file version {} doesn't match library version {}",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate(&config_file.config)?;

        self.config = config_file.config;
        self.created_at = Some(config_file.created_at);
        Ok(self.config.clone())
    }

    /// Save the current configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: self.config.clone(),
            created_at: self.created_at.clone().unwrap_or_else(|| now.clone()),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, replace and save the configuration
    pub fn update(&mut self, config: LaunchpadConfig) -> Result<(), ConfigError> {
        Self::validate(&config)?;
        self.config = config;
        self.save()
    }

    pub fn validate(config: &LaunchpadConfig) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let (min, max) = POLL_INTERVAL_RANGE_MS;
        if !(min..=max).contains(&config.poll_interval_ms) {
            errors.push(format!(
                "poll_interval_ms must be between {} and {}",
                min, max
            ));
        }

        if let Some(DeviceSelector::Name(name)) = &config.input {
            if name.is_empty() {
                errors.push("input device name is empty".to_string());
            }
        }
        if let Some(DeviceSelector::Name(name)) = &config.output {
            if name.is_empty() {
                errors.push("output device name is empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(errors))
        }
    }

    pub fn config(&self) -> &LaunchpadConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
