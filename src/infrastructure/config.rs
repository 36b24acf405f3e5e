use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{
    config::TwiconConfig,
    error::{TwiconError, TwiconResult},
};

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> TwiconResult<Self> {
        Ok(Self {
            global_config_path: Self::get_global_config_path()?,
        })
    }

    /// Load the configuration, falling back to defaults when no file
    /// exists yet.
    pub fn load_config(&self) -> TwiconResult<TwiconConfig> {
        let config = if self.global_config_path.exists() {
            self.load_config_from_path(&self.global_config_path)?
        } else {
            TwiconConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to the global path.
    pub fn save_config(&self, config: &TwiconConfig) -> TwiconResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TwiconError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }
        self.save_config_to_path(&self.global_config_path, config)
    }

    /// Path the global configuration lives at.
    pub fn global_config_path(&self) -> &Path {
        &self.global_config_path
    }

    fn get_global_config_path() -> TwiconResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| TwiconError::Config {
            message: "Could not determine user config directory".to_string(),
        })?;
        Ok(base.join("twicon").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_config_from_path(&self, path: &Path) -> TwiconResult<TwiconConfig> {
        let content = fs::read_to_string(path).map_err(|e| TwiconError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: TwiconConfig = toml::from_str(&content).map_err(|e| TwiconError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_config_to_path(&self, path: &Path, config: &TwiconConfig) -> TwiconResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| TwiconError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;
        fs::write(path, content).map_err(|e| TwiconError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }
}
