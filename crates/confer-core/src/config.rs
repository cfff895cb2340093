use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConferError, Result};
use crate::types::BusinessProfile;

/// Top-level configuration for the Confer application.
///
/// Loaded from `~/.confer/config.toml` by default. Each section corresponds
/// to one concern of the session layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    /// Business-profile variables substituted into prompt templates,
    /// written as a flat `[profile]` table of string pairs.
    #[serde(default)]
    pub profile: BusinessProfile,
}

impl Default for ConferConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            quota: QuotaConfig::default(),
            chat: ChatConfig::default(),
            profile: BusinessProfile::default(),
        }
    }
}

impl ConferConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConferConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConferError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for SQLite and the local key/value files.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.confer/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Anonymous interaction quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Interactions an anonymous device may perform per calendar day.
    pub daily_limit: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { daily_limit: 5 }
    }
}

/// Chat behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prompt card used when a new session names no theme.
    pub default_theme_id: String,
    /// Title given to sessions created straight from a message send.
    pub default_title: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_theme_id: "business-plan".to_string(),
            default_title: "New chat".to_string(),
        }
    }
}
