//! Configuration loaded from `~/.config/devmon/config.toml`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::client::DEFAULT_ENDPOINT;
use crate::llm::service::DEFAULT_MODEL;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub llm: LlmConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("devmon").join("config.toml"))
    }

    /// Load the default config file when it exists, defaults otherwise.
    pub fn load_default() -> Self {
        Self::default_path()
            .filter(|p| p.exists())
            .and_then(|p| Self::load(&p).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Rows older than this are archived (hours).
    pub retention_hours: u64,
    /// Seconds between persisted snapshots.
    pub snapshot_interval_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            retention_hours: 72,
            snapshot_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "tokyo-night".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.general.retention_hours, 72);
        assert_eq!(config.general.snapshot_interval_secs, 5);
        assert_eq!(config.llm.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"mistral\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.general.retention_hours, 72);
    }
}
