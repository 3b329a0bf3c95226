use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SidecarError};

/// Where the sidecar lives and how to reach its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_base_address")]
    pub base_address: String,

    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Per-request timeout. Unset means the transport's own behaviour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_base_address() -> String {
    "http://localhost:8081".to_string()
}
fn default_registry_path() -> String {
    "/registry".to_string()
}
fn default_rpc_path() -> String {
    "/rpc".to_string()
}
fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            registry_path: default_registry_path(),
            rpc_path: default_rpc_path(),
            health_path: default_health_path(),
            timeout_secs: None,
        }
    }
}

impl SidecarConfig {
    /// Defaults pointed at another sidecar address.
    pub fn with_base_address(base_address: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            ..Self::default()
        }
    }

    /// Load config from ~/.config/carlink/config.toml, creating defaults if missing.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = SidecarConfig::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SidecarError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: SidecarConfig = toml::from_str(&contents)
            .map_err(|e| SidecarError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| SidecarError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SidecarError::Config("Could not determine config directory".into()))?;
        Ok(config_dir.join("carlink").join("config.toml"))
    }

    /// Check the base address parses and every endpoint path is absolute.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_address).map_err(|e| {
            SidecarError::Config(format!("Invalid base address {:?}: {e}", self.base_address))
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(SidecarError::Config(format!(
                "Base address must be an http(s) URL: {:?}",
                self.base_address
            )));
        }

        for (name, path) in [
            ("registry_path", &self.registry_path),
            ("rpc_path", &self.rpc_path),
            ("health_path", &self.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(SidecarError::Config(format!(
                    "{name} must begin with '/': {path:?}"
                )));
            }
        }
        Ok(())
    }
}
