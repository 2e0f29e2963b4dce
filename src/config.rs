//! Runtime configuration stored in `config.toml`.
//!
//! Only the keys the GPU modifier consumes are modelled; every other key in
//! the file is ignored. Missing keys fall back to defaults.
//!
//! ```toml
//! [nvidia-container-cli]
//! root = "/run/nvidia/driver"
//!
//! [nvidia-container-runtime]
//! discover-mode = "auto"
//! log-level = "info"
//!
//! [nvidia-ctk]
//! path = "nvidia-ctk"
//! ```

use crate::constants::{
    CONFIG_FILE_RELATIVE_PATH, DEFAULT_CONFIG_PATH, DEFAULT_DISCOVER_MODE, NVIDIA_CTK,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub nvidia_container_cli: ContainerCliConfig,
    pub nvidia_container_runtime: RuntimeConfig,
    pub nvidia_ctk: CtkConfig,
}

/// `[nvidia-container-cli]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContainerCliConfig {
    /// Root of the driver installation; empty means `/`.
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `[nvidia-container-runtime]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// `auto`, `legacy` or `csv`. Validated when the modifier is built.
    pub discover_mode: String,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            discover_mode: DEFAULT_DISCOVER_MODE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// `[nvidia-ctk]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CtkConfig {
    /// Executable name or path of `nvidia-ctk`.
    pub path: String,
}

impl Default for CtkConfig {
    fn default() -> Self {
        Self {
            path: NVIDIA_CTK.to_string(),
        }
    }
}

impl Config {
    /// Parses a config from TOML text.
    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Loads the config from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads the config from its default location.
    pub fn load_default() -> Result<Self> {
        let xdg_config_home = std::env::var("XDG_CONFIG_HOME").ok();
        Self::load(&config_path(xdg_config_home.as_deref()))
    }

    /// Returns the driver root as a path.
    pub fn root(&self) -> PathBuf {
        match self.nvidia_container_cli.root.as_str() {
            "" => PathBuf::from("/"),
            root => PathBuf::from(root),
        }
    }
}

/// Returns the config file location, honoring `$XDG_CONFIG_HOME`.
pub fn config_path(xdg_config_home: Option<&str>) -> PathBuf {
    match xdg_config_home {
        Some(dir) if !dir.is_empty() => Path::new(dir).join(CONFIG_FILE_RELATIVE_PATH),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}
