//! CLI configuration: `stepline.yaml` plus `STEPLINE_` environment overrides.
//!
//! The config file is looked up in order:
//! - the path in `STEPLINE_CONFIG`
//! - `./stepline.yaml`
//! - `<user config dir>/stepline/config.yaml`
//!
//! A missing file yields defaults. `STEPLINE_BUNDLES` (comma-separated) is
//! appended to the file's bundle list and `STEPLINE_BUNDLE_DIR` replaces
//! its bundle directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const LOCAL_CONFIG_FILE: &str = "stepline.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// External handler bundle identifiers.
    #[serde(default)]
    pub bundles: Vec<String>,

    /// Base directory for relative bundle identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_dir: Option<PathBuf>,

    /// File this configuration was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Environment variables prefixed with `STEPLINE_`.
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub config: Option<PathBuf>,
    pub bundles: Option<String>,
    pub bundle_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STEPLINE_").from_env::<EnvOverrides>()
    }
}

impl Config {
    /// Load the configuration for this process.
    pub fn load() -> Result<Self> {
        let overrides = EnvOverrides::from_env().context("Invalid STEPLINE_ environment variables")?;
        let mut config = match Self::locate(overrides.config.as_deref()) {
            Some(path) => Self::from_path(&path)?,
            None => Config::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    /// Read a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Merge environment overrides into this configuration.
    pub fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(list) = overrides.bundles {
            self.bundles.extend(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(dir) = overrides.bundle_dir {
            self.bundle_dir = Some(dir);
        }
    }

    /// Directory relative bundle identifiers are resolved against.
    pub fn bundle_base(&self) -> PathBuf {
        if let Some(ref dir) = self.bundle_dir {
            return dir.clone();
        }
        self.source
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("stepline").join("config.yaml"))
            .filter(|p| p.is_file())
    }
}
