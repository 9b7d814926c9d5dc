//! Configuration management
//!
//! Settings live in a TOML file, by default `<config dir>/wagon/config.toml`.
//! `WAGON_CONFIG_DIR` overrides the directory. A missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_CHUNK_SIZE;
use crate::copy_tool::DEFAULT_EXECUTABLE;
use crate::error::{Error, Result};

/// Environment variable naming the configuration directory
pub const CONFIG_DIR_ENV: &str = "WAGON_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Bucket/object store settings. Unset values fall back to the SDK's own
/// provider chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Whether last-modified checks may be used for conditional gets
    pub conditional_get: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            force_path_style: false,
            access_key: None,
            secret_key: None,
            conditional_get: true,
        }
    }
}

/// Keyed-blob store settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsConfig {
    /// Skip credential discovery and access public buckets only
    pub anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyToolConfig {
    pub executable: PathBuf,
}

impl Default for CopyToolConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes moved per upload/download window
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub s3: S3Config,
    pub gs: GsConfig,
    pub copy_tool: CopyToolConfig,
    pub transfer: TransferConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.transfer.chunk_size == 0 {
            return Err(Error::Config("transfer.chunk_size must be positive".into()));
        }
        if self.s3.access_key.is_some() != self.s3.secret_key.is_some() {
            return Err(Error::Config(
                "s3.access_key and s3.secret_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Locates and loads the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Resolve the configuration directory from the environment, then the
    /// platform config directory.
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".into()))?
                .join("wagon"),
        };
        Ok(Self::with_dir(dir))
    }

    /// Use `dir` as the configuration directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<Config> {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => {
                tracing::debug!(path = %self.config_path.display(), "Loaded configuration");
                Config::from_toml(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(Error::Config(format!(
                "Cannot read {}: {e}",
                self.config_path.display()
            ))),
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Cannot serialize configuration: {e}")))?;
        std::fs::write(&self.config_path, content).map_err(|e| {
            Error::Config(format!("Cannot write {}: {e}", self.config_path.display()))
        })
    }
}
