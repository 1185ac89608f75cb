//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (or `--config PATH`)
//! 3. `COPYVERIFY_*` environment variables (`__` separates nested keys,
//!    e.g. `COPYVERIFY_COPY__RETRIES=5`)
//! 4. CLI flags, applied by the caller after loading
//!
//! ```toml
//! cache_dir = "/var/lib/copyverify/projects"
//! parallel_hashing = true
//!
//! [copy]
//! program = "rsync"
//! args = ["-a", "{source}/", "{destination}/"]
//! fatal_threshold = 1
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::default_storage_dir;
use crate::copy::CopyOptions;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "COPYVERIFY_";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding project cache stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for copy and verification logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Hash source and destination of each file concurrently
    pub parallel_hashing: bool,

    /// External copy program settings
    pub copy: CopyOptions,
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be parsed or did not match the schema.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// The effective config could not be rendered as TOML.
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// No platform directories could be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,
}

impl Config {
    /// The layered figment without CLI overrides.
    ///
    /// `path` replaces the default config file location. A missing file is
    /// not an error.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match path.map(Path::to_path_buf).or_else(Self::default_config_path) {
            Some(file) => {
                log::debug!("Reading config from {}", file.display());
                figment = figment.merge(Toml::file(file));
            }
            None => log::debug!("No config directory available, using defaults"),
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Extract`] if the TOML file or an environment
    /// variable is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(path).extract().map_err(|e| Box::new(e).into())
    }

    /// Default `config.toml` location.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "copyverify", "copyverify")
    }

    /// Directory for project cache stores.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if no directory is configured
    /// and none can be derived for the platform.
    pub fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_storage_dir().map_err(|_| ConfigError::NoProjectDirs),
        }
    }

    /// Directory for copy and verification logs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if no directory is configured
    /// and none can be derived for the platform.
    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("logs"))
                .ok_or(ConfigError::NoProjectDirs),
        }
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
