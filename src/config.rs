//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `config.toml` in the platform config dir)
//! 3. `NEARDUPE_*` environment variables (e.g. `NEARDUPE_TEXT_THRESHOLD=4`)
//! 4. CLI flags, applied with the `merge_*` methods
//!
//! Ranges are checked by [`Config::validate`] once every layer is applied.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{GroupArgs, GroupsArgs};
use crate::duplicates::{
    GroupingConfig, DEFAULT_PARTIAL_THRESHOLD, DEFAULT_TEXT_THRESHOLD, DEFAULT_VISUAL_THRESHOLD,
};
use crate::similarity::{DEFAULT_MAX_SKEW, DEFAULT_PAGE_MATCH_THRESHOLD};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "NEARDUPE_";

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be parsed or had the wrong type.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("Failed to write configuration to {path}: {source}")]
    Io {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path; the platform data dir is used when unset.
    pub database: Option<PathBuf>,
    /// Maximum text fingerprint distance in bits.
    pub text_threshold: u32,
    /// Maximum median page distance in bits.
    pub visual_threshold: u32,
    /// Minimum containment ratio for partial matches.
    pub partial_threshold: f64,
    /// Maximum distance for two pages to count as the same page.
    pub page_match_threshold: u32,
    /// Maximum page-count skew tolerated by alignment.
    pub max_page_skew: f64,
    /// Only group documents of this kind.
    pub file_kind: Option<String>,
    /// Groups per page when listing.
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            visual_threshold: DEFAULT_VISUAL_THRESHOLD,
            partial_threshold: DEFAULT_PARTIAL_THRESHOLD,
            page_match_threshold: DEFAULT_PAGE_MATCH_THRESHOLD,
            max_page_skew: DEFAULT_MAX_SKEW,
            file_kind: None,
            page_size: 50,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a layer fails to parse. A missing file
    /// is not an error. Values are not range-checked here, since CLI flags may
    /// still override them; call [`Config::validate`] after merging.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_path(path),
            None => Self::from_figment(Figment::from(Serialized::defaults(Self::default()))),
        }
    }

    /// Load defaults, the TOML file at `path` and environment overrides.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?)
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Serialize`].
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?).map_err(io_err)
    }

    /// Platform-specific default config file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "neardupe", "neardupe")
    }

    /// Database path, falling back to the platform data dir.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("neardupe.db"))
                .unwrap_or_else(|| PathBuf::from("neardupe.db"))
        })
    }

    /// Check all thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".to_string()));
        }
        self.grouping_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Apply flags from the group subcommand.
    pub fn merge_group_args(&mut self, args: &GroupArgs) {
        if let Some(ref database) = args.database {
            self.database = Some(database.clone());
        }
        if let Some(bits) = args.text_threshold {
            self.text_threshold = bits;
        }
        if let Some(bits) = args.visual_threshold {
            self.visual_threshold = bits;
        }
        if let Some(ratio) = args.partial_threshold {
            self.partial_threshold = ratio;
        }
        if let Some(bits) = args.page_match_threshold {
            self.page_match_threshold = bits;
        }
        if let Some(skew) = args.max_page_skew {
            self.max_page_skew = skew;
        }
        if let Some(ref kind) = args.file_kind {
            self.file_kind = Some(kind.clone());
        }
    }

    /// Apply flags from the groups subcommand.
    pub fn merge_groups_args(&mut self, args: &GroupsArgs) {
        if let Some(ref database) = args.database {
            self.database = Some(database.clone());
        }
        if let Some(size) = args.page_size {
            self.page_size = size;
        }
    }

    /// Grouping configuration for these settings, without a progress callback.
    #[must_use]
    pub fn grouping_config(&self) -> GroupingConfig {
        let config = GroupingConfig::default()
            .with_text_threshold(self.text_threshold)
            .with_visual_threshold(self.visual_threshold)
            .with_partial_threshold(self.partial_threshold)
            .with_page_match_threshold(self.page_match_threshold)
            .with_max_page_skew(self.max_page_skew);
        match self.file_kind {
            Some(ref kind) => config.with_file_kind(kind.clone()),
            None => config,
        }
    }
}
