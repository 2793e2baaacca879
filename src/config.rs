//! Configuration system using TOML files.
//!
//! Config is only read from a path given explicitly (`--config` or the
//! `LYRICS_KEEPER_CONFIG` environment variable). Without one, defaults
//! apply. Command-line flags override whatever the file says.
//!
//! ```toml
//! [paths]
//! base_dir = "/home/me/songs"
//! metadata = "song_metadata.yml"
//! output = "consolidated_songs.yml"
//!
//! [store]
//! keep_backups = true
//!
//! [watch]
//! debounce_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the archive and its documents live
    pub paths: PathsConfig,

    /// Document write settings
    pub store: StoreConfig,

    /// Watcher settings
    pub watch: WatchConfig,
}

/// Archive and document locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Archive root (defaults to the working directory)
    pub base_dir: Option<PathBuf>,

    /// Metadata document, relative to `base_dir` unless absolute
    pub metadata: PathBuf,

    /// Consolidated lyrics document, relative to `base_dir` unless absolute
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            metadata: PathBuf::from("song_metadata.yml"),
            output: PathBuf::from("consolidated_songs.yml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Keep a `.bak` copy of each document before overwriting it
    pub keep_backups: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { keep_backups: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a burst of changes is handled
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_dir: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Fully resolved settings the commands run with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub metadata: PathBuf,
    pub output: PathBuf,
    pub keep_backups: bool,
    pub debounce: Duration,
}

impl Config {
    /// Apply command-line overrides and resolve document paths.
    pub fn resolve(&self, overrides: Overrides) -> Settings {
        let base_dir = overrides
            .base_dir
            .or_else(|| self.paths.base_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let metadata = overrides.metadata.unwrap_or_else(|| self.paths.metadata.clone());
        let output = overrides.output.unwrap_or_else(|| self.paths.output.clone());

        Settings {
            metadata: base_dir.join(metadata),
            output: base_dir.join(output),
            base_dir,
            keep_backups: self.store.keep_backups,
            debounce: Duration::from_millis(self.watch.debounce_ms),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if !(10..=60_000).contains(&self.watch.debounce_ms) {
            return Err(ConfigError::Invalid(
                path.to_path_buf(),
                format!(
                    "watch.debounce_ms must be between 10 and 60000, got {}",
                    self.watch.debounce_ms
                ),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Load configuration from `path`, or defaults when no path is given.
///
/// A path that was asked for but cannot be read or parsed is an error.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        tracing::debug!(target: "config", "No config file given, using defaults");
        return Ok(Config::default());
    };

    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
    config.validate(path)?;

    tracing::info!(target: "config", path = %path.display(), "Loaded config");
    Ok(config)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),

    #[error("Invalid config in {0}: {1}")]
    Invalid(PathBuf, String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
