use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};

use crate::sync::scheduler::SchedulerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `pairs.json` and `errors.json` live.
    store_directory: String,
    pub matching: MatchingConfig,
    pub spotify: SpotifyConfig,
    pub youtube_music: YoutubeMusicConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub workers: usize,
    pub sequential_threshold: usize,
    /// Planned additions shown per side in a dry run.
    pub preview_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub requests_per_second: usize,
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeMusicConfig {
    pub requests_per_second: usize,
    pub max_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_directory: "~/.playlist-sync".to_string(),
            matching: MatchingConfig::default(),
            spotify: SpotifyConfig::default(),
            youtube_music: YoutubeMusicConfig::default(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            workers: scheduler.workers,
            sequential_threshold: scheduler.sequential_threshold,
            preview_size: 5,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 3,
            max_batch_size: 100,
        }
    }
}

impl Default for YoutubeMusicConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            max_batch_size: 50,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-sync").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or(eyre!("No config directory on this platform"))?;

        Self::from_file(&config_path)
    }

    /// Write a default config to `path` (or the default location) unless one
    /// already exists. Returns the path either way.
    pub fn create_default(path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path().ok_or(eyre!("No config directory on this platform"))?,
        };

        if path.exists() {
            tracing::info!(path = %path.display(), "Config file already exists");
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Config::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    fn validate(&self) -> Result<()> {
        if self.matching.workers == 0 {
            return Err(eyre!("matching.workers must be at least 1"));
        }
        if self.spotify.requests_per_second == 0 || self.youtube_music.requests_per_second == 0 {
            return Err(eyre!("requests_per_second must be at least 1"));
        }
        if self.spotify.max_batch_size == 0 || self.youtube_music.max_batch_size == 0 {
            return Err(eyre!("max_batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get expanded store directory
    pub fn store_directory_path(&self) -> PathBuf {
        self.expand_path(&self.store_directory)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            workers: self.matching.workers,
            sequential_threshold: self.matching.sequential_threshold,
        }
    }
}
