//! Eventline configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ScopeKey;

/// Main Eventline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scope selection
    pub scope: ScopeConfig,

    /// Mirroring behaviour
    pub sync: SyncConfig,

    /// Clock ticker cadence
    pub clock: ClockConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.scope.validate()?;
        if self.sync.feed_capacity == 0 {
            return Err(eyre::eyre!("sync.feed-capacity must be at least 1"));
        }
        if self.clock.tick_interval_secs == 0 {
            return Err(eyre::eyre!("clock.tick-interval-secs must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .eventline.yml
        let local_config = PathBuf::from(".eventline.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/eventline/eventline.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("eventline").join("eventline.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load config from {}: {}",
                            user_config.display(),
                            e
                        );
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Best-effort peek at the configured log level, for use before
    /// logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".eventline.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("eventline").join("eventline.yml"));
                }
                paths
            }
        };

        for path in candidates {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_yaml::from_str::<Self>(&content) {
                    return Some(config.log.level);
                }
            }
        }
        None
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Scope selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Owning company id
    #[serde(rename = "company-id")]
    pub company_id: Option<String>,

    /// Event id within the company
    #[serde(rename = "event-id")]
    pub event_id: Option<String>,
}

impl ScopeConfig {
    /// The configured scope, or None when no event is selected
    pub fn scope_key(&self) -> Option<ScopeKey> {
        match (&self.company_id, &self.event_id) {
            (Some(company_id), Some(event_id)) => ScopeKey::new(company_id, event_id),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        // Half a scope is a configuration mistake, not an empty selection
        match (&self.company_id, &self.event_id) {
            (Some(_), None) => Err(eyre::eyre!(
                "scope.company-id is set but scope.event-id is missing"
            )),
            (None, Some(_)) => Err(eyre::eyre!(
                "scope.event-id is set but scope.company-id is missing"
            )),
            (Some(company_id), Some(event_id)) => {
                if ScopeKey::new(company_id, event_id).is_none() {
                    return Err(eyre::eyre!("scope ids must be non-empty"));
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }
}

/// Mirroring behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Change feed buffer size per table
    #[serde(rename = "feed-capacity")]
    pub feed_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            feed_capacity: livestore::DEFAULT_FEED_CAPACITY,
        }
    }
}

/// Clock ticker cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds between ticks
    #[serde(rename = "tick-interval-secs")]
    pub tick_interval_secs: u64,
}

impl ClockConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
