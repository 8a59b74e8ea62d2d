//! Persisted module configuration and runtime settings.
//!
//! [`ModuleConfig`] is the key/value blob the host persists for us. It carries the
//! API credentials, the verbose-logging flag, and the list of schedules we are
//! tracking so that they survive a restart. [`Settings`] are runtime knobs that are
//! never persisted: where the API lives, how hard we may hit it, and how often we
//! poll.

use crate::schedule::Schedule;
use crate::session::Credentials;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Versioned base URL of the Resi Studio REST API.
pub const DEFAULT_API_BASE_URL: &str = "https://central.resi.io/api/v3";

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Log request/response details at debug level.
    ///
    /// The embedding process owns the tracing subscriber, so it applies this through
    /// [`ModuleConfig::log_level`] whenever the config changes.
    #[serde(default)]
    pub verbose: bool,
    /// Schedules started from this module that have not been stopped yet.
    #[serde(rename = "SCHEDULE_IDS", default)]
    pub schedules: Vec<Schedule>,
}

impl ModuleConfig {
    /// Returns the API credentials, or `None` if either half is missing.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::new(&self.client_id, &self.client_secret)
    }

    /// The most detailed level this config asks to be logged.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }
}

impl fmt::Debug for ModuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("verbose", &self.verbose)
            .field("schedules", &self.schedules)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    /// Upper bound on any single HTTP exchange.
    pub request_timeout: Duration,
    /// Requests allowed per `request_window`.
    pub request_limit: usize,
    pub request_window: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            request_limit: crate::rate_limit::REQUEST_LIMIT,
            request_window: crate::rate_limit::TIME_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// How often the background loop refreshes destination groups and schedules.
    pub slow_interval: Duration,
    /// Delay between checks of a freshly created schedule.
    pub fast_interval: Duration,
    /// Checks of a freshly created schedule before handing it to the slow loop.
    pub fast_max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            slow_interval: Duration::from_secs(60),
            fast_interval: Duration::from_secs(3),
            fast_max_attempts: 20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub api: ApiSettings,
    pub poll: PollSettings,
}

/// Host-provided storage for the [`ModuleConfig`] blob.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> eyre::Result<ModuleConfig>;
    fn save(&self, config: &ModuleConfig) -> eyre::Result<()>;
}

/// Keeps the configuration in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<ModuleConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> eyre::Result<ModuleConfig> {
        Ok(self
            .config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, config: &ModuleConfig) -> eyre::Result<()> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}

/// Stores the configuration as a pretty-printed JSON file.
///
/// Writes go to a sibling temporary file first and are then renamed into place, so
/// a crash mid-write never leaves a truncated config behind.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&self) -> eyre::Result<ModuleConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file yet, using defaults");
            return Ok(ModuleConfig::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read config file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {}", self.path.display()))
    }

    fn save(&self, config: &ModuleConfig) -> eyre::Result<()> {
        let json = serde_json::to_string_pretty(config).context("serialize config")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("write config file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("move config file into {}", self.path.display()))?;
        Ok(())
    }
}
