use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trackline_queue::QueueConfig;
use url::Url;

use crate::error::ClientResult;

/// Default values
pub const DEFAULT_US_TRACKING_URL: &str = "https://track-sdk.trackline.io";
pub const DEFAULT_EU_TRACKING_URL: &str = "https://track-sdk-eu.trackline.io";
pub const DEFAULT_LOG_LEVEL: &str = "error";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKLOG_THRESHOLD: i64 = 10;
pub const DEFAULT_QUEUE_DEBOUNCE_SECS: u64 = 30;
pub const DEFAULT_TASK_EXPIRY_DAYS: u64 = 3;

/// Environment variable consulted for log level overrides.
pub const LOG_LEVEL_ENV: &str = "TRACKLINE_LOG_LEVEL";

/// Data center the workspace lives in. Picks the default tracking host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    pub fn tracking_url(&self) -> &'static str {
        match self {
            Region::Us => DEFAULT_US_TRACKING_URL,
            Region::Eu => DEFAULT_EU_TRACKING_URL,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Workspace site id, sent as the Basic auth username.
    pub site_id: String,

    /// Workspace API key, sent as the Basic auth password.
    pub api_key: String,

    #[serde(default)]
    pub region: Region,

    /// Overrides the region's tracking host when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Backlog size that triggers delivery immediately instead of
    /// waiting out the debounce window.
    #[serde(default = "default_backlog_threshold")]
    pub backlog_threshold: i64,

    #[serde(default = "default_queue_debounce_secs")]
    pub queue_debounce_secs: u64,

    /// Tasks older than this are dropped during cleanup.
    #[serde(default = "default_task_expiry_days")]
    pub task_expiry_days: u64,

    /// Directory holding the queue database. Defaults to a `trackline`
    /// folder under the platform's local data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_backlog_threshold() -> i64 {
    DEFAULT_BACKLOG_THRESHOLD
}

fn default_queue_debounce_secs() -> u64 {
    DEFAULT_QUEUE_DEBOUNCE_SECS
}

fn default_task_expiry_days() -> u64 {
    DEFAULT_TASK_EXPIRY_DAYS
}

impl ClientConfig {
    /// Create a config with default settings for the given credentials,
    /// then apply environment variable overrides.
    pub fn new(site_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut config = ClientConfig {
            site_id: site_id.into(),
            api_key: api_key.into(),
            region: Region::default(),
            tracking_url: None,
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            backlog_threshold: default_backlog_threshold(),
            queue_debounce_secs: default_queue_debounce_secs(),
            task_expiry_days: default_task_expiry_days(),
            storage_dir: None,
        };
        config.load_from_env();
        config
    }

    /// Load configuration from a JSON file, then apply environment
    /// variable overrides.
    pub fn load_from_file(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = serde_json::from_str(&contents)?;
        config.load_from_env();
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment variable overrides.
    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
    }

    /// The tracking API base, honoring the `tracking_url` override.
    pub fn tracking_url(&self) -> Result<Url, url::ParseError> {
        match &self.tracking_url {
            Some(url) => Url::parse(url),
            None => Url::parse(self.region.tracking_url()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Path of the queue database file.
    pub fn database_path(&self) -> PathBuf {
        let dir = match &self.storage_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("trackline"),
        };
        dir.join(format!("queue-{}.db", self.site_id))
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            run_threshold: self.backlog_threshold,
            debounce: Duration::from_secs(self.queue_debounce_secs),
            task_expiry: Duration::from_secs(self.task_expiry_days * 24 * 60 * 60),
        }
    }
}
