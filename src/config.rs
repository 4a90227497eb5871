//! Configuration types for lite-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (directories, concurrency, progress throttling)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Temporary directory for per-stream intermediate files (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum concurrently running task pipelines (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// File collision handling for the final output
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// How often aggregate progress is sampled, in milliseconds (default: 500)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Minimum percentage advance before progress is persisted (default: 1)
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            file_collision: FileCollisionAction::default(),
            progress_interval_ms: default_progress_interval_ms(),
            progress_step: default_progress_step(),
        }
    }
}

/// HTTP transport settings for stream transfers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP connect timeout in seconds (default: 15)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Per-read timeout in seconds (default: 30)
    ///
    /// Applied to every chunk read, not to the whole transfer. A stalled
    /// connection surfaces as a connection failure.
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum parallel range requests per stream (default: 4, 1 disables splitting)
    #[serde(default = "default_connections_per_stream")]
    pub connections_per_stream: usize,

    /// Smallest byte range worth its own connection (default: 512 KiB)
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            user_agent: default_user_agent(),
            connections_per_stream: default_connections_per_stream(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

/// External tool paths (ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Durable state configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./lite-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Key under which the history collection is stored (default: "download_history")
    #[serde(default = "default_history_key")]
    pub history_key: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            history_key: default_history_key(),
        }
    }
}

/// Main configuration for [`LiteDownloader`](crate::LiteDownloader)
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - directories, concurrency, progress throttling
/// - [`http`](HttpConfig) - transport timeouts and range splitting
/// - [`tools`](ToolsConfig) - ffmpeg discovery
/// - [`persistence`](PersistenceConfig) - database location and history key
///
/// `download` and `tools` are flattened, so their fields sit at the top level of the
/// serialized form.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Temporary directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.download.temp_dir
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        if self.download.progress_interval_ms == 0 {
            return Err(config_error(
                "progress_interval_ms must be greater than 0",
                "progress_interval_ms",
            ));
        }
        if self.download.progress_step == 0 || self.download.progress_step > 100 {
            return Err(config_error(
                "progress_step must be between 1 and 100",
                "progress_step",
            ));
        }
        if self.http.connections_per_stream == 0 {
            return Err(config_error(
                "connections_per_stream must be at least 1",
                "http.connections_per_stream",
            ));
        }
        if self.http.min_chunk_size == 0 {
            return Err(config_error(
                "min_chunk_size must be greater than 0",
                "http.min_chunk_size",
            ));
        }
        if self.persistence.history_key.is_empty() {
            return Err(config_error(
                "history_key must not be empty",
                "persistence.history_key",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Keep the existing file and fail the task
    Skip,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_progress_step() -> u8 {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("lite-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connections_per_stream() -> usize {
    4
}

fn default_min_chunk_size() -> u64 {
    512 * 1024
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./lite-dl.db")
}

fn default_history_key() -> String {
    "download_history".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
