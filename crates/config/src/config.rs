//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Where the work folders live and how their inputs are recognized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// Directory whose immediate subfolders are the work set
    #[serde(default)]
    pub parent_dir: Option<PathBuf>,
    /// Log file path; relative paths are resolved against `parent_dir`
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Container extension of both inputs and the combined output (default "mp4")
    #[serde(default = "default_container_extension")]
    pub container_extension: String,
    /// Case-insensitive token identifying the video input (default "video")
    #[serde(default = "default_video_token")]
    pub video_token: String,
    /// Case-insensitive token identifying the audio input (default "audio")
    #[serde(default = "default_audio_token")]
    pub audio_token: String,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("process_log.txt")
}

fn default_container_extension() -> String {
    "mp4".to_string()
}

fn default_video_token() -> String {
    "video".to_string()
}

fn default_audio_token() -> String {
    "audio".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            parent_dir: None,
            log_file: default_log_file(),
            container_extension: default_container_extension(),
            video_token: default_video_token(),
            audio_token: default_audio_token(),
        }
    }
}

/// Job scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobsConfig {
    /// Maximum concurrent folders (0 = default pool size)
    #[serde(default)]
    pub max_concurrent_jobs: u32,
    /// Per-job deadline in seconds (0 = wait indefinitely)
    #[serde(default)]
    pub timeout_secs: u64,
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Encoder program (default "ffmpeg", resolved through PATH)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    /// Duration probe program (default "ffprobe", resolved through PATH)
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - MUX_PARENT_DIR -> library.parent_dir
    /// - MUX_LOG_FILE -> library.log_file
    /// - MUX_CONTAINER_EXTENSION -> library.container_extension
    /// - MUX_MAX_CONCURRENT_JOBS -> jobs.max_concurrent_jobs
    /// - MUX_JOB_TIMEOUT_SECS -> jobs.timeout_secs
    /// - FFMPEG_PATH -> tools.ffmpeg
    /// - FFPROBE_PATH -> tools.ffprobe
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MUX_PARENT_DIR") {
            if !val.is_empty() {
                self.library.parent_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("MUX_LOG_FILE") {
            if !val.is_empty() {
                self.library.log_file = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("MUX_CONTAINER_EXTENSION") {
            if !val.is_empty() {
                self.library.container_extension = val;
            }
        }

        if let Ok(val) = env::var("MUX_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.jobs.max_concurrent_jobs = jobs;
            }
        }

        if let Ok(val) = env::var("MUX_JOB_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.jobs.timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("FFMPEG_PATH") {
            if !val.is_empty() {
                self.tools.ffmpeg = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("FFPROBE_PATH") {
            if !val.is_empty() {
                self.tools.ffprobe = PathBuf::from(val);
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise start from defaults.
    ///
    /// Environment overrides are applied in both cases.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }
}
