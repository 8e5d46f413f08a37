//! Run planning module
//!
//! Resolves a loaded [`Config`] into the explicit settings a dispatcher runs with.

use crate::config::Config;
use crate::scan::SelectionPolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Pool size used when the configuration leaves it at 0.
///
/// Kept small so the number of simultaneous encodes (and their progress bars)
/// stays readable.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Errors raised while resolving a run plan
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// No parent directory was configured
    #[error("No parent directory configured (set library.parent_dir, MUX_PARENT_DIR, or pass it on the command line)")]
    MissingParentDir,

    /// A selection setting is empty
    #[error("Configuration value `{0}` must not be empty")]
    EmptySetting(&'static str),
}

/// External programs invoked per job
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    /// Encoder used to mux each folder
    pub ffmpeg: PathBuf,
    /// Duration probe
    pub ffprobe: PathBuf,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// Directory whose immediate subfolders are processed
    pub parent_dir: PathBuf,
    /// Absolute or parent-relative log file location, already resolved
    pub log_path: PathBuf,
    /// Maximum number of folders processed at once
    pub pool_size: usize,
    /// Optional deadline for each encode
    pub job_timeout: Option<Duration>,
    /// External tool locations
    pub tools: ToolPaths,
    /// How each folder's inputs are recognized
    pub selection: SelectionPolicy,
}

impl RunPlan {
    /// Derive a run plan from configuration
    ///
    /// Uses the following rules:
    /// - `parent_dir` is required
    /// - A relative `log_file` is placed inside `parent_dir`
    /// - `max_concurrent_jobs = 0` falls back to [`DEFAULT_POOL_SIZE`]
    /// - `timeout_secs = 0` means no deadline
    pub fn derive(cfg: &Config) -> Result<Self, PlanError> {
        let parent_dir = cfg
            .library
            .parent_dir
            .clone()
            .ok_or(PlanError::MissingParentDir)?;

        let log_path = if cfg.library.log_file.is_absolute() {
            cfg.library.log_file.clone()
        } else {
            parent_dir.join(&cfg.library.log_file)
        };

        let pool_size = if cfg.jobs.max_concurrent_jobs > 0 {
            cfg.jobs.max_concurrent_jobs as usize
        } else {
            DEFAULT_POOL_SIZE
        };

        let job_timeout = match cfg.jobs.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let extension = cfg.library.container_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(PlanError::EmptySetting("library.container_extension"));
        }
        if cfg.library.video_token.is_empty() {
            return Err(PlanError::EmptySetting("library.video_token"));
        }
        if cfg.library.audio_token.is_empty() {
            return Err(PlanError::EmptySetting("library.audio_token"));
        }

        Ok(Self {
            parent_dir,
            log_path,
            pool_size,
            job_timeout,
            tools: ToolPaths {
                ffmpeg: cfg.tools.ffmpeg.clone(),
                ffprobe: cfg.tools.ffprobe.clone(),
            },
            selection: SelectionPolicy::new(
                &cfg.library.video_token,
                &cfg.library.audio_token,
                extension,
            ),
        })
    }
}
