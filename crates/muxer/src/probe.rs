//! Duration probe.
//!
//! Asks ffprobe for the container duration of a file. Every failure mode maps
//! to a [`ProbeError`]; callers treat any error as "duration unknown".

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe could not be started.
    #[error("Failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),

    /// ffprobe exited unsuccessfully.
    #[error("ffprobe exited with {0}")]
    Failed(ExitStatus),

    /// ffprobe printed nothing.
    #[error("ffprobe printed no duration")]
    Empty,

    /// Output was not a number.
    #[error("Failed to parse duration from {0:?}")]
    Parse(String),

    /// Output was a number but not a usable duration.
    #[error("Duration {0} is not a positive number of seconds")]
    NotPositive(f64),
}

/// Builds `<ffprobe> -v error -show_entries format=duration -of default=noprint_wrappers=1:nokey=1 <path>`.
pub fn build_probe_command(program: &Path, path: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(path);
    cmd
}

/// Parses ffprobe's single-line duration output.
pub fn parse_duration_output(stdout: &str) -> Result<f64, ProbeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::Empty);
    }

    let secs = trimmed
        .parse::<f64>()
        .map_err(|_| ProbeError::Parse(trimmed.to_string()))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(ProbeError::NotPositive(secs));
    }

    Ok(secs)
}

/// Returns the duration of `path` in seconds.
pub async fn probe_duration(program: &Path, path: &Path) -> Result<f64, ProbeError> {
    let mut cmd = build_probe_command(program, path);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    debug!(path = %path.display(), "probing duration");
    let output = cmd.output().await?;

    if !output.status.success() {
        return Err(ProbeError::Failed(output.status));
    }

    parse_duration_output(&String::from_utf8_lossy(&output.stdout))
}
