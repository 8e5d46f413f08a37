//! Startup checks module
//!
//! Preflight checks run before a batch starts:
//! - ffmpeg answers `-version`
//! - ffprobe answers `-version`

use crate::plan::RunPlan;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{tool} not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
}

/// Extract the version token from `<tool> -version` output
///
/// Handles the common FFmpeg version formats:
/// - Standard: "ffmpeg version 6.1.1 Copyright ..."
/// - N-prefixed: "ffprobe version n8.0-12-gabc ..."
///
/// Returns the token as printed, e.g. `6.1.1` or `n8.0-12-gabc`.
pub fn parse_tool_version(version_output: &str) -> Option<String> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_ascii_lowercase().contains(" version "))?;

    let lower = version_line.to_ascii_lowercase();
    let start = lower.find(" version ")? + " version ".len();

    version_line[start..]
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Check that `program -version` runs and exits successfully
///
/// Returns the version token when one can be found in the output.
pub fn check_tool_available(program: &Path) -> Result<Option<String>, StartupError> {
    let tool = program.display().to_string();

    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| StartupError::ToolUnavailable {
            tool: tool.clone(),
            reason: format!("{} -version failed; is it installed and in PATH? Error: {}", tool, e),
        })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable {
            reason: format!("{} -version exited with {}", tool, output.status),
            tool,
        });
    }

    Ok(parse_tool_version(&String::from_utf8_lossy(&output.stdout)))
}

/// Run all startup checks in order
///
/// 1. ffmpeg availability
/// 2. ffprobe availability
pub fn run_startup_checks(plan: &RunPlan) -> Result<(), StartupError> {
    for program in [&plan.tools.ffmpeg, &plan.tools.ffprobe] {
        let version = check_tool_available(program)?;
        info!(
            tool = %program.display(),
            version = version.as_deref().unwrap_or("unknown"),
            "tool available"
        );
    }
    Ok(())
}
