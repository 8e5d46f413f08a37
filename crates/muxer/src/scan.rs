//! Scanner module for discovering work folders and selecting their inputs.
//!
//! The parent directory is listed once (non-recursively); every immediate
//! subfolder is a candidate. Inside a folder, the first file whose name
//! contains the video token and the first whose name contains the audio token
//! become the inputs. "First" means directory listing order, which is not
//! sorted and varies between filesystems.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Suffix appended to the folder name to form the output file stem.
pub const COMBINED_SUFFIX: &str = "_combined";

/// Errors raised while listing directories.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The configured parent is not a directory.
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    /// Listing failed.
    #[error("Failed to list directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Metadata lookup failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rules for recognizing a folder's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    video_token: String,
    audio_token: String,
    extension: String,
}

impl SelectionPolicy {
    /// Tokens and extension are matched case-insensitively.
    pub fn new(video_token: &str, audio_token: &str, extension: &str) -> Self {
        Self {
            video_token: video_token.to_lowercase(),
            audio_token: audio_token.to_lowercase(),
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }

    /// Container extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Checks whether a file name carries the container extension.
    pub fn has_extension(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// Checks whether a file name identifies a video input.
    pub fn is_video_name(&self, file_name: &str) -> bool {
        self.has_extension(file_name) && file_name.to_lowercase().contains(&self.video_token)
    }

    /// Checks whether a file name identifies an audio input.
    pub fn is_audio_name(&self, file_name: &str) -> bool {
        self.has_extension(file_name) && file_name.to_lowercase().contains(&self.audio_token)
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new("video", "audio", "mp4")
    }
}

/// One folder's inputs and derived output.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    /// Folder being processed
    pub folder: PathBuf,
    /// Folder name used in logs and progress labels
    pub name: String,
    /// Selected video input
    pub video: PathBuf,
    /// Selected audio input
    pub audio: PathBuf,
    /// `<folder>/<name>_combined.<ext>`
    pub output: PathBuf,
}

/// Result of inspecting one folder.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Both inputs were found.
    Ready(WorkUnit),
    /// A video or audio input is missing.
    Ineligible,
}

/// Display name of a folder (its last path component).
pub fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.to_string_lossy().into_owned())
}

/// File name of the combined output for a folder.
pub fn combined_file_name(name: &str, extension: &str) -> String {
    format!("{}{}.{}", name, COMBINED_SUFFIX, extension)
}

/// Full output path for a folder: `/a/b/Take1` -> `/a/b/Take1/Take1_combined.mp4`.
pub fn combined_output_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    folder.join(combined_file_name(name, extension))
}

/// Lists the immediate subfolders of `parent`.
///
/// - Non-recursive; plain files are ignored
/// - `log_path` is never returned even if it is a directory
/// - Results are sorted by name so submission order is stable
///
/// Any listing failure is returned; a run cannot start without its work set.
pub fn discover_folders(parent: &Path, log_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !std::fs::metadata(parent)?.is_dir() {
        return Err(ScanError::NotADirectory(parent.to_path_buf()));
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();

        // Follows symlinks, so a linked folder counts as a folder
        if !path.is_dir() || path == log_path {
            continue;
        }

        folders.push(entry.into_path());
    }

    Ok(folders)
}

/// Picks the video and audio inputs of one folder.
///
/// The first matching entry in listing order wins. When several files match
/// the same token a warning is logged and the first is still used. The
/// folder's own combined output is never selected, so re-runs pick the same
/// inputs as the first run.
pub fn select_inputs(folder: &Path, policy: &SelectionPolicy) -> Result<Selection, ScanError> {
    let name = folder_name(folder);
    let output_name = combined_file_name(&name, policy.extension());

    let mut videos: Vec<PathBuf> = Vec::new();
    let mut audios: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Unreadable or dangling entries inside the folder are not fatal
            Err(err) if err.depth() > 0 => {
                debug!(folder = %folder.display(), "skipping entry: {}", err);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name == output_name.as_str() {
            continue;
        }

        if policy.is_video_name(&file_name) {
            videos.push(entry.path().to_path_buf());
        }
        if policy.is_audio_name(&file_name) {
            audios.push(entry.path().to_path_buf());
        }
    }

    if videos.len() > 1 || audios.len() > 1 {
        warn!(
            folder = %name,
            videos = videos.len(),
            audios = audios.len(),
            "several candidate inputs found, using the first in listing order"
        );
    }

    let (Some(video), Some(audio)) = (videos.into_iter().next(), audios.into_iter().next()) else {
        return Ok(Selection::Ineligible);
    };

    let output = combined_output_path(folder, &name, policy.extension());
    Ok(Selection::Ready(WorkUnit {
        folder: folder.to_path_buf(),
        name,
        video,
        audio,
        output,
    }))
}
