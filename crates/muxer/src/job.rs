//! Per-folder job.
//!
//! One job takes one folder end to end: select inputs, probe the video
//! duration, mux, and report a [`JobOutcome`]. Nothing here returns an error;
//! every failure becomes an outcome for that folder alone.

use crate::display::{JobId, ProgressSender};
use crate::encode::{build_mux_command, run_with_progress, MuxParams};
use crate::outcome::{FailureReason, JobOutcome, SkipReason};
use crate::plan::{RunPlan, ToolPaths};
use crate::probe::probe_duration;
use crate::scan::{folder_name, select_inputs, Selection, SelectionPolicy};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a worker needs besides the folder itself.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub tools: ToolPaths,
    pub selection: SelectionPolicy,
    pub deadline: Option<Duration>,
    pub progress: ProgressSender,
}

impl JobContext {
    pub fn from_plan(plan: &RunPlan, progress: ProgressSender) -> Self {
        Self {
            tools: plan.tools.clone(),
            selection: plan.selection.clone(),
            deadline: plan.job_timeout,
            progress,
        }
    }
}

/// Processes one folder and returns its outcome.
pub async fn process_folder(job: JobId, folder: &Path, ctx: &JobContext) -> JobOutcome {
    let name = folder_name(folder);

    let unit = match select_inputs(folder, &ctx.selection) {
        Ok(Selection::Ready(unit)) => unit,
        Ok(Selection::Ineligible) => {
            debug!(folder = %name, "no video/audio pair");
            return JobOutcome::Skipped {
                folder: name,
                reason: SkipReason::MissingInputs,
            };
        }
        Err(err) => {
            warn!(folder = %name, "cannot read folder: {}", err);
            return JobOutcome::Failed {
                folder: name,
                reason: FailureReason::UnreadableFolder(err.to_string()),
            };
        }
    };

    let total_secs = match probe_duration(&ctx.tools.ffprobe, &unit.video).await {
        Ok(secs) => secs,
        Err(err) => {
            warn!(folder = %name, video = %unit.video.display(), "duration unknown: {}", err);
            return JobOutcome::Failed {
                folder: name,
                reason: FailureReason::DurationUnknown(err.to_string()),
            };
        }
    };

    info!(
        folder = %name,
        video = %unit.video.display(),
        audio = %unit.audio.display(),
        duration_secs = total_secs,
        "muxing"
    );

    let cmd = build_mux_command(&MuxParams::new(ctx.tools.ffmpeg.clone(), &unit));
    match run_with_progress(cmd, total_secs, job, &name, &ctx.progress, ctx.deadline).await {
        Ok(()) => JobOutcome::Success { folder: name },
        Err(err) => {
            warn!(folder = %name, "mux failed: {}", err);
            JobOutcome::Failed {
                folder: name,
                reason: FailureReason::from(&err),
            }
        }
    }
}
