//! Folder muxer
//!
//! Walks the immediate subfolders of a parent directory and muxes each
//! folder's video and audio file into one combined file with ffmpeg, on a
//! bounded worker pool with live progress and a durable outcome log.

pub mod dispatcher;
pub mod display;
pub mod encode;
pub mod job;
pub mod outcome;
pub mod outcome_log;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod scan;
pub mod startup;

#[cfg(all(test, unix))]
mod test_support;

pub use av_muxer_config as config;
pub use av_muxer_config::Config;
pub use dispatcher::{DispatchError, Dispatcher, RUN_LABEL};
pub use display::{progress_channel, JobId, ProgressDisplay, ProgressEvent, ProgressSender};
pub use encode::{build_mux_command, run_with_progress, EncodeError, MuxParams};
pub use job::{process_folder, JobContext};
pub use outcome::{FailureReason, JobOutcome, RunSummary, SkipReason};
pub use outcome_log::{timestamp, OutcomeLog, TIMESTAMP_FORMAT};
pub use plan::{PlanError, RunPlan, ToolPaths, DEFAULT_POOL_SIZE};
pub use probe::{parse_duration_output, probe_duration, ProbeError};
pub use progress::{parse_progress_line, ProgressLine, ProgressParser, ProgressState};
pub use scan::{
    combined_output_path, discover_folders, select_inputs, ScanError, Selection, SelectionPolicy,
    WorkUnit,
};
pub use startup::{check_tool_available, parse_tool_version, run_startup_checks, StartupError};
