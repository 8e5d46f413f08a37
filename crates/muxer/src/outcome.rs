//! Per-folder outcomes and run summaries.
//!
//! Outcomes stay structured until they reach the log; the `Display` impls
//! below are the only place their text form is defined.

use crate::encode::EncodeError;
use serde::Serialize;
use std::fmt;

/// Why a folder was skipped without launching anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No video or no audio input in the folder
    MissingInputs,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingInputs => write!(f, "Missing audio or video file."),
        }
    }
}

/// Why a folder failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The folder itself could not be listed
    UnreadableFolder(String),
    /// The duration probe failed
    DurationUnknown(String),
    /// The encoder could not be started
    LaunchFailed(String),
    /// IO failure while talking to a running encoder
    Io(String),
    /// Encoder exited non-zero (`None` when killed by a signal)
    EncodeFailed { exit_code: Option<i32> },
    /// The per-job deadline expired
    TimedOut { secs: u64 },
    /// The worker task panicked
    Panicked(String),
}

impl From<&EncodeError> for FailureReason {
    fn from(err: &EncodeError) -> Self {
        match err {
            EncodeError::Spawn(e) => FailureReason::LaunchFailed(e.to_string()),
            EncodeError::Progress(e) | EncodeError::Wait(e) => FailureReason::Io(e.to_string()),
            EncodeError::Failed(code) => FailureReason::EncodeFailed {
                exit_code: Some(*code),
            },
            EncodeError::Terminated => FailureReason::EncodeFailed { exit_code: None },
            EncodeError::TimedOut(limit) => FailureReason::TimedOut {
                secs: limit.as_secs(),
            },
        }
    }
}

/// Final result of one folder. Exactly one exists per discovered folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { folder: String },
    Skipped { folder: String, reason: SkipReason },
    Failed { folder: String, reason: FailureReason },
}

impl JobOutcome {
    pub fn folder(&self) -> &str {
        match self {
            JobOutcome::Success { folder }
            | JobOutcome::Skipped { folder, .. }
            | JobOutcome::Failed { folder, .. } => folder,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }
}

impl fmt::Display for JobOutcome {
    /// Log line for the outcome. The leading space is part of the log format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success { folder } => write!(f, " Combined {} successfully.", folder),
            JobOutcome::Skipped { folder, reason } => write!(f, " Skipped {}: {}", folder, reason),
            JobOutcome::Failed { folder, reason } => match reason {
                FailureReason::DurationUnknown(_) => {
                    write!(f, " Failed to get duration for {}", folder)
                }
                FailureReason::EncodeFailed { .. } => write!(f, " Failed in {}", folder),
                FailureReason::UnreadableFolder(err) => {
                    write!(f, " Failed to read {}: {}", folder, err)
                }
                FailureReason::LaunchFailed(err) => {
                    write!(f, " Failed to launch encoder for {}: {}", folder, err)
                }
                FailureReason::Io(err) => write!(f, " Failed in {}: {}", folder, err),
                FailureReason::TimedOut { secs } => {
                    write!(f, " Timed out in {} after {}s", folder, secs)
                }
                FailureReason::Panicked(err) => write!(f, " Worker crashed in {}: {}", folder, err),
            },
        }
    }
}

/// Outcomes of a whole run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Most folders observed in progress at the same time
    pub peak_workers: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        let skipped = outcomes.len() - succeeded - failed;
        Self {
            outcomes,
            succeeded,
            skipped,
            failed,
            peak_workers: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Skips do not count as failures.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
