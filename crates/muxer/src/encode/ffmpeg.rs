//! ffmpeg mux module
//!
//! Builds the stream-copy mux command for one folder and runs it while
//! translating its `-progress pipe:1` output into progress events.

use crate::display::{JobId, ProgressEvent, ProgressSender};
use crate::progress::{ProgressParser, ProgressState};
use crate::scan::WorkUnit;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder could not be started
    #[error("Failed to launch encoder: {0}")]
    Spawn(std::io::Error),

    /// Reading the progress stream failed
    #[error("Failed to read encoder progress: {0}")]
    Progress(std::io::Error),

    /// Waiting for the encoder to exit failed
    #[error("Failed to wait for encoder: {0}")]
    Wait(std::io::Error),

    /// Encoder exited with non-zero status
    #[error("Encoder failed with exit code: {0}")]
    Failed(i32),

    /// Encoder was terminated by signal
    #[error("Encoder process was terminated by signal")]
    Terminated,

    /// The optional per-job deadline expired and the encoder was killed
    #[error("Encoder did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Parameters for muxing one folder
#[derive(Debug, Clone, PartialEq)]
pub struct MuxParams {
    /// Encoder program
    pub program: PathBuf,
    /// Video input (video stream is copied)
    pub video: PathBuf,
    /// Audio input (audio is re-encoded to AAC)
    pub audio: PathBuf,
    /// Combined output, overwritten if present
    pub output: PathBuf,
}

impl MuxParams {
    pub fn new(program: PathBuf, unit: &WorkUnit) -> Self {
        Self {
            program,
            video: unit.video.clone(),
            audio: unit.audio.clone(),
            output: unit.output.clone(),
        }
    }
}

/// Build the mux command
///
/// `<ffmpeg> -i <video> -i <audio> -c:v copy -c:a aac -strict experimental -y
/// -progress pipe:1 -loglevel error <output>`
pub fn build_mux_command(params: &MuxParams) -> Command {
    let mut cmd = Command::new(&params.program);

    cmd.arg("-i").arg(&params.video);
    cmd.arg("-i").arg(&params.audio);

    cmd.args(["-c:v", "copy"]);
    cmd.args(["-c:a", "aac"]);
    cmd.args(["-strict", "experimental"]);

    // Overwrite any previous output
    cmd.arg("-y");

    // Machine-readable progress on stdout, nothing but errors on stderr
    cmd.args(["-progress", "pipe:1"]);
    cmd.args(["-loglevel", "error"]);

    cmd.arg(&params.output);

    cmd
}

/// Run a fully-formed encoder command, reporting progress for `job`.
///
/// stdout is captured and parsed, stderr is discarded. Elapsed time is clamped
/// to `[0, total_secs]` and only reported when it grows. Once the progress
/// stream ends (sentinel or end of stream) the process exit is awaited.
///
/// # Returns
/// * `Ok(())` - The encoder exited with status zero
/// * `Err(EncodeError)` - Launch failure, non-zero exit, signal, or deadline
pub async fn run_with_progress(
    mut cmd: Command,
    total_secs: f64,
    job: JobId,
    label: &str,
    progress: &ProgressSender,
    deadline: Option<Duration>,
) -> Result<(), EncodeError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    debug!(job, command = ?cmd.as_std(), "launching encoder");
    let mut child = cmd.spawn().map_err(EncodeError::Spawn)?;
    let stdout = child.stdout.take().ok_or_else(|| {
        EncodeError::Spawn(std::io::Error::new(
            std::io::ErrorKind::Other,
            "encoder stdout was not captured",
        ))
    })?;

    progress.send(ProgressEvent::JobStarted {
        job,
        label: label.to_string(),
        total_secs,
    });

    let mut state = ProgressState::new(total_secs);
    let result = match deadline {
        Some(limit) => {
            let bounded =
                tokio::time::timeout(limit, drive(&mut child, stdout, &mut state, job, progress))
                    .await;
            match bounded {
                Ok(result) => result,
                Err(_) => {
                    let _ = child.kill().await;
                    Err(EncodeError::TimedOut(limit))
                }
            }
        }
        None => drive(&mut child, stdout, &mut state, job, progress).await,
    };

    progress.send(ProgressEvent::JobFinished { job });
    result
}

async fn drive(
    child: &mut Child,
    stdout: ChildStdout,
    state: &mut ProgressState,
    job: JobId,
    progress: &ProgressSender,
) -> Result<(), EncodeError> {
    let mut parser = ProgressParser::new(BufReader::new(stdout));

    while let Some(elapsed) = parser.next_update().await.map_err(EncodeError::Progress)? {
        if let Some(elapsed_secs) = state.advance(elapsed) {
            progress.send(ProgressEvent::JobAdvanced { job, elapsed_secs });
        }
    }

    if !parser.saw_end() {
        debug!(job, "progress stream closed without progress=end");
    }

    // The parser keeps stdout open until the process has exited
    let status = child.wait().await.map_err(EncodeError::Wait)?;
    drop(parser);

    if status.success() {
        if let Some(elapsed_secs) = state.complete() {
            progress.send(ProgressEvent::JobAdvanced { job, elapsed_secs });
        }
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(EncodeError::Failed(code)),
            None => Err(EncodeError::Terminated),
        }
    }
}
