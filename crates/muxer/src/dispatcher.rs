//! Work dispatcher
//!
//! Discovers the folders under the parent directory, runs one job per folder
//! on a bounded pool, and records every outcome in the log as it completes.

use crate::display::{progress_channel, ProgressDisplay, ProgressEvent, ProgressSender};
use crate::job::{process_folder, JobContext};
use crate::outcome::{FailureReason, JobOutcome, RunSummary};
use crate::outcome_log::OutcomeLog;
use crate::plan::RunPlan;
use crate::scan::{discover_folders, folder_name, ScanError};
use indicatif::MultiProgress;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

/// Label used in the log's start banner.
pub const RUN_LABEL: &str = "FFmpeg muxing";

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The parent directory could not be listed
    #[error("Failed to discover folders: {0}")]
    Discovery(#[from] ScanError),

    /// The log file could not be created or written
    #[error("Failed to write log {}: {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Runs one batch according to a [`RunPlan`].
pub struct Dispatcher {
    plan: RunPlan,
    console: MultiProgress,
}

impl Dispatcher {
    pub fn new(plan: RunPlan) -> Self {
        Self::with_console(plan, MultiProgress::new())
    }

    /// Uses `console` for progress bars and mirrored log lines.
    pub fn with_console(plan: RunPlan, console: MultiProgress) -> Self {
        Self { plan, console }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Processes every folder once and returns the outcomes in completion order.
    ///
    /// Per-folder problems never fail the run; they become outcomes. Only a
    /// discovery failure or a log write failure is returned as an error.
    /// Discovery happens before the log is touched, so a failed discovery
    /// leaves any previous log in place.
    pub async fn run(&self) -> Result<RunSummary, DispatchError> {
        let plan = &self.plan;
        let folders = discover_folders(&plan.parent_dir, &plan.log_path)?;

        let log_err = |source| DispatchError::Log {
            path: plan.log_path.clone(),
            source,
        };
        let mut log = OutcomeLog::create(&plan.log_path, self.console.clone()).map_err(log_err)?;
        log.start_banner(RUN_LABEL).map_err(log_err)?;
        log.message(&format!("Found {} folders to process.", folders.len()))
            .map_err(log_err)?;
        log.blank().map_err(log_err)?;

        info!(
            parent = %plan.parent_dir.display(),
            folders = folders.len(),
            pool_size = plan.pool_size,
            "starting run"
        );

        let (progress, rx) = progress_channel();
        let display = ProgressDisplay::new(self.console.clone(), folders.len() as u64).spawn(rx);

        let ctx = Arc::new(JobContext::from_plan(plan, progress.clone()));
        let permits = Arc::new(Semaphore::new(plan.pool_size.max(1)));
        let gauge = Arc::new(WorkerGauge::default());

        let mut workers = JoinSet::new();
        let mut names = HashMap::with_capacity(folders.len());
        for (job, folder) in folders.into_iter().enumerate() {
            let name = folder_name(&folder);
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            let gauge = Arc::clone(&gauge);

            let handle = workers.spawn(async move {
                // Only fails if the semaphore is closed, which never happens here
                let _permit = permits.acquire_owned().await.ok();
                let _active = gauge.enter();
                process_folder(job, &folder, &ctx).await
            });
            names.insert(handle.id(), name);
        }
        drop(ctx);

        let outcomes = record_outcomes(&mut workers, &mut names, &mut log, &progress)
            .await
            .map_err(log_err)?;

        // Every sender is gone once the workers are; the display then finishes
        drop(progress);
        match display.await {
            Ok(shown) => debug!(
                completed = shown.completed,
                peak_bars = shown.peak_in_flight,
                "progress display closed"
            ),
            Err(err) => warn!("progress display task failed: {}", err),
        }

        log.finish_banner().map_err(log_err)?;

        let mut summary = RunSummary::from_outcomes(outcomes);
        summary.peak_workers = gauge.peak();
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    pub fn log_path(&self) -> &Path {
        &self.plan.log_path
    }
}

/// Drains `workers`, logging each outcome as it arrives.
///
/// A worker that panicked still yields a Failed outcome for its folder.
async fn record_outcomes(
    workers: &mut JoinSet<JobOutcome>,
    names: &mut HashMap<Id, String>,
    log: &mut OutcomeLog,
    progress: &ProgressSender,
) -> io::Result<Vec<JobOutcome>> {
    let mut outcomes = Vec::with_capacity(workers.len());

    while let Some(joined) = workers.join_next_with_id().await {
        let outcome = match joined {
            Ok((id, outcome)) => {
                names.remove(&id);
                outcome
            }
            Err(err) => {
                let folder = names.remove(&err.id()).unwrap_or_default();
                error!(folder = %folder, "worker failed: {}", err);
                JobOutcome::Failed {
                    folder,
                    reason: FailureReason::Panicked(err.to_string()),
                }
            }
        };

        log.outcome(&outcome)?;
        progress.send(ProgressEvent::OutcomeRecorded);
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Counts workers holding a pool slot.
#[derive(Debug, Default)]
struct WorkerGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl WorkerGauge {
    fn enter(self: &Arc<Self>) -> ActiveWorker {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveWorker {
            gauge: Arc::clone(self),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveWorker {
    gauge: Arc<WorkerGauge>,
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use tempfile::TempDir;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn test_worker_gauge_tracks_peak() {
        let gauge = Arc::new(WorkerGauge::default());
        let a = gauge.enter();
        let b = gauge.enter();
        drop(a);
        let c = gauge.enter();
        assert_eq!(gauge.peak(), 2);
        drop(b);
        drop(c);
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
        assert_eq!(gauge.peak(), 2);
    }

    #[tokio::test]
    async fn test_panicked_worker_becomes_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        let mut log = OutcomeLog::create(&path, hidden()).unwrap();
        let (progress, _rx) = progress_channel();

        let mut workers: JoinSet<JobOutcome> = JoinSet::new();
        let mut names = HashMap::new();
        let ok = workers.spawn(async {
            JobOutcome::Success {
                folder: "A".to_string(),
            }
        });
        names.insert(ok.id(), "A".to_string());
        let boom = workers.spawn(async {
            if std::hint::black_box(true) {
                panic!("boom");
            }
            JobOutcome::Success {
                folder: "Z".to_string(),
            }
        });
        names.insert(boom.id(), "Z".to_string());

        let outcomes = record_outcomes(&mut workers, &mut names, &mut log, &progress)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(names.is_empty());
        assert!(outcomes.iter().any(|o| matches!(
            o,
            JobOutcome::Failed { folder, reason: FailureReason::Panicked(_) } if folder == "Z"
        )));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(" Combined A successfully.\n"));
        assert!(contents.contains(" Worker crashed in Z: "));
    }

    #[cfg(unix)]
    mod runs {
        use super::*;
        use crate::plan::ToolPaths;
        use crate::scan::SelectionPolicy;
        use crate::test_support::fake_tools;
        use std::fs::{self, File};
        use std::time::Duration;

        const LOG_NAME: &str = "process_log.txt";

        fn plan(parent: &Path, ffmpeg: &Path, ffprobe: &Path) -> RunPlan {
            RunPlan {
                parent_dir: parent.to_path_buf(),
                log_path: parent.join(LOG_NAME),
                pool_size: 2,
                job_timeout: None,
                tools: ToolPaths {
                    ffmpeg: ffmpeg.to_path_buf(),
                    ffprobe: ffprobe.to_path_buf(),
                },
                selection: SelectionPolicy::default(),
            }
        }

        fn folder_with(root: &Path, name: &str, files: &[&str]) -> PathBuf {
            let folder = root.join(name);
            fs::create_dir(&folder).unwrap();
            for file in files {
                File::create(folder.join(file)).unwrap();
            }
            folder
        }

        fn read_log(parent: &Path) -> Vec<String> {
            fs::read_to_string(parent.join(LOG_NAME))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// Outcome lines sit between the header block and the closing blank line.
        fn outcome_lines(lines: &[String]) -> Vec<String> {
            let mut body = lines[4..lines.len() - 2].to_vec();
            body.sort();
            body
        }

        async fn run(plan: RunPlan) -> RunSummary {
            Dispatcher::with_console(plan, hidden()).run().await.unwrap()
        }

        #[tokio::test]
        async fn test_combined_and_skipped() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            let a = folder_with(dir.path(), "A", &["video1.mp4", "audio1.mp4"]);
            folder_with(dir.path(), "B", &["clip_video.mp4"]);

            let summary = run(plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok)).await;

            assert_eq!(summary.total(), 2);
            assert_eq!(summary.succeeded, 1);
            assert_eq!(summary.skipped, 1);
            assert!(!summary.has_failures());
            assert!(a.join("A_combined.mp4").exists());

            let lines = read_log(dir.path());
            assert_eq!(lines.len(), 8);
            assert!(lines[0].starts_with("FFmpeg muxing started at "));
            assert_eq!(lines[1], "");
            assert_eq!(lines[2], "Found 2 folders to process.");
            assert_eq!(lines[3], "");
            assert_eq!(
                outcome_lines(&lines),
                vec![
                    " Combined A successfully.".to_string(),
                    " Skipped B: Missing audio or video file.".to_string(),
                ]
            );
            assert_eq!(lines[6], "");
            assert!(lines[7].starts_with("All done at "));
        }

        #[tokio::test]
        async fn test_probe_failure_runs_no_encode() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            let c = folder_with(dir.path(), "C", &["video.mp4", "audio.mp4"]);

            let summary = run(plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_bad)).await;

            assert!(summary.has_failures());
            assert!(!c.join("C_combined.mp4").exists());
            assert_eq!(
                outcome_lines(&read_log(dir.path())),
                vec![" Failed to get duration for C".to_string()]
            );
        }

        #[tokio::test]
        async fn test_encode_failure_is_logged() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            folder_with(dir.path(), "D", &["video.mp4", "audio.mp4"]);

            let summary = run(plan(dir.path(), &tools.ffmpeg_fail, &tools.ffprobe_ok)).await;

            assert_eq!(summary.failed, 1);
            assert_eq!(
                outcome_lines(&read_log(dir.path())),
                vec![" Failed in D".to_string()]
            );
        }

        #[tokio::test]
        async fn test_stream_without_sentinel_still_completes() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            let e = folder_with(dir.path(), "E", &["video.mp4", "audio.mp4"]);

            let summary = run(plan(dir.path(), &tools.ffmpeg_no_sentinel, &tools.ffprobe_ok)).await;

            assert_eq!(summary.succeeded, 1);
            assert!(e.join("E_combined.mp4").exists());
        }

        #[tokio::test]
        async fn test_deadline_fails_hung_encode() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            folder_with(dir.path(), "F", &["video.mp4", "audio.mp4"]);
            let mut plan = plan(dir.path(), &tools.ffmpeg_hang, &tools.ffprobe_ok);
            plan.job_timeout = Some(Duration::from_millis(200));

            let summary = run(plan).await;

            assert_eq!(summary.failed, 1);
            assert_eq!(
                outcome_lines(&read_log(dir.path())),
                vec![" Timed out in F after 0s".to_string()]
            );
        }

        #[tokio::test]
        async fn test_rerun_overwrites_and_logs_same_lines() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            // Folder name contains both tokens, so its output would match too
            let take = folder_with(dir.path(), "audio_video_take", &["video1.mp4", "audio1.mp4"]);
            folder_with(dir.path(), "B", &["audio_only.mp4"]);

            let first = run(plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok)).await;
            let first_lines = read_log(dir.path());
            let second = run(plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok)).await;
            let second_lines = read_log(dir.path());

            assert_eq!(first.succeeded, 1);
            assert_eq!(second.succeeded, 1);
            assert_eq!(first_lines.len(), second_lines.len());
            assert_eq!(outcome_lines(&first_lines), outcome_lines(&second_lines));
            assert!(take.join("audio_video_take_combined.mp4").exists());
        }

        #[tokio::test]
        async fn test_pool_bounds_concurrency() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            for name in ["F1", "F2", "F3", "F4", "F5"] {
                folder_with(dir.path(), name, &["video.mp4", "audio.mp4"]);
            }

            let summary = run(plan(dir.path(), &tools.ffmpeg_slow, &tools.ffprobe_ok)).await;

            assert_eq!(summary.total(), 5);
            assert_eq!(summary.succeeded, 5);
            assert!(summary.peak_workers >= 1);
            assert!(summary.peak_workers <= 2);
        }

        #[tokio::test]
        async fn test_single_worker_pool() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            for name in ["G1", "G2", "G3"] {
                folder_with(dir.path(), name, &["video.mp4", "audio.mp4"]);
            }
            let mut plan = plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok);
            plan.pool_size = 1;

            let summary = run(plan).await;

            assert_eq!(summary.succeeded, 3);
            assert_eq!(summary.peak_workers, 1);
        }

        #[tokio::test]
        async fn test_empty_parent() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            File::create(dir.path().join("stray.mp4")).unwrap();

            let summary = run(plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok)).await;

            assert_eq!(summary.total(), 0);
            let lines = read_log(dir.path());
            assert_eq!(lines[2], "Found 0 folders to process.");
            assert_eq!(lines.len(), 6);
        }

        #[tokio::test]
        async fn test_parent_not_a_directory_leaves_no_log() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            let not_dir = dir.path().join("file.txt");
            File::create(&not_dir).unwrap();
            let mut plan = plan(&not_dir, &tools.ffmpeg_ok, &tools.ffprobe_ok);
            plan.log_path = dir.path().join(LOG_NAME);

            let result = Dispatcher::with_console(plan, hidden()).run().await;

            assert!(matches!(
                result,
                Err(DispatchError::Discovery(ScanError::NotADirectory(_)))
            ));
            assert!(!dir.path().join(LOG_NAME).exists());
        }

        #[tokio::test]
        async fn test_unwritable_log_is_fatal() {
            let tools = fake_tools();
            let dir = TempDir::new().unwrap();
            folder_with(dir.path(), "A", &["video.mp4", "audio.mp4"]);
            let mut plan = plan(dir.path(), &tools.ffmpeg_ok, &tools.ffprobe_ok);
            plan.log_path = dir.path().join("missing").join(LOG_NAME);

            let result = Dispatcher::with_console(plan, hidden()).run().await;

            assert!(matches!(result, Err(DispatchError::Log { .. })));
        }
    }
}
