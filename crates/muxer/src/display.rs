//! Interactive progress display.
//!
//! Workers never touch progress bars directly. They send [`ProgressEvent`]s
//! over a channel to a single consumer task that owns every bar: one overall
//! bar counting finished folders, and one bar per in-flight encode.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifier of a job within one run (its discovery index).
pub type JobId = usize;

const OVERALL_TEMPLATE: &str =
    "{msg:<16} [{elapsed_precise}] [{bar:40.green/white}] {pos}/{len}";
const JOB_TEMPLATE: &str = "{prefix:>16} [{bar:40.cyan/blue}] {msg}";

/// Message from a worker or the dispatcher to the display task.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// An encode started for a job with a known total duration.
    JobStarted {
        job: JobId,
        label: String,
        total_secs: f64,
    },
    /// Elapsed media time of a running encode grew.
    JobAdvanced { job: JobId, elapsed_secs: f64 },
    /// The encode ended (successfully or not); its bar is removed.
    JobFinished { job: JobId },
    /// The dispatcher recorded one more outcome.
    OutcomeRecorded,
}

/// Cheap, cloneable handle workers use to report progress.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Sends an event. Events are dropped once the display has shut down.
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Creates a sender and the receiver a [`ProgressDisplay`] consumes.
pub fn progress_channel() -> (ProgressSender, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, rx)
}

/// What the display observed over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplaySummary {
    /// Outcomes counted by the overall bar
    pub completed: u64,
    /// Highest number of job bars shown at the same time
    pub peak_in_flight: usize,
}

/// Owner of all progress bars for one run.
pub struct ProgressDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    jobs: HashMap<JobId, ProgressBar>,
    summary: DisplaySummary,
}

impl ProgressDisplay {
    pub fn new(multi: MultiProgress, total_jobs: u64) -> Self {
        let overall = multi.add(ProgressBar::new(total_jobs));
        overall.set_style(style(OVERALL_TEMPLATE));
        overall.set_message("Overall Progress");

        Self {
            multi,
            overall,
            jobs: HashMap::new(),
            summary: DisplaySummary::default(),
        }
    }

    /// Applies one event to the bars.
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                job,
                label,
                total_secs,
            } => {
                let bar = self.multi.add(ProgressBar::new(to_millis(total_secs)));
                bar.set_style(style(JOB_TEMPLATE));
                bar.set_prefix(label);
                bar.set_message(format_seconds(0.0, total_secs));
                if let Some(previous) = self.jobs.insert(job, bar) {
                    previous.finish_and_clear();
                    self.multi.remove(&previous);
                }
                self.summary.peak_in_flight = self.summary.peak_in_flight.max(self.jobs.len());
            }
            ProgressEvent::JobAdvanced { job, elapsed_secs } => {
                if let Some(bar) = self.jobs.get(&job) {
                    let total_secs = bar.length().unwrap_or(0) as f64 / 1000.0;
                    bar.set_position(to_millis(elapsed_secs));
                    bar.set_message(format_seconds(elapsed_secs, total_secs));
                }
            }
            ProgressEvent::JobFinished { job } => {
                if let Some(bar) = self.jobs.remove(&job) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
            }
            ProgressEvent::OutcomeRecorded => {
                self.overall.inc(1);
                self.summary.completed += 1;
            }
        }
    }

    /// Consumes events until every sender is dropped, then finishes the bars.
    pub fn spawn(mut self, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> JoinHandle<DisplaySummary> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.apply(event);
            }
            self.finish()
        })
    }

    fn finish(mut self) -> DisplaySummary {
        for (_, bar) in self.jobs.drain() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.overall.finish();
        self.summary
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn to_millis(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

fn format_seconds(elapsed: f64, total: f64) -> String {
    format!("{:.1}/{:.1}s", elapsed, total)
}
