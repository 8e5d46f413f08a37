//! Durable outcome log.
//!
//! The log is truncated when a run starts. Every line is flushed and synced
//! as soon as it is written, then echoed to the console above the progress
//! bars.

use crate::outcome::JobOutcome;
use chrono::Local;
use indicatif::MultiProgress;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Local wall-clock timestamp with microseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Append-only writer for one run's log file.
pub struct OutcomeLog {
    path: PathBuf,
    file: File,
    console: MultiProgress,
}

impl OutcomeLog {
    /// Creates (or truncates) the log at `path`.
    pub fn create(path: &Path, console: MultiProgress) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            console,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `"<label> started at <ts>"` followed by a blank line.
    pub fn start_banner(&mut self, label: &str) -> io::Result<()> {
        self.line(&format!("{} started at {}", label, timestamp()))?;
        self.blank()
    }

    /// Writes one free-form line.
    pub fn message(&mut self, text: &str) -> io::Result<()> {
        self.line(text)
    }

    pub fn blank(&mut self) -> io::Result<()> {
        self.line("")
    }

    /// Writes the log line for one folder's outcome.
    pub fn outcome(&mut self, outcome: &JobOutcome) -> io::Result<()> {
        self.line(&outcome.to_string())
    }

    /// Blank line followed by `"All done at <ts>."`.
    pub fn finish_banner(&mut self) -> io::Result<()> {
        self.blank()?;
        self.line(&format!("All done at {}.", timestamp()))
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(text.len() + 1);
        buf.push_str(text);
        buf.push('\n');

        self.file.write_all(buf.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.echo(text);
        Ok(())
    }

    fn echo(&self, text: &str) {
        if self.console.is_hidden() {
            println!("{}", text);
        } else if self.console.println(text).is_err() {
            println!("{}", text);
        }
    }
}
