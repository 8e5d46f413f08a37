//! Encoder progress stream parsing.
//!
//! ffmpeg started with `-progress pipe:1` writes blocks of `key=value` lines to
//! stdout, each block closed by `progress=continue`, and the final one by
//! `progress=end`. Only `out_time_ms` (microseconds, despite the name) is used.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

const OUT_TIME_KEY: &str = "out_time_ms=";
const END_SENTINEL: &str = "progress=end";

/// Classification of a single progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Elapsed output time in seconds
    OutTime(f64),
    /// The encoder finished writing progress
    End,
    /// Anything else
    Other,
}

/// Classifies one line of the progress stream.
///
/// `out_time_ms=<integer>` maps to `integer / 1_000_000` seconds. A value that is
/// not an integer (ffmpeg prints `N/A` before the first frame) is `Other`.
pub fn parse_progress_line(line: &str) -> ProgressLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == END_SENTINEL {
        return ProgressLine::End;
    }
    match line.strip_prefix(OUT_TIME_KEY) {
        Some(value) => match value.trim().parse::<i64>() {
            Ok(micros) => ProgressLine::OutTime(micros as f64 / 1_000_000.0),
            Err(_) => ProgressLine::Other,
        },
        None => ProgressLine::Other,
    }
}

/// Lazy sequence of elapsed-time updates read from one process's stdout.
///
/// The sequence ends at the `progress=end` sentinel or at end of stream,
/// whichever comes first, and cannot be restarted.
pub struct ProgressParser<R> {
    lines: Lines<R>,
    finished: bool,
    saw_end: bool,
}

impl<R: AsyncBufRead + Unpin> ProgressParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
            saw_end: false,
        }
    }

    /// Next elapsed value in seconds, or `None` once the stream is done.
    pub async fn next_update(&mut self) -> std::io::Result<Option<f64>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(line) = self.lines.next_line().await? {
            match parse_progress_line(&line) {
                ProgressLine::OutTime(secs) => return Ok(Some(secs)),
                ProgressLine::End => {
                    self.finished = true;
                    self.saw_end = true;
                    return Ok(None);
                }
                ProgressLine::Other => {}
            }
        }

        self.finished = true;
        Ok(None)
    }

    /// Whether the sequence ended on the sentinel rather than end of stream.
    pub fn saw_end(&self) -> bool {
        self.saw_end
    }
}

/// Elapsed media time of one running job.
///
/// Never decreases and never leaves `[0, total]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    elapsed: f64,
    total: f64,
}

impl ProgressState {
    pub fn new(total: f64) -> Self {
        Self {
            elapsed: 0.0,
            total: if total.is_finite() { total.max(0.0) } else { 0.0 },
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Applies a raw update. Returns the new elapsed value if it grew.
    pub fn advance(&mut self, raw: f64) -> Option<f64> {
        if raw.is_nan() {
            return None;
        }
        let clamped = raw.clamp(0.0, self.total);
        if clamped > self.elapsed {
            self.elapsed = clamped;
            Some(clamped)
        } else {
            None
        }
    }

    /// Jumps to the total, as when the encoder exits normally.
    pub fn complete(&mut self) -> Option<f64> {
        self.advance(self.total)
    }
}
