//! Fake `ffmpeg` / `ffprobe` scripts shared by the process-level tests.
//!
//! All scripts are written once, before any test launches one of them.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Touches the last argument (the output path) when one is given.
const TOUCH_OUTPUT: &str = r#"last=""
for arg in "$@"; do last="$arg"; done
if [ -n "$last" ]; then : > "$last"; fi"#;

pub(crate) struct FakeTools {
    _dir: TempDir,
    /// Prints `12.5`
    pub ffprobe_ok: PathBuf,
    /// Prints `N/A`
    pub ffprobe_bad: PathBuf,
    /// Emits progress up to 15s with the sentinel, writes the output, exits 0
    pub ffmpeg_ok: PathBuf,
    /// Same as `ffmpeg_ok` after a short pause
    pub ffmpeg_slow: PathBuf,
    /// Emits 2s of progress, exits 3 without writing the output
    pub ffmpeg_fail: PathBuf,
    /// Emits 1s and 4s without the sentinel, writes the output, exits 0
    pub ffmpeg_no_sentinel: PathBuf,
    /// Never finishes
    pub ffmpeg_hang: PathBuf,
}

impl FakeTools {
    fn create() -> Self {
        let dir = TempDir::new().expect("create fake tool dir");
        let root = dir.path();

        let ffprobe_ok = write_script(root, "ffprobe_ok", "echo 12.5");
        let ffprobe_bad = write_script(root, "ffprobe_bad", "echo N/A");
        let ffmpeg_ok = write_script(
            root,
            "ffmpeg_ok",
            &format!(
                "{}\necho frame=0\necho out_time_ms=N/A\necho progress=continue\n\
echo out_time_ms=5000000\necho progress=continue\necho out_time_ms=15000000\n\
echo progress=end\necho 'noise on stderr' >&2\nexit 0",
                TOUCH_OUTPUT
            ),
        );
        let ffmpeg_slow = write_script(
            root,
            "ffmpeg_slow",
            &format!(
                "sleep 0.3\n{}\necho out_time_ms=6000000\necho progress=end\nexit 0",
                TOUCH_OUTPUT
            ),
        );
        let ffmpeg_fail = write_script(
            root,
            "ffmpeg_fail",
            "echo out_time_ms=2000000\necho progress=continue\nexit 3",
        );
        let ffmpeg_no_sentinel = write_script(
            root,
            "ffmpeg_no_sentinel",
            &format!(
                "{}\necho out_time_ms=1000000\necho progress=continue\necho out_time_ms=4000000\nexit 0",
                TOUCH_OUTPUT
            ),
        );
        let ffmpeg_hang = write_script(root, "ffmpeg_hang", "exec sleep 30");

        Self {
            _dir: dir,
            ffprobe_ok,
            ffprobe_bad,
            ffmpeg_ok,
            ffmpeg_slow,
            ffmpeg_fail,
            ffmpeg_no_sentinel,
            ffmpeg_hang,
        }
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake tool");
    let mut perms = fs::metadata(&path).expect("stat fake tool").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake tool");
    path
}

pub(crate) fn fake_tools() -> &'static FakeTools {
    static TOOLS: OnceLock<FakeTools> = OnceLock::new();
    TOOLS.get_or_init(FakeTools::create)
}
