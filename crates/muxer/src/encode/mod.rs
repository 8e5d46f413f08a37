//! Encoding modules for the folder muxer

pub mod ffmpeg;

pub use ffmpeg::{build_mux_command, run_with_progress, EncodeError, MuxParams};
