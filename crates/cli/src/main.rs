//! CLI entry point for the folder muxer
//!
//! Loads configuration, applies command line overrides, and runs one batch.

use av_muxer::{run_startup_checks, Config, Dispatcher, RunPlan};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Mux the video and audio file of every subfolder into one combined file
#[derive(Parser, Debug)]
#[command(name = "av-muxer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parent directory whose immediate subfolders are processed
    parent_dir: Option<PathBuf>,

    /// Path to the configuration file (missing file means defaults)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of folders processed at once
    #[arg(short, long)]
    jobs: Option<u32>,

    /// Log file, relative to the parent directory unless absolute
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Kill an encode that runs longer than this many seconds (0 = never)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Skip the ffmpeg/ffprobe availability checks
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long, default_value = "false")]
    json: bool,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(parent_dir) = &self.parent_dir {
            config.library.parent_dir = Some(parent_dir.clone());
        }
        if let Some(jobs) = self.jobs {
            config.jobs.max_concurrent_jobs = jobs;
        }
        if let Some(log_file) = &self.log_file {
            config.library.log_file = log_file.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.jobs.timeout_secs = timeout_secs;
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "av_muxer=info,warn",
        _ => "av_muxer=debug,info",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    args.apply_to(&mut config);

    let plan = match RunPlan::derive(&config) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.skip_checks {
        tracing::warn!("skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&plan) {
        eprintln!("Startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        parent = %plan.parent_dir.display(),
        log = %plan.log_path.display(),
        pool_size = plan.pool_size,
        "plan resolved"
    );

    let summary = match Dispatcher::new(plan).run().await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Run failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
