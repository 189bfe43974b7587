use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use frametrace_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use frametrace_core::pipeline::compare_image_use_case::CompareImageUseCase;
use frametrace_core::pipeline::monitor_config::MonitorConfig;
use frametrace_core::pipeline::monitor_use_case::MonitorUseCase;
use frametrace_core::pipeline::pipeline_logger::LogPipelineLogger;
use frametrace_core::shared::constants::DEFAULT_QUEUE_CAPACITY;

#[derive(Parser)]
#[command(
    name = "frametrace",
    about = "Watch a frame stream for reference templates"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a directory of images through a monitoring profile.
    Monitor {
        /// Profile directory containing profile.json and reference images.
        #[arg(long)]
        profile: PathBuf,

        /// Directory of frames, replayed in file name order.
        #[arg(long)]
        frames: PathBuf,

        /// Artifact root (defaults to the platform data directory).
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Frames kept pending for the detector; older ones are dropped.
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Replay rate in frames per second (unthrottled when omitted).
        #[arg(long)]
        fps: Option<f64>,
    },

    /// Score one image against every reference of a profile.
    Compare {
        /// Profile directory containing profile.json and reference images.
        #[arg(long)]
        profile: PathBuf,

        /// Image to compare (defaults to the profile's latest capture).
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Monitor {
            profile,
            frames,
            artifacts,
            queue_capacity,
            fps,
        } => run_monitor(&profile, &frames, artifacts, queue_capacity, fps),
        Command::Compare { profile, image } => run_compare(&profile, image.as_deref()),
    }
}

fn run_monitor(
    profile: &Path,
    frames: &Path,
    artifacts: Option<PathBuf>,
    queue_capacity: usize,
    fps: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_dir(profile, "Profile")?;
    validate_dir(frames, "Frames")?;
    let frame_interval = fps.map(frame_interval).transpose()?;

    let source = ImageSequenceSource::open(frames)?;
    if source.is_empty() {
        return Err(format!("No images found in {}", frames.display()).into());
    }
    log::info!("Replaying {} frames from {}", source.len(), frames.display());

    let mut config = MonitorConfig::new(profile).with_queue_capacity(queue_capacity);
    if let Some(root) = artifacts {
        config = config.with_artifact_root(root);
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    let report = MonitorUseCase::new(config).execute(
        Box::new(source),
        frame_interval,
        Box::new(LogPipelineLogger::default()),
        cancelled,
    )?;

    log::info!(
        "Processed {} of {} frames ({} dropped, {} unreadable)",
        report.run.cycles,
        report.capture.frames_pushed,
        report.run.frames_dropped,
        report.capture.read_errors
    );
    println!(
        "{} detection events, {} artifact errors",
        report.run.events_closed, report.run.artifact_errors
    );
    Ok(())
}

fn run_compare(profile: &Path, image: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    validate_dir(profile, "Profile")?;
    if let Some(image) = image {
        if !image.exists() {
            return Err(format!("Image not found: {}", image.display()).into());
        }
    }

    let scores = CompareImageUseCase::new().execute(profile, image)?;
    for entry in &scores {
        match &entry.score {
            Ok(score) => println!(
                "{}: score={score:.4} threshold={:.2} match={}",
                entry.reference,
                entry.threshold,
                entry.is_match()
            ),
            Err(e) => println!("{}: error: {e}", entry.reference),
        }
    }
    Ok(())
}

fn validate_dir(path: &Path, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("{what} directory not found: {}", path.display()).into());
    }
    Ok(())
}

fn frame_interval(fps: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(format!("FPS must be a positive number, got {fps}").into());
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|e| format!("FPS {fps} gives an unusable frame interval: {e}").into())
}
