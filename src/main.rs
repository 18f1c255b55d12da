// src/main.rs
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

use ring_tracker::asset::{load_object, ManifestLoader};
use ring_tracker::config::{load_config, save_config};
use ring_tracker::data::PoseExporter;
use ring_tracker::recording::read_recording;
use ring_tracker::{
    DetectorClient, RecordingScene, ReplayDetector, RingTracker, TrackerConfig, TrackingPipeline,
    Viewport,
};

#[derive(Parser)]
#[command(name = "ring_tracker", version, about = "Ring placement on a tracked finger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded landmark stream and export the tracked poses
    Replay(ReplayArgs),
    /// Print or write the default configuration
    DefaultConfig {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// JSON-lines landmark recording
    #[arg(long)]
    recording: PathBuf,
    /// Asset manifest describing the ring's meshes
    #[arg(long)]
    asset: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Output directory; defaults to ~/Documents/RingTracker
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    session: Option<String>,
    /// Frame index at which to start scale calibration
    #[arg(long)]
    calibrate_at: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => replay(args).await,
        Commands::DefaultConfig { out } => {
            let config = TrackerConfig::default();
            match out {
                Some(path) => save_config(&config, &path),
                None => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                    Ok(())
                }
            }
        }
    }
}

fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|d| d.join("RingTracker")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let frames = read_recording(&args.recording)?;
    let timestamps: Vec<u64> = frames.iter().map(|f| f.timestamp_ms).collect();

    let viewport = Viewport::new(args.width as f64, args.height as f64);
    let mut tracker = RingTracker::new(config, viewport);
    match load_object(&ManifestLoader, &args.asset) {
        Ok(object) => tracker.set_object(object),
        Err(e) => {
            error!(asset = ?args.asset, error = %e, "Asset could not be loaded");
            tracker.object_load_failed(&e);
        }
    }

    let detector = DetectorClient::spawn(ReplayDetector::new(frames));
    let mut pipeline = TrackingPipeline::new(tracker, detector, RecordingScene::default());

    let output_dir = args.out.unwrap_or_else(default_output_dir);
    let mut exporter = PoseExporter::new(&output_dir, args.session);

    // The replay detector ignores pixels; a blank frame keeps the request shape
    let blank = DynamicImage::new_rgb8(args.width, args.height);
    let start = Instant::now();

    for (index, &timestamp_ms) in timestamps.iter().enumerate() {
        let now = start + Duration::from_millis(timestamp_ms);
        if args.calibrate_at == Some(index) {
            pipeline.tracker_mut().start_calibration(now);
        }

        if !pipeline.detection_tick(blank.clone()) {
            continue;
        }
        if let Some(outcome) = pipeline.wait_and_apply(now).await {
            exporter.add_tick(timestamp_ms, &outcome, pipeline.tracker());
        }

        if let Some(calibration) = pipeline.render_tick(now).calibration {
            exporter.add_calibration(calibration);
        }
    }

    let csv_path = exporter.export_csv().context("Failed to export pose data")?;
    let summary_path = exporter.write_summary().context("Failed to write summary")?;
    info!(
        frames = exporter.frame_count(),
        csv = ?csv_path,
        summary = ?summary_path,
        "Replay finished"
    );
    Ok(())
}
