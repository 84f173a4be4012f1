use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rollcall_attendance::record::TIME_FORMAT;
use rollcall_attendance::report::render_table;
use rollcall_attendance::{
    AttendanceController, CsvStore, Ledger, LedgerStore, MarkResult, Mode, Outcome, SessionState,
};
use rollcall_core::{Gallery, OnnxFaceEncoder};
use rollcall_hw::{Camera, StillImages};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::Config;

/// 128 + SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

/// ArcFace embeddings are unit length; the same person typically lands
/// 0.8 to 1.1 apart, so smaller thresholds rarely match anyone.
const UNIT_EMBEDDING_MATCH_DISTANCE: f32 = 0.8;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance tracker")]
struct Cli {
    /// Directory of reference images, one per person
    #[arg(long, global = true)]
    gallery: Option<PathBuf>,
    /// Attendance CSV file
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    /// Maximum embedding distance accepted as a match
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Directory containing the ONNX models
    #[arg(long, global = true)]
    models: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one attendance session
    Run {
        /// IN or OUT (default IN)
        mode: Option<String>,
        /// Read frames from a directory of images instead of the camera
        #[arg(long)]
        frames: Option<PathBuf>,
        /// V4L2 device path
        #[arg(long)]
        device: Option<String>,
        /// Give up after this many frames without a recognition (0 = never)
        #[arg(long)]
        max_frames: Option<usize>,
        /// Seconds to keep the result on screen
        #[arg(long)]
        hold_secs: Option<u64>,
    },
    /// Print the attendance ledger
    Records {
        /// Only show records for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List enrolled identities
    Gallery,
    /// List V4L2 capture devices
    Devices,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.gallery {
            config.gallery_dir = dir.clone();
        }
        if let Some(path) = &self.ledger {
            config.ledger_path = path.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(dir) = &self.models {
            config.model_dir = dir.clone();
        }
        if let Commands::Run { device, max_frames, hold_secs, .. } = &self.command {
            if let Some(device) = device {
                config.camera_device = device.clone();
            }
            if let Some(n) = max_frames {
                config.max_frames = *n;
            }
            if let Some(secs) = hold_secs {
                config.hold_secs = *secs;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command {
        Commands::Run { mode, frames, .. } => {
            let mode = Mode::from_arg(mode.as_deref());
            let hold = Duration::from_secs(config.hold_secs);

            let stop = Arc::new(AtomicBool::new(false));
            let watcher = tokio::spawn({
                let stop = Arc::clone(&stop);
                async move {
                    if watch_interrupts(tokio::signal::ctrl_c, &stop).await {
                        // Ledger writes are atomic renames; nothing is left half-written.
                        tracing::warn!("second interrupt; exiting immediately");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            });

            // Inference and capture block; keep them off the runtime threads.
            let completed = tokio::task::spawn_blocking(move || attend(&config, mode, frames.as_deref(), &stop))
                .await
                .context("session task failed")??;
            watcher.abort();

            if completed && !hold.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(hold) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
        }
        Commands::Records { date, json } => {
            let store = CsvStore::new(config.ledger_path.clone());
            let records: Vec<_> = store
                .load()
                .with_context(|| format!("reading ledger {}", config.ledger_path.display()))?
                .unwrap_or_default()
                .into_iter()
                .filter(|r| date.map_or(true, |d| r.date == d))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", render_table(&records));
            }
        }
        Commands::Gallery => {
            let mut encoder = load_encoder(&config)?;
            let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
            println!("{} identities in {}:", gallery.entries().len(), config.gallery_dir.display());
            for entry in gallery.entries() {
                println!("  {:<20} {}-d", entry.identity, entry.embedding.dimension());
            }
            if let Some(hint) = threshold_hint(config.threshold) {
                println!("\nNote: {hint}");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

/// The first interrupt asks the session to stop at the next frame. Returns
/// true if a second one arrives: a stalled capture never reaches a frame
/// boundary, so the caller should exit outright.
async fn watch_interrupts<F, Fut>(mut interrupt: F, stop: &AtomicBool) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    tracing::info!("interrupt received; stopping session (Ctrl-C again to exit now)");
    stop.store(true, Ordering::Relaxed);
    interrupt().await.is_ok()
}

fn threshold_hint(threshold: f32) -> Option<String> {
    (threshold < UNIT_EMBEDDING_MATCH_DISTANCE).then(|| {
        format!(
            "threshold {threshold} is strict for ArcFace embeddings (same-person distances are \
             usually 0.8 to 1.1); raise `threshold` in rollcall.toml or set ROLLCALL_THRESHOLD \
             if known faces are not recognized"
        )
    })
}

fn load_encoder(config: &Config) -> Result<OnnxFaceEncoder> {
    OnnxFaceEncoder::load(&config.model_dir)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

/// Run one session to completion. Returns whether a face was recognized.
fn attend(config: &Config, mode: Mode, frames: Option<&Path>, stop: &AtomicBool) -> Result<bool> {
    let mut encoder = load_encoder(config)?;
    let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
    tracing::info!(identities = gallery.entries().len(), "gallery loaded");
    if let Some(hint) = threshold_hint(config.threshold) {
        tracing::warn!("{hint}");
    }

    let mut ledger = Ledger::open(config.ledger_path.clone())
        .with_context(|| format!("opening ledger {}", config.ledger_path.display()))?;
    let mut controller = AttendanceController::new(&gallery, &mut ledger, mode, config.threshold);
    let clock = || Local::now().naive_local();

    println!("Looking for a known face ({mode}). Press Ctrl-C to stop.");
    let state = match frames {
        Some(dir) => {
            let mut source = StillImages::open(dir)?;
            session::run_session(&mut source, &mut encoder, &mut controller, stop, config.max_frames, clock)?
        }
        None => {
            let camera = Camera::open(&config.camera_device)
                .with_context(|| format!("opening camera {}", config.camera_device))?;
            let mut stream = camera.stream()?;
            stream.discard(config.warmup_frames);
            session::run_session(&mut stream, &mut encoder, &mut controller, stop, config.max_frames, clock)?
        }
    };

    let completed = match &state {
        SessionState::Complete(outcome) => {
            println!("{}", describe(outcome));
            true
        }
        _ => {
            println!("Session ended without recognizing a known face.");
            false
        }
    };
    print!("{}", render_table(ledger.snapshot()));
    Ok(completed)
}

fn describe(outcome: &Outcome) -> String {
    let name = &outcome.identity;
    match (outcome.result, outcome.mode) {
        (MarkResult::Marked, mode) => format!("{name} marked {mode} at {}", outcome.at.format(TIME_FORMAT)),
        (MarkResult::AlreadyMarked, mode) => format!("{name} already has {mode} today."),
        (MarkResult::NoInRecord, _) => format!("No IN record found today for {name}; cannot mark OUT."),
    }
}
