// src/main.rs
//
// rally-detect: replays a recorded ball-detection log through the rally
// pipeline and prints the segments (plus run statistics) as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rally_detection::pipeline::{CancelToken, RallyOutcome, RallyProcessor};
use rally_detection::replay::{DetectionLogSource, ReplayDetector};
use rally_detection::ProcessorConfig;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find rally segments in a recorded ball-detection log", long_about = None)]
struct Args {
    /// JSON-lines detection log ({"timestamp": .., "detections": [..]} per line)
    #[arg(short, long)]
    detections: PathBuf,

    /// YAML config file (overrides --preset)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// default | conservative | aggressive
    #[arg(short, long, default_value = "default")]
    preset: String,

    /// Recording length in seconds; enables progress reporting
    #[arg(long)]
    duration: Option<f64>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rally_detection=info,rally_detect=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ProcessorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match ProcessorConfig::preset(&args.preset) {
            Some(config) => config,
            None => bail!("unknown preset '{}'", args.preset),
        },
    };
    info!(
        "Config: gate={:.3}, R²>={:.2}, gravity=[{:.2}, {:.2}], sustain={:.2}s, timeout={:.2}s",
        config.tracker.gating_radius,
        config.ballistics.min_r_squared,
        config.ballistics.min_gravity,
        config.ballistics.max_gravity,
        config.decider.start_sustain,
        config.decider.end_timeout
    );

    let processor = RallyProcessor::new(config)?;
    let mut source = DetectionLogSource::open(&args.detections)?;
    if let Some(duration) = args.duration {
        source = source.with_duration(duration);
    }

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current frame");
            interrupt.cancel();
        }
    });

    let (progress_tx, mut progress_rx) = watch::channel(0.0_f64);
    let progress_task = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let fraction = *progress_rx.borrow_and_update();
            info!("Progress: {:.0}%", fraction * 100.0);
        }
    });

    let run_cancel = cancel.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut progress_tx = progress_tx;
        processor.run(&mut source, &mut ReplayDetector, &mut progress_tx, &run_cancel)
    })
    .await
    .context("processing task panicked")?;
    // Sender was dropped with the closure, so this ends promptly.
    let _ = progress_task.await;

    let report = match result {
        Ok(report) => report,
        Err(e) if e.is_cancelled() => {
            warn!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e).context("rally processing failed"),
    };

    match &report.outcome {
        RallyOutcome::NoRallies => {
            warn!("No rallies found; try --preset aggressive or loosen the ballistics gate")
        }
        RallyOutcome::Rallies(segments) => {
            for (i, seg) in segments.iter().enumerate() {
                info!(
                    "Rally {}: {:.2}s - {:.2}s ({:.2}s)",
                    i + 1,
                    seg.start,
                    seg.end,
                    seg.duration()
                );
            }
            info!(
                "{} rallies, {:.1}s total, {:.1}% of the recording",
                report.summary.total_rallies,
                report.summary.total_rally_time,
                report.summary.coverage_percent
            );
        }
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}
