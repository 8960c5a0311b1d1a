//! Posture Monitor - Main Entry Point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use monitor::logging::init_logging;
use monitor::{FramePipeline, MonitorConfig, MonitorHandle};
use storage::{DateRange, InMemoryStore, StatisticsStore};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "posture-monitor", version, about = "Webcam posture monitor")]
struct Args {
    /// TOML configuration file (defaults to ./posture-monitor.toml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = MonitorConfig::load(args.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging);

    info!("=== Posture Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.metrics_addr {
        monitor::metrics::install_exporter(addr)?;
    }

    let store = Arc::new(InMemoryStore::new());
    let pipeline = FramePipeline::from_config(&config, Some(store.clone() as Arc<dyn StatisticsStore>))
        .context("building the monitoring pipeline")?;
    let handle = MonitorHandle::spawn(pipeline);

    if config.recording.auto_start {
        let response = handle.start_recording().await?;
        info!("Auto-start: {}", response.status);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(config.status_interval_secs.max(1)));

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down...");
                break;
            }
            _ = ticker.tick() => {
                if handle.is_finished() {
                    info!("Capture ended");
                    break;
                }
                let status = handle.status();
                info!(
                    angle = status.angle,
                    face_distance = status.face_distance,
                    bad = status.is_bad_posture,
                    sustained = status.is_currently_bad,
                    incidents = status.bad_posture_count,
                    recording = ?status.recording_time,
                    "status"
                );
            }
        }
    }

    let frames = handle.shutdown().await?;
    let stats = store.user_stats(&config.user_id, &DateRange::all())?;
    info!(
        "Processed {} frames; {} recorded session(s)",
        frames,
        store.session_count()
    );
    info!("Session statistics: {}", serde_json::to_string(&stats)?);
    Ok(())
}
