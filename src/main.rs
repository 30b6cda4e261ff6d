//! SEEDOC conversion worker
//!
//! Queues the given files and folders, converts them one at a time and exits
//! once the queue has drained.
//!
//! ## Configuration
//!
//! Every flag has a `SEEDOC_*` environment variable (see `--help`). Also:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint (telemetry off when unset)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use seedoc_worker::config::WorkerConfig;
use seedoc_worker::converter::DocumentConverter;
use seedoc_worker::job::JobStatus;
use seedoc_worker::ocr::TesseractOcr;
use seedoc_worker::queue::{QueueEngine, QueueEvent};
use seedoc_worker::raster::ResvgRasterizer;
use seedoc_worker::telemetry;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::parse();
    init_logging(config.log_json);

    if let Err(e) = telemetry::init_telemetry() {
        warn!("Failed to initialize telemetry: {}", e);
    }

    let settings = config.render_settings();
    info!("SEEDOC initialized");
    info!(
        "Settings: Format={}, Quality={}, DPI={}",
        settings.format, settings.quality, settings.dpi
    );

    let converter = DocumentConverter::new(
        Arc::new(ResvgRasterizer::new()),
        Arc::new(TesseractOcr::new(config.tesseract.clone())),
    )
    .with_ocr_language(config.ocr_lang.clone());
    let engine = QueueEngine::new(converter, settings, config.queue_config());

    let mut events = engine.subscribe();
    let collector = tokio::spawn(async move {
        let mut finished = Vec::new();
        loop {
            match events.recv().await {
                Ok(event @ QueueEvent::JobFinished { .. }) => finished.push(event),
                Ok(QueueEvent::Drained { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Dropped {} queue events", n),
            }
        }
        finished
    });

    // One enqueue call so the whole batch runs as one processing run.
    if engine.enqueue_inputs(&config.inputs, config.recursive()).is_empty() {
        collector.abort();
        anyhow::bail!("no supported files among the given inputs");
    }

    tokio::select! {
        _ = engine.wait_idle() => {}
        result = signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            warn!("Interrupted, in-flight job abandoned");
            anyhow::bail!("interrupted");
        }
    }

    let finished = collector.await.context("Event collector failed")?;
    let jobs = engine.snapshot();
    let failed = finished
        .iter()
        .filter(|e| matches!(e, QueueEvent::JobFinished { status: JobStatus::Error, .. }))
        .count();

    if config.json {
        let summary = serde_json::json!({ "jobs": jobs, "results": finished });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    }

    if failed > 0 {
        anyhow::bail!("{} of {} job(s) failed", failed, finished.len());
    }
    Ok(())
}
