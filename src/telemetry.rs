//! Telemetry and structured logging for conversion jobs.

use crate::job::{ConversionJob, JobStatus};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};

const TRACER_NAME: &str = "seedoc-worker";

/// Jobs slower than this are logged as a warning.
const SLOW_JOB_THRESHOLD_MS: i64 = 5000;

/// Records telemetry for a completed or failed job.
///
/// Emits a structured log line and an OpenTelemetry span carrying the job id,
/// kind, status, duration and error message.
pub fn record_job_telemetry(job: &ConversionJob) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("conversion_job");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("name", job.name.clone()));
    span.set_attribute(KeyValue::new("kind", job.kind.to_string()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            name = %job.name,
            kind = %job.kind,
            duration_ms = duration_ms,
            status = %job.status,
            "Conversion job finished"
        );

        if duration_ms > SLOW_JOB_THRESHOLD_MS {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                "Conversion exceeded performance threshold ({}ms)",
                SLOW_JOB_THRESHOLD_MS
            );
        }
    }

    if job.status == JobStatus::Error {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(
                job_id = %job.job_id,
                name = %job.name,
                error = %error,
                "Conversion job failed"
            );
        }
    }

    span.end();
}

/// Records the end of a processing run.
pub fn record_queue_drained(completed: usize, failed: usize) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("queue_drained");

    span.set_attribute(KeyValue::new("completed", completed as i64));
    span.set_attribute(KeyValue::new("failed", failed as i64));
    span.end();

    info!(completed = completed, failed = failed, "Queue drained");
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Must run inside a Tokio runtime.
///
/// Reads configuration from environment variables:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - Collector endpoint; when unset nothing is
///   installed and spans go to the no-op global tracer
/// - `OTEL_SERVICE_NAME` - Service name (default: seedoc-worker)
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => endpoint,
        Err(_) => return Ok(()),
    };

    let service_name = std::env::var("OTEL_SERVICE_NAME")
        .unwrap_or_else(|_| TRACER_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use std::path::PathBuf;

    #[test]
    fn test_record_completed_job() {
        let mut job = ConversionJob::new(PathBuf::from("/tmp/notes.txt"), JobKind::Text);
        job.start_processing();
        job.mark_complete();

        // Should not panic with the no-op tracer
        record_job_telemetry(&job);
    }

    #[test]
    fn test_record_failed_job() {
        let mut job = ConversionJob::new(PathBuf::from("/tmp/scan.png"), JobKind::Image);
        job.start_processing();
        job.mark_failed("Recognition failed: tesseract exited with status 1".to_string());

        record_job_telemetry(&job);
        record_queue_drained(0, 1);
    }
}
