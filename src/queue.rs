//! In-process conversion queue with a single serial driver.
//!
//! Jobs move `pending → processing → completed | error`. Only the driver task
//! performs those transitions, and it runs one job at a time in insertion
//! order. The controlling surface may append or remove pending jobs at any
//! time; appending to an idle queue starts a new driver.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::converter::{kilobytes, DocumentConverter, JobOutcome};
use crate::error::QueueError;
use crate::job::{ConversionJob, JobKind, JobStatus};
use crate::ocr::ProgressSink;
use crate::scan::expand_inputs;
use crate::settings::RenderSettings;
use crate::telemetry;

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long finished jobs stay visible after a processing run ends.
    pub prune_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            prune_delay: Duration::from_millis(3000),
        }
    }
}

/// Progress notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    JobAdded {
        job_id: String,
        name: String,
        kind: JobKind,
    },
    JobStarted {
        job_id: String,
        name: String,
        /// Pending jobs left after this one.
        remaining: usize,
    },
    OcrProgress {
        job_id: String,
        percent: u8,
    },
    JobFinished {
        job_id: String,
        name: String,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<JobOutcome>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    JobRemoved {
        job_id: String,
        name: String,
    },
    Drained {
        completed: usize,
        failed: usize,
    },
    Pruned {
        removed: usize,
    },
}

struct QueueState {
    jobs: Vec<ConversionJob>,
    settings: RenderSettings,
    running: bool,
    completed: usize,
    failed: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    converter: DocumentConverter,
    events: broadcast::Sender<QueueEvent>,
    idle: watch::Sender<bool>,
    config: QueueConfig,
}

/// Forwards OCR progress of one job to the event channel.
struct JobProgress {
    job_id: String,
    events: broadcast::Sender<QueueEvent>,
}

impl ProgressSink for JobProgress {
    fn report(&self, percent: u8) {
        info!("OCR progress: {}%", percent);
        let _ = self.events.send(QueueEvent::OcrProgress {
            job_id: self.job_id.clone(),
            percent,
        });
    }
}

enum Step {
    Run {
        job: ConversionJob,
        settings: RenderSettings,
    },
    Drained {
        completed: usize,
        failed: usize,
    },
}

/// Handle to the conversion queue. Clones share the same queue.
#[derive(Clone)]
pub struct QueueEngine {
    shared: Arc<Shared>,
}

impl QueueEngine {
    pub fn new(converter: DocumentConverter, settings: RenderSettings, config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    jobs: Vec::new(),
                    settings,
                    running: false,
                    completed: 0,
                    failed: 0,
                }),
                converter,
                events,
                idle,
                config,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Current jobs in queue order.
    pub fn snapshot(&self) -> Vec<ConversionJob> {
        self.state().jobs.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn settings(&self) -> RenderSettings {
        self.state().settings.clone()
    }

    /// Replaces the settings used by jobs that start from now on.
    pub fn set_settings(&self, settings: RenderSettings) {
        info!(
            "Settings: Format={}, Quality={}, DPI={}",
            settings.format, settings.quality, settings.dpi
        );
        self.state().settings = settings;
    }

    /// Sets the output folder override; `None` writes next to each source file.
    pub fn set_output_dir(&self, output_dir: Option<PathBuf>) {
        match &output_dir {
            Some(dir) => info!("Output folder set: {}", dir.display()),
            None => info!("Output folder reset to source folder"),
        }
        self.state().settings.output_dir = output_dir;
    }

    /// Resolves once no job is pending or processing.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }

    /// Appends jobs for every path with a recognized extension.
    ///
    /// Returns the ids of the added jobs. Starts the driver if the queue was
    /// idle, so this must be called from within a Tokio runtime.
    pub fn enqueue<I, P>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        info!("Adding {} file(s)...", paths.len());

        let mut added = Vec::new();
        let start_driver = {
            let mut state = self.state();
            let format = state.settings.format;

            for path in paths {
                let Some(job) = ConversionJob::from_path(path) else {
                    continue;
                };
                match job.kind {
                    JobKind::Text => info!("{} → {}", job.name, format),
                    JobKind::Image => info!("{} → MD (OCR)", job.name),
                }
                added.push(QueueEvent::JobAdded {
                    job_id: job.job_id.clone(),
                    name: job.name.clone(),
                    kind: job.kind,
                });
                state.jobs.push(job);
            }

            if added.is_empty() {
                warn!("No supported files found");
                false
            } else {
                info!("{} file(s) added to queue", added.len());
                if state.running {
                    false
                } else {
                    state.running = true;
                    self.shared.idle.send_replace(false);
                    true
                }
            }
        };

        let ids = added
            .iter()
            .filter_map(|event| match event {
                QueueEvent::JobAdded { job_id, .. } => Some(job_id.clone()),
                _ => None,
            })
            .collect();
        for event in added {
            self.emit(event);
        }

        if start_driver {
            tokio::spawn(self.clone().drive());
        }
        ids
    }

    /// Enqueues files and the recognized contents of folders as one batch.
    pub fn enqueue_inputs(&self, inputs: &[PathBuf], recursive: bool) -> Vec<String> {
        self.enqueue(expand_inputs(inputs, recursive))
    }

    /// Removes a job that is not currently processing.
    pub fn remove(&self, job_id: &str) -> Result<ConversionJob, QueueError> {
        let removed = {
            let mut state = self.state();
            let idx = state
                .jobs
                .iter()
                .position(|j| j.job_id == job_id)
                .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
            if state.jobs[idx].status == JobStatus::Processing {
                let name = state.jobs[idx].name.clone();
                warn!("Cannot remove {} - currently processing", name);
                return Err(QueueError::Processing(name));
            }
            state.jobs.remove(idx)
        };

        info!("Removed: {}", removed.name);
        self.emit(QueueEvent::JobRemoved {
            job_id: removed.job_id.clone(),
            name: removed.name.clone(),
        });
        Ok(removed)
    }

    /// Picks the next pending job, or marks the queue idle if there is none.
    fn next_step(&self) -> Step {
        let mut state = self.state();
        let settings = state.settings.clone();

        match state.jobs.iter().position(|j| j.status == JobStatus::Pending) {
            Some(idx) => {
                state.jobs[idx].start_processing();
                let job = state.jobs[idx].clone();
                let remaining = state
                    .jobs
                    .iter()
                    .filter(|j| j.status == JobStatus::Pending)
                    .count();
                drop(state);

                info!("Processing: {} ({} remaining)", job.name, remaining);
                self.emit(QueueEvent::JobStarted {
                    job_id: job.job_id.clone(),
                    name: job.name.clone(),
                    remaining,
                });
                Step::Run { job, settings }
            }
            None => {
                state.running = false;
                let completed = std::mem::take(&mut state.completed);
                let failed = std::mem::take(&mut state.failed);
                // Flip idle under the lock so a concurrent enqueue cannot be overwritten.
                self.shared.idle.send_replace(true);
                Step::Drained { completed, failed }
            }
        }
    }

    async fn drive(self) {
        debug!("Queue driver started");
        loop {
            match self.next_step() {
                Step::Run { job, settings } => self.process(job, settings).await,
                Step::Drained { completed, failed } => {
                    info!("All conversions completed");
                    telemetry::record_queue_drained(completed, failed);
                    self.emit(QueueEvent::Drained { completed, failed });
                    self.schedule_prune();
                    return;
                }
            }
        }
    }

    /// Runs one job to a terminal state. Failures never escape this function.
    async fn process(&self, job: ConversionJob, settings: RenderSettings) {
        let progress = JobProgress {
            job_id: job.job_id.clone(),
            events: self.shared.events.clone(),
        };

        // A panicking conversion surfaces as a JoinError instead of killing the driver.
        let shared = self.shared.clone();
        let task_job = job.clone();
        let result = tokio::spawn(async move {
            shared
                .converter
                .run(&task_job, &settings, &progress)
                .await
                .map_err(|e| e.to_string())
        })
        .await
        .unwrap_or_else(|e| Err(format!("conversion task aborted: {}", e)));

        match &result {
            Ok(JobOutcome::Pages(pages)) => info!(
                "✓ {} page(s), {} KB",
                pages.total_pages,
                kilobytes(pages.total_size_bytes)
            ),
            Ok(JobOutcome::Ocr(ocr)) => info!(
                "✓ Saved: {} ({} KB)",
                ocr.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                kilobytes(ocr.size_bytes)
            ),
            Err(msg) => error!("Failed: {}", msg),
        }

        let finished = {
            let mut state = self.state();
            let Some(entry) = state.jobs.iter_mut().find(|j| j.job_id == job.job_id) else {
                // Processing jobs cannot be removed, so this is unreachable in practice.
                warn!("Job {} vanished while processing", job.job_id);
                return;
            };
            match &result {
                Ok(_) => entry.mark_complete(),
                Err(msg) => entry.mark_failed(msg.clone()),
            }
            let finished = entry.clone();
            match finished.status {
                JobStatus::Completed => state.completed += 1,
                _ => state.failed += 1,
            }
            finished
        };

        telemetry::record_job_telemetry(&finished);
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(msg) => (None, Some(msg)),
        };
        self.emit(QueueEvent::JobFinished {
            job_id: finished.job_id,
            name: finished.name,
            status: finished.status,
            outcome,
            error,
        });
    }

    fn schedule_prune(&self) {
        let engine = self.clone();
        let delay = self.shared.config.prune_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.prune_finished();
        });
    }

    /// Drops completed and failed jobs from the visible queue.
    pub fn prune_finished(&self) -> usize {
        let removed = {
            let mut state = self.state();
            let before = state.jobs.len();
            state.jobs.retain(|j| !j.status.is_terminal());
            before - state.jobs.len()
        };
        if removed > 0 {
            debug!("Pruned {} finished job(s)", removed);
            self.emit(QueueEvent::Pruned { removed });
        }
        removed
    }
}
