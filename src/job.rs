//! Job models and state management for the conversion queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extensions converted to page images.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "log", "json", "xml", "html", "htm", "csv", "py", "js", "ts", "jsx", "tsx", "css",
    "scss", "yaml", "yml", "toml", "ini", "conf", "sh", "bat", "c", "cpp", "h", "hpp", "java", "go",
    "rs", "php", "rb", "swift", "kt", "sql", "r", "m", "pl",
];

/// Extensions routed to OCR.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif", "tiff", "tif"];

/// What a job converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Text file to page images.
    Text,
    /// Image file to markdown via OCR.
    Image,
}

impl JobKind {
    /// Detects the kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(JobKind::Text)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(JobKind::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Text => write!(f, "text"),
            JobKind::Image => write!(f, "image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One queued request to convert a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub job_id: String,
    pub source_path: PathBuf,
    /// File name shown in logs.
    pub name: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ConversionJob {
    pub fn new(source_path: PathBuf, kind: JobKind) -> Self {
        let now = Utc::now();
        let name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        Self {
            job_id: Uuid::new_v4().to_string(),
            source_path,
            name,
            kind,
            status: JobStatus::Pending,
            created_at: now,
            started_at: None,
            updated_at: now,
            error: None,
        }
    }

    /// Creates a job if the path has a recognized extension.
    pub fn from_path(source_path: PathBuf) -> Option<Self> {
        let kind = JobKind::from_path(&source_path)?;
        Some(Self::new(source_path, kind))
    }

    pub fn start_processing(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_complete(&mut self) {
        self.status = JobStatus::Completed;
        self.updated_at = Utc::now();
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Error;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    /// Time between start of processing and the terminal transition.
    pub fn processing_duration_ms(&self) -> Option<i64> {
        match (self.status.is_terminal(), self.started_at) {
            (true, Some(started)) => Some(
                self.updated_at
                    .signed_duration_since(started)
                    .num_milliseconds(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(JobKind::from_path(Path::new("a/notes.TXT")), Some(JobKind::Text));
        assert_eq!(JobKind::from_path(Path::new("main.rs")), Some(JobKind::Text));
        assert_eq!(JobKind::from_path(Path::new("scan.JPeG")), Some(JobKind::Image));
        assert_eq!(JobKind::from_path(Path::new("archive.zip")), None);
        assert_eq!(JobKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_job_creation() {
        let job = ConversionJob::from_path(PathBuf::from("/data/report.md")).unwrap();

        assert_eq!(job.name, "report.md");
        assert_eq!(job.kind, JobKind::Text);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error.is_none());
        assert!(job.processing_duration_ms().is_none());
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = ConversionJob::new(PathBuf::from("a.txt"), JobKind::Text);
        let b = ConversionJob::new(PathBuf::from("a.txt"), JobKind::Text);
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = ConversionJob::new(PathBuf::from("scan.png"), JobKind::Image);

        job.start_processing();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.processing_duration_ms().is_none());

        job.mark_failed("boom".to_string());
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.processing_duration_ms().is_some());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Completed).unwrap(), "\"completed\"");
        assert_eq!(JobStatus::Processing.to_string(), "processing");
    }
}
