//! Error types for conversion jobs and queue operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single conversion job.
///
/// Every variant is caught at the job boundary by the queue engine and turned
/// into an `error` status with a human-readable message.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// None of the supported text encodings could decode the source file.
    #[error("could not detect a text encoding for {}", path.display())]
    Encoding { path: PathBuf },

    /// The rasterizer failed to produce an encoded image.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// Read, write or stat failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The OCR collaborator failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

impl ConvertError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failure of a queue mutation requested by the controlling surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("no job with id {0}")]
    NotFound(String),

    #[error("cannot remove {0} - currently processing")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_includes_context() {
        let err = ConvertError::io(
            "Failed to read /tmp/missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to read /tmp/missing.txt: No such file or directory"
        );
    }

    #[test]
    fn test_processing_removal_message() {
        let err = QueueError::Processing("notes.txt".to_string());
        assert_eq!(err.to_string(), "cannot remove notes.txt - currently processing");
    }
}
