//! OCR collaborator: image file to recognized text.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::ConvertError;

/// Language hint used when none is configured (Korean + English models).
pub const DEFAULT_OCR_LANGUAGE: &str = "kor+eng";

/// Receives recognition progress in percent (0-100).
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Sink that discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Recognizes text in an image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        image_path: &Path,
        language: &str,
        progress: &dyn ProgressSink,
    ) -> Result<String, ConvertError>;
}

/// OCR through the `tesseract` command line tool.
pub struct TesseractOcr {
    binary: PathBuf,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(
        &self,
        image_path: &Path,
        language: &str,
        progress: &dyn ProgressSink,
    ) -> Result<String, ConvertError> {
        progress.report(0);
        debug!(
            "Running {} on {} (lang={})",
            self.binary.display(),
            image_path.display(),
            language
        );

        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await
            .map_err(|e| {
                ConvertError::Recognition(format!(
                    "failed to run {} (is it installed?): {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Recognition(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        progress.report(100);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<u8>>);

    impl ProgressSink for Recorded {
        fn report(&self, percent: u8) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_recognition_error() {
        let ocr = TesseractOcr::new("/nonexistent/seedoc-tesseract");
        let progress = Recorded::default();

        let result = ocr
            .recognize(Path::new("scan.png"), DEFAULT_OCR_LANGUAGE, &progress)
            .await;

        assert!(matches!(result, Err(ConvertError::Recognition(_))));
        assert_eq!(*progress.0.lock().unwrap(), vec![0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_binary_reports_stderr() {
        // `false` exits non-zero regardless of arguments
        let ocr = TesseractOcr::new("false");
        let result = ocr
            .recognize(Path::new("scan.png"), DEFAULT_OCR_LANGUAGE, &NoProgress)
            .await;

        assert!(matches!(result, Err(ConvertError::Recognition(msg)) if msg.starts_with("tesseract failed")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_returned_as_text() {
        // `echo` prints its arguments, standing in for recognized text
        let ocr = TesseractOcr::new("echo");
        let progress = Recorded::default();

        let text = ocr
            .recognize(Path::new("scan.png"), "eng", &progress)
            .await
            .unwrap();

        assert_eq!(text.trim(), "scan.png stdout -l eng");
        assert_eq!(*progress.0.lock().unwrap(), vec![0, 100]);
    }
}
