//! Per-file conversion: text to paginated images, OCR text to markdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::job::{ConversionJob, JobKind};
use crate::ocr::{OcrEngine, ProgressSink, DEFAULT_OCR_LANGUAGE};
use crate::paginate::{paginate, PageLayout};
use crate::raster::{EncodeRequest, Rasterizer};
use crate::render::{render_page, PageContext};
use crate::settings::RenderSettings;
use crate::wrap::{Banner, WrappedDocument};

/// Timestamp format embedded in OCR output file names.
const OCR_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Text encodings tried when reading a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Default encoding order.
pub const DEFAULT_ENCODINGS: &[TextEncoding] = &[TextEncoding::Utf8, TextEncoding::Latin1];

/// Decodes `bytes` with the first encoding that accepts them.
pub fn decode_text(
    path: &Path,
    bytes: &[u8],
    encodings: &[TextEncoding],
) -> Result<(String, TextEncoding), ConvertError> {
    encodings
        .iter()
        .find_map(|enc| enc.decode(bytes).map(|text| (text, *enc)))
        .ok_or_else(|| ConvertError::Encoding {
            path: path.to_path_buf(),
        })
}

/// One written page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub lines: usize,
}

/// Outcome of a text conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub output_files: Vec<OutputFile>,
    pub total_pages: usize,
    pub total_size_bytes: u64,
}

/// Outcome of an OCR save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobOutcome {
    Pages(ConversionResult),
    Ocr(OcrOutput),
}

/// Size in KB, rounded, as shown in logs.
pub fn kilobytes(bytes: u64) -> u64 {
    (bytes as f64 / 1024.0).round() as u64
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// `{base}.{ext}` for a single page, `{base}_{NNN}.{ext}` otherwise.
pub fn page_file_name(base: &str, page_number: usize, total_pages: usize, ext: &str) -> String {
    if total_pages == 1 {
        format!("{}.{}", base, ext)
    } else {
        format!("{}_{:03}.{}", base, page_number, ext)
    }
}

pub fn ocr_file_name(base: &str, timestamp: DateTime<Utc>) -> String {
    format!("ocr_{}_{}.md", base, timestamp.format(OCR_TIME_FORMAT))
}

async fn prepare_output_dir(settings: &RenderSettings, source: &Path) -> Result<PathBuf, ConvertError> {
    let dir = settings.resolve_output_dir(source);
    if settings.output_dir.is_some() {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConvertError::io(format!("Failed to create {}", dir.display()), e))?;
    }
    Ok(dir)
}

/// Writes recognized text as `ocr_{base}_{timestamp}.md`.
///
/// Fails instead of replacing an existing file.
pub async fn save_ocr_result(
    original_path: &Path,
    content: &str,
    settings: &RenderSettings,
    timestamp: DateTime<Utc>,
) -> Result<OcrOutput, ConvertError> {
    let dir = prepare_output_dir(settings, original_path).await?;
    let path = dir.join(ocr_file_name(&base_name(original_path), timestamp));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(|e| ConvertError::io(format!("Failed to create {}", path.display()), e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| ConvertError::io(format!("Failed to write {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| ConvertError::io(format!("Failed to write {}", path.display()), e))?;

    let size_bytes = content.len() as u64;
    info!("Saved: {} ({} KB)", path.display(), kilobytes(size_bytes));
    Ok(OcrOutput { path, size_bytes })
}

/// Runs the wrap, paginate, render and rasterize pipeline for single files.
pub struct DocumentConverter {
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    layout: PageLayout,
    encodings: Vec<TextEncoding>,
    ocr_language: String,
}

impl DocumentConverter {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            rasterizer,
            ocr,
            layout: PageLayout::default(),
            encodings: DEFAULT_ENCODINGS.to_vec(),
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
        }
    }

    pub fn with_layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_encodings(mut self, encodings: Vec<TextEncoding>) -> Self {
        self.encodings = encodings;
        self
    }

    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Dispatches a queued job by kind.
    pub async fn run(
        &self,
        job: &ConversionJob,
        settings: &RenderSettings,
        progress: &dyn ProgressSink,
    ) -> Result<JobOutcome, ConvertError> {
        match job.kind {
            JobKind::Text => {
                info!("Converting {} → {}...", job.name, settings.format);
                self.convert_text_file(&job.source_path, settings)
                    .await
                    .map(JobOutcome::Pages)
            }
            JobKind::Image => {
                info!("Converting {} → MD (OCR)...", job.name);
                self.convert_image_file(&job.source_path, settings, progress)
                    .await
                    .map(JobOutcome::Ocr)
            }
        }
    }

    pub async fn convert_text_file(
        &self,
        path: &Path,
        settings: &RenderSettings,
    ) -> Result<ConversionResult, ConvertError> {
        self.convert_text_file_at(path, settings, Utc::now()).await
    }

    /// Converts one text file, stamping banner and footers with `timestamp`.
    ///
    /// Pages already written stay on disk if a later page fails.
    pub async fn convert_text_file_at(
        &self,
        path: &Path,
        settings: &RenderSettings,
        timestamp: DateTime<Utc>,
    ) -> Result<ConversionResult, ConvertError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| ConvertError::io(format!("Failed to read {}", path.display()), e))?;
        let (content, encoding) = decode_text(path, &bytes, &self.encodings)?;
        debug!("Decoded {} as {:?}", path.display(), encoding);

        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_uppercase()))
            .unwrap_or_default();
        let banner = Banner {
            source_name: &source_name,
            extension: &extension,
            dpi: settings.dpi,
            quality: settings.quality,
            timestamp,
        }
        .lines();

        let document = WrappedDocument::new(&banner, &content, self.layout.char_budget());
        let pages = paginate(&document.lines, &self.layout);
        let total_pages = pages.len();

        let ctx = PageContext {
            layout: self.layout,
            dpi: settings.dpi,
            timestamp,
        };
        let request = EncodeRequest::new(settings.format, settings.quality, settings.dpi);
        let output_dir = prepare_output_dir(settings, path).await?;
        let base = base_name(path);

        let mut output_files = Vec::with_capacity(total_pages);
        for page in &pages {
            let svg = render_page(page, &ctx);
            let encoded = self.rasterizer.rasterize(&svg, &request).await?;

            let output_path = output_dir.join(page_file_name(
                &base,
                page.number,
                total_pages,
                settings.format.extension(),
            ));
            fs::write(&output_path, &encoded)
                .await
                .map_err(|e| ConvertError::io(format!("Failed to write {}", output_path.display()), e))?;
            let size_bytes = fs::metadata(&output_path)
                .await
                .map_err(|e| ConvertError::io(format!("Failed to stat {}", output_path.display()), e))?
                .len();

            info!(
                "  {} ({} lines, {} KB)",
                output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                page.lines.len(),
                kilobytes(size_bytes)
            );
            output_files.push(OutputFile {
                path: output_path,
                size_bytes,
                lines: page.lines.len(),
            });
        }

        let total_size_bytes = output_files.iter().map(|f| f.size_bytes).sum();
        Ok(ConversionResult {
            output_files,
            total_pages,
            total_size_bytes,
        })
    }

    /// Recognizes text in an image and saves it next to the source (or in the override folder).
    pub async fn convert_image_file(
        &self,
        path: &Path,
        settings: &RenderSettings,
        progress: &dyn ProgressSink,
    ) -> Result<OcrOutput, ConvertError> {
        let text = self.ocr.recognize(path, &self.ocr_language, progress).await?;
        info!("OCR completed, saving MD file...");
        save_ocr_result(path, &text, settings, Utc::now()).await
    }
}
