//! Per-invocation render settings and the output format set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Raster formats a page can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
}

impl OutputFormat {
    /// Parses a user supplied format name. Unrecognized names fall back to JPEG.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => OutputFormat::Png,
            "webp" => OutputFormat::WebP,
            "tiff" | "tif" => OutputFormat::Tiff,
            _ => OutputFormat::Jpeg,
        }
    }

    /// File extension used for output pages.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().to_ascii_uppercase())
    }
}

/// Settings applied to one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Encoder quality, 1-100.
    pub quality: u8,
    pub dpi: u32,
    pub format: OutputFormat,
    /// Explicit output folder. `None` writes next to the source file.
    pub output_dir: Option<PathBuf>,
}

impl RenderSettings {
    pub fn new(quality: u8, dpi: u32, format: OutputFormat) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            dpi: dpi.max(1),
            format,
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Directory outputs for `source` are written to.
    pub fn resolve_output_dir(&self, source: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::new(80, 200, OutputFormat::Jpeg)
    }
}
