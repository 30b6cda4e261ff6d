//! Command line and environment configuration for the worker binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::ocr::DEFAULT_OCR_LANGUAGE;
use crate::queue::QueueConfig;
use crate::settings::{OutputFormat, RenderSettings};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "seedoc-worker",
    version,
    about = "Converts text files into paginated images and images into OCR markdown"
)]
pub struct WorkerConfig {
    /// Files or folders to convert.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output image format for text files (jpg, png, webp, tiff).
    #[arg(short, long, env = "SEEDOC_FORMAT", default_value = "jpg")]
    pub format: String,

    /// Encoder quality.
    #[arg(short, long, env = "SEEDOC_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Resolution written into the image metadata.
    #[arg(long, env = "SEEDOC_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub dpi: u32,

    /// Write outputs here instead of next to each source file.
    #[arg(short, long, env = "SEEDOC_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Only scan the top level of folder inputs.
    #[arg(long, env = "SEEDOC_NO_RECURSIVE")]
    pub no_recursive: bool,

    /// Tesseract language hint for image inputs.
    #[arg(long, env = "SEEDOC_OCR_LANG", default_value = DEFAULT_OCR_LANGUAGE)]
    pub ocr_lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "SEEDOC_TESSERACT", default_value = "tesseract")]
    pub tesseract: PathBuf,

    /// How long finished jobs stay listed after a run.
    #[arg(long, env = "SEEDOC_PRUNE_DELAY_MS", default_value_t = 3000)]
    pub prune_delay_ms: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "SEEDOC_LOG_JSON")]
    pub log_json: bool,

    /// Print the final job list and results as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl WorkerConfig {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::parse(&self.format)
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings::new(self.quality, self.dpi, self.output_format())
            .with_output_dir(self.output_dir.clone())
    }

    pub fn recursive(&self) -> bool {
        !self.no_recursive
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            prune_delay: Duration::from_millis(self.prune_delay_ms),
        }
    }
}
