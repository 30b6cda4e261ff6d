//! SEEDOC conversion worker library
//!
//! Turns text files into paginated raster images and image files into OCR
//! markdown, driven by a strictly serial in-process job queue.
//!
//! ## Module Overview
//!
//! - `wrap`: fixed-budget line wrapping and the document banner
//! - `paginate`: page geometry and line partitioning
//! - `render`: SVG drawing description for one page
//! - `raster`: SVG rasterization and JPEG/PNG/WEBP/TIFF encoding
//! - `converter`: per-file pipeline and output naming
//! - `ocr`: OCR collaborator (tesseract)
//! - `scan`: folder scanning for batch candidates
//! - `job`: job models and state transitions
//! - `queue`: the serial queue engine and its event channel
//! - `settings` / `config`: render settings and CLI configuration
//! - `telemetry`: OpenTelemetry integration and structured logging
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seedoc_worker::{
//!     converter::DocumentConverter,
//!     ocr::TesseractOcr,
//!     queue::{QueueConfig, QueueEngine},
//!     raster::ResvgRasterizer,
//!     settings::RenderSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let converter = DocumentConverter::new(
//!         Arc::new(ResvgRasterizer::new()),
//!         Arc::new(TesseractOcr::default()),
//!     );
//!     let engine = QueueEngine::new(converter, RenderSettings::default(), QueueConfig::default());
//!
//!     engine.enqueue(vec!["notes.txt", "scan.png"]);
//!     engine.wait_idle().await;
//!
//!     for job in engine.snapshot() {
//!         println!("{} {}", job.name, job.status);
//!     }
//! }
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod ocr;
pub mod paginate;
pub mod queue;
pub mod raster;
pub mod render;
pub mod scan;
pub mod settings;
pub mod telemetry;
pub mod wrap;
