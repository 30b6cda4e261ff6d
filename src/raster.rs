//! SVG page rasterization and image encoding.

use async_trait::async_trait;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tiff::encoder::compression::Lzw;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::fontdb;

use crate::error::ConvertError;
use crate::settings::OutputFormat;

/// WEBP encoder effort used for every page.
const WEBP_EFFORT: u8 = 6;

/// Largest width or height a WEBP image can have.
const WEBP_MAX_DIMENSION: u32 = 16383;

const METERS_PER_INCH: f64 = 0.0254;

/// Encoder parameters selected for an output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum EncodeOptions {
    Jpeg { quality: u8, optimize: bool },
    Png { quality: u8, compression_level: u8 },
    WebP { quality: u8, effort: u8 },
    Tiff { quality: u8, lzw: bool },
}

impl EncodeOptions {
    pub fn for_format(format: OutputFormat, quality: u8) -> Self {
        let quality = quality.clamp(1, 100);
        match format {
            OutputFormat::Jpeg => EncodeOptions::Jpeg {
                quality,
                optimize: true,
            },
            OutputFormat::Png => EncodeOptions::Png {
                quality,
                compression_level: (100 - quality) / 10,
            },
            OutputFormat::WebP => EncodeOptions::WebP {
                quality,
                effort: WEBP_EFFORT,
            },
            OutputFormat::Tiff => EncodeOptions::Tiff { quality, lzw: true },
        }
    }
}

/// Everything the rasterizer needs besides the drawing itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub options: EncodeOptions,
    pub dpi: u32,
}

impl EncodeRequest {
    pub fn new(format: OutputFormat, quality: u8, dpi: u32) -> Self {
        Self {
            options: EncodeOptions::for_format(format, quality),
            dpi,
        }
    }
}

/// Turns an SVG drawing description into encoded image bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, svg: &str, request: &EncodeRequest) -> Result<Vec<u8>, ConvertError>;
}

/// Rasterizer backed by resvg, encoding through the `image`, `png`, `webp` and `tiff` crates.
pub struct ResvgRasterizer {
    fontdb: Arc<fontdb::Database>,
}

impl ResvgRasterizer {
    /// Creates a rasterizer using the system fonts.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("Loaded {} font faces", db.len());
        Self::with_fonts(db)
    }

    pub fn with_fonts(db: fontdb::Database) -> Self {
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// Synchronous rasterize + encode.
    pub fn rasterize_blocking(&self, svg: &str, request: &EncodeRequest) -> Result<Vec<u8>, ConvertError> {
        let image = render_rgb(svg, &self.fontdb)?;
        encode(&image, request)
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Rasterizer for ResvgRasterizer {
    async fn rasterize(&self, svg: &str, request: &EncodeRequest) -> Result<Vec<u8>, ConvertError> {
        let svg = svg.to_owned();
        let request = *request;
        let fontdb = self.fontdb.clone();

        tokio::task::spawn_blocking(move || {
            let image = render_rgb(&svg, &fontdb)?;
            encode(&image, &request)
        })
        .await
        .map_err(|e| ConvertError::Encode(format!("rasterizer task failed: {}", e)))?
    }
}

fn render_rgb(svg: &str, fontdb: &Arc<fontdb::Database>) -> Result<RgbImage, ConvertError> {
    let options = usvg::Options {
        fontdb: fontdb.clone(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| ConvertError::Encode(format!("failed to parse SVG: {}", e)))?;

    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(ConvertError::Encode(format!(
            "invalid SVG dimensions: {}x{}",
            size.width(),
            size.height()
        )));
    }

    let size = size.to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        ConvertError::Encode(format!(
            "cannot allocate {}x{} pixmap",
            size.width(),
            size.height()
        ))
    })?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let rgba = RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| ConvertError::Encode("failed to build image buffer from SVG".to_string()))?;
    Ok(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
}

fn png_compression(level: u8) -> png::Compression {
    match level {
        0..=3 => png::Compression::Fast,
        4..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    }
}

/// Pixels per metre for the PNG pHYs chunk.
fn pixels_per_meter(dpi: u32) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

/// Encodes an RGB page image according to `request`.
///
/// The DPI is written into every format's resolution metadata.
pub fn encode(image: &RgbImage, request: &EncodeRequest) -> Result<Vec<u8>, ConvertError> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();

    match request.options {
        EncodeOptions::Jpeg { quality, .. } => {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
            encoder.set_pixel_density(PixelDensity::dpi(request.dpi.min(u16::MAX as u32) as u16));
            encoder
                .encode_image(image)
                .map_err(|e| ConvertError::Encode(format!("jpeg: {}", e)))?;
        }
        EncodeOptions::Png {
            compression_level, ..
        } => {
            let ppm = pixels_per_meter(request.dpi);
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png_compression(compression_level));
            encoder.set_adaptive_filter(png::AdaptiveFilterType::Adaptive);
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));

            let mut writer = encoder
                .write_header()
                .map_err(|e| ConvertError::Encode(format!("png: {}", e)))?;
            writer
                .write_image_data(image.as_raw())
                .map_err(|e| ConvertError::Encode(format!("png: {}", e)))?;
            writer
                .finish()
                .map_err(|e| ConvertError::Encode(format!("png: {}", e)))?;
        }
        EncodeOptions::WebP { quality, .. } => {
            if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
                return Err(ConvertError::Encode(format!(
                    "webp: {}x{} exceeds the {} px limit",
                    width, height, WEBP_MAX_DIMENSION
                )));
            }
            let encoded = webp::Encoder::from_rgb(image.as_raw(), width, height)
                .encode_simple(false, quality as f32)
                .map_err(|e| ConvertError::Encode(format!("webp: {:?}", e)))?;
            bytes.extend_from_slice(&encoded);
        }
        EncodeOptions::Tiff { .. } => {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut bytes))
                .map_err(|e| ConvertError::Encode(format!("tiff: {}", e)))?;
            let mut page = encoder
                .new_image_with_compression::<colortype::RGB8, _>(width, height, Lzw::default())
                .map_err(|e| ConvertError::Encode(format!("tiff: {}", e)))?;
            page.resolution(
                ResolutionUnit::Inch,
                Rational {
                    n: request.dpi,
                    d: 1,
                },
            );
            page.write_data(image.as_raw())
                .map_err(|e| ConvertError::Encode(format!("tiff: {}", e)))?;
        }
    }

    Ok(bytes)
}
