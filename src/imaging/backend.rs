//! Raster engine trait and the handle type it produces.
//!
//! The [`RasterEngine`] trait is the boundary to the still-image engine:
//! open, verify, thumbnail and save. Everything above it (policy,
//! [`MediaImage`](crate::MediaImage)) only sees [`RasterImage`] handles and
//! their typed accessors, so a mock engine can stand in for tests.
//!
//! A handle is released by dropping it. Handles are independent values:
//! [`RasterEngine::thumbnail`] returns a new one and leaves its input alone.
//!
//! The production implementation is
//! [`RustRasterEngine`](super::rust_backend::RustRasterEngine).

use super::params::{OutputFormat, Quality};
use image::{ColorType, DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Where a handle's pixels come from. Decoding is deferred until a caller
/// actually needs pixels (verify, thumbnail, save).
#[derive(Debug, Clone)]
pub(crate) enum PixelSource {
    /// Undecoded file contents in a format the `image` crate reads.
    Encoded { bytes: Vec<u8>, format: ImageFormat },
    /// Undecoded AVIF file contents.
    Avif(Vec<u8>),
    /// Already decoded pixels (thumbnails, synthetic handles).
    Decoded(DynamicImage),
}

/// An open image.
///
/// Accessors that don't apply to the current format return `None` rather
/// than a placeholder: a JPEG has no page count, a PNG handle has no delays.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    color: Option<ColorType>,
    delays: Option<Vec<u32>>,
    pages: Option<u32>,
    icc_profile: bool,
    /// Failure hit while walking frames during open; reported by verify.
    deferred_error: Option<String>,
    pub(crate) pixels: PixelSource,
}

impl RasterImage {
    pub(crate) fn new(width: u32, height: u32, pixels: PixelSource) -> Self {
        Self {
            width,
            height,
            color: None,
            delays: None,
            pages: None,
            icc_profile: false,
            deferred_error: None,
            pixels,
        }
    }

    /// A handle over already-decoded pixels.
    pub fn from_pixels(img: DynamicImage) -> Self {
        let (width, height, color) = (img.width(), img.height(), img.color());
        Self::new(width, height, PixelSource::Decoded(img)).with_color(color)
    }

    pub fn with_color(mut self, color: ColorType) -> Self {
        self.color = Some(color);
        self
    }

    /// Per-frame delays in milliseconds; also sets the page count.
    pub fn with_delays(mut self, delays: Vec<u32>) -> Self {
        self.pages = Some(delays.len() as u32);
        self.delays = Some(delays);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_icc_profile(mut self, present: bool) -> Self {
        self.icc_profile = present;
        self
    }

    pub(crate) fn with_deferred_error(mut self, message: Option<String>) -> Self {
        self.deferred_error = message;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Number of channels (bands).
    pub fn bands(&self) -> Option<u8> {
        self.color.map(|c| c.channel_count())
    }

    /// PIL-style mode string: `L`, `LA`, `RGB`, `RGBA`, `I;16`, …
    pub fn mode(&self) -> Option<&'static str> {
        self.color.and_then(color_mode)
    }

    pub fn delays(&self) -> Option<&[u32]> {
        self.delays.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.pages
    }

    pub fn has_icc_profile(&self) -> bool {
        self.icc_profile
    }

    pub(crate) fn deferred_error(&self) -> Option<&str> {
        self.deferred_error.as_deref()
    }
}

fn color_mode(color: ColorType) -> Option<&'static str> {
    Some(match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => return None,
    })
}

/// The still-image engine.
///
/// `open` must not panic on malformed input; it returns an error the caller
/// may either propagate or treat as "no image" (see [`open_image`]).
pub trait RasterEngine: Send + Sync {
    /// Open a file and read its header-level properties.
    fn open(&self, path: &Path) -> Result<RasterImage, EngineError>;

    /// Structural integrity check. Returns the failure message, if any.
    fn verify(&self, image: &RasterImage) -> Option<String>;

    /// Convert to 3-channel RGB and scale to fit within the box, keeping the
    /// aspect ratio.
    fn thumbnail(
        &self,
        image: &RasterImage,
        max_width: u32,
        max_height: u32,
    ) -> Result<RasterImage, EngineError>;

    /// Encode the handle's pixels into `dest`.
    fn save(
        &self,
        image: &RasterImage,
        dest: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), EngineError>;
}

/// Open `path`, either failing fast (`strict`) or mapping failure to `None`.
pub fn open_image(
    engine: &dyn RasterEngine,
    path: &Path,
    strict: bool,
) -> Result<Option<RasterImage>, EngineError> {
    match engine.open(path) {
        Ok(image) => Ok(Some(image)),
        Err(e) if strict => Err(e),
        Err(e) => {
            tracing::debug!("raster engine could not open {}: {e}", path.display());
            Ok(None)
        }
    }
}
