//! Pure Rust raster engine.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Header (JPEG, PNG, GIF, WebP, TIFF) | `image::ImageReader::into_decoder` |
//! | Header (AVIF) | `avif-parse` |
//! | Frame delays (GIF, animated WebP) | `image::AnimationDecoder::into_frames` |
//! | ICC profile presence | `image::ImageDecoder::icc_profile`, AVIF `colr` via [`container`](crate::container) |
//! | Decode (AVIF) | `rav1d`, see [`avif_decoder`](super::avif_decoder) |
//! | Thumbnail | `DynamicImage::to_rgb8` + `resize` with `Lanczos3` |
//! | Encode | `image::codecs::{jpeg, png, webp, avif}` |

use super::avif_decoder;
use super::backend::{EngineError, PixelSource, RasterEngine, RasterImage};
use super::params::{OutputFormat, Quality};
use crate::container;
use crate::format::FormatExtension;
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

/// Raster engine backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustRasterEngine;

impl RustRasterEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustRasterEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Delays and any decode error from walking every frame of an animation.
struct FrameWalk {
    delays: Vec<u32>,
    error: Option<String>,
}

/// Walk all frames, stopping at the first one that fails to decode. The
/// frames before it still count, so a truncated GIF keeps a page count.
fn walk_frames<'a>(decoder: impl AnimationDecoder<'a>) -> FrameWalk {
    let mut walk = FrameWalk {
        delays: Vec::new(),
        error: None,
    };
    for frame in decoder.into_frames() {
        match frame {
            Ok(frame) => {
                let (numer, denom) = frame.delay().numer_denom_ms();
                walk.delays.push(if denom == 0 { 0 } else { numer / denom });
            }
            Err(e) => {
                walk.error = Some(e.to_string());
                break;
            }
        }
    }
    walk
}

fn decode_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Decode(e.to_string())
}

fn encode_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Encode(e.to_string())
}

fn open_avif(bytes: Vec<u8>) -> Result<RasterImage, EngineError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(&bytes))
        .map_err(|e| EngineError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| EngineError::Decode(format!("Failed to read AVIF metadata: {e:?}")))?;
    let (width, height) = (meta.max_frame_width.get(), meta.max_frame_height.get());
    let icc = container::probe_bytes(&bytes, FormatExtension::Avif).has_icc_profile;

    // The decoder always produces interleaved RGB8
    Ok(RasterImage::new(width, height, PixelSource::Avif(bytes))
        .with_color(ColorType::Rgb8)
        .with_icc_profile(icc))
}

fn open_encoded(bytes: Vec<u8>, format: ImageFormat) -> Result<RasterImage, EngineError> {
    let (width, height, color, icc) = {
        let mut decoder = ImageReader::with_format(Cursor::new(&bytes[..]), format)
            .into_decoder()
            .map_err(decode_error)?;
        let icc = decoder.icc_profile().ok().flatten().is_some_and(|p| !p.is_empty());
        let (width, height) = decoder.dimensions();
        (width, height, decoder.color_type(), icc)
    };

    let walk = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(&bytes[..])).map_err(decode_error)?;
            Some(walk_frames(decoder))
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(&bytes[..])).map_err(decode_error)?;
            if decoder.has_animation() {
                Some(walk_frames(decoder))
            } else {
                None
            }
        }
        _ => None,
    };

    let mut image = RasterImage::new(width, height, PixelSource::Encoded { bytes, format })
        .with_color(color)
        .with_icc_profile(icc);

    image = match (format, walk) {
        (_, Some(walk)) => image.with_delays(walk.delays).with_deferred_error(walk.error),
        // A still WebP is one page without a delay
        (ImageFormat::WebP, None) => image.with_pages(1),
        _ => image,
    };
    Ok(image)
}

/// Decode a handle's pixels, borrowing when they are already in memory.
fn load_pixels(image: &RasterImage) -> Result<Cow<'_, DynamicImage>, EngineError> {
    match &image.pixels {
        PixelSource::Decoded(img) => Ok(Cow::Borrowed(img)),
        PixelSource::Encoded { bytes, format } => image::load_from_memory_with_format(bytes, *format)
            .map(Cow::Owned)
            .map_err(decode_error),
        PixelSource::Avif(bytes) => avif_decoder::decode(bytes).map(Cow::Owned),
    }
}

impl RasterEngine for RustRasterEngine {
    fn open(&self, path: &Path) -> Result<RasterImage, EngineError> {
        let bytes = std::fs::read(path)?;
        // `guess_format` only knows the `avif` brand, not `avis` sequences
        let format = match image::guess_format(&bytes) {
            Ok(format) => format,
            Err(_) if FormatExtension::sniff(&bytes) == Some(FormatExtension::Avif) => {
                ImageFormat::Avif
            }
            Err(e) => return Err(decode_error(e)),
        };
        match format {
            ImageFormat::Avif => open_avif(bytes),
            other => open_encoded(bytes, other),
        }
    }

    fn verify(&self, image: &RasterImage) -> Option<String> {
        if let Some(message) = image.deferred_error() {
            return Some(message.to_string());
        }
        load_pixels(image).err().map(|e| e.to_string())
    }

    fn thumbnail(
        &self,
        image: &RasterImage,
        max_width: u32,
        max_height: u32,
    ) -> Result<RasterImage, EngineError> {
        let rgb = DynamicImage::ImageRgb8(load_pixels(image)?.to_rgb8());
        let resized = rgb.resize(max_width, max_height, FilterType::Lanczos3);
        Ok(RasterImage::from_pixels(resized))
    }

    fn save(
        &self,
        image: &RasterImage,
        dest: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), EngineError> {
        let pixels = load_pixels(image)?;
        let q = quality.value() as u8;
        let mut writer = BufWriter::new(std::fs::File::create(dest)?);

        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel and no 16-bit mode
                let rgb = DynamicImage::ImageRgb8(pixels.to_rgb8());
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, q);
                rgb.write_with_encoder(encoder).map_err(encode_error)?;
            }
            OutputFormat::Png => {
                let encoder = image::codecs::png::PngEncoder::new(&mut writer);
                pixels.write_with_encoder(encoder).map_err(encode_error)?;
            }
            OutputFormat::Webp => {
                let img = if pixels.color().has_alpha() {
                    DynamicImage::ImageRgba8(pixels.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(pixels.to_rgb8())
                };
                let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut writer);
                img.write_with_encoder(encoder).map_err(encode_error)?;
            }
            OutputFormat::Avif => {
                let encoder =
                    image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut writer, 6, q);
                pixels.write_with_encoder(encoder).map_err(encode_error)?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_animated_gif, create_test_jpeg, create_test_png};

    #[test]
    fn open_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let image = RustRasterEngine::new().open(&path).unwrap();
        assert_eq!(image.width(), 200);
        assert_eq!(image.height(), 150);
        assert_eq!(image.bands(), Some(3));
        assert_eq!(image.mode(), Some("RGB"));
        assert_eq!(image.page_count(), None);
        assert_eq!(image.delays(), None);
        assert!(!image.has_icc_profile());
    }

    #[test]
    fn open_rgba_png_reports_four_bands() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        create_test_png(&path, 16, 8);

        let image = RustRasterEngine::new().open(&path).unwrap();
        assert_eq!(image.bands(), Some(4));
        assert_eq!(image.mode(), Some("RGBA"));
    }

    #[test]
    fn open_animated_gif_collects_delays() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("anim.gif");
        create_animated_gif(&path, 20, 10, &[100, 200, 300]);

        let image = RustRasterEngine::new().open(&path).unwrap();
        assert_eq!(image.page_count(), Some(3));
        assert_eq!(image.delays(), Some(&[100, 200, 300][..]));
    }

    #[test]
    fn open_nonexistent_file_errors() {
        let result = RustRasterEngine::new().open(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn open_garbage_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("garbage.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(RustRasterEngine::new().open(&path).is_err());
    }

    #[test]
    fn verify_intact_file_passes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ok.png");
        create_test_png(&path, 32, 32);

        let engine = RustRasterEngine::new();
        let image = engine.open(&path).unwrap();
        assert_eq!(engine.verify(&image), None);
    }

    #[test]
    fn verify_truncated_png_reports_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("truncated.png");
        create_test_png(&path, 64, 64);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let engine = RustRasterEngine::new();
        // The header is intact, so open succeeds
        let image = engine.open(&path).unwrap();
        assert_eq!(image.width(), 64);
        assert!(engine.verify(&image).is_some());
    }

    #[test]
    fn thumbnail_fits_box_and_drops_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wide.png");
        create_test_png(&path, 400, 100);

        let engine = RustRasterEngine::new();
        let image = engine.open(&path).unwrap();
        let thumb = engine.thumbnail(&image, 200, 200).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (200, 50));
        assert_eq!(thumb.bands(), Some(3));
    }

    #[test]
    fn save_each_format_round_trips_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = RustRasterEngine::new();
        let image = RasterImage::from_pixels(DynamicImage::new_rgb8(40, 30));

        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp] {
            let dest = tmp.path().join(format!("out.{}", format.extension()));
            engine.save(&image, &dest, format, Quality::new(80)).unwrap();
            assert_eq!(image::image_dimensions(&dest).unwrap(), (40, 30), "{format}");
        }
    }

    #[test]
    fn save_avif_then_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = RustRasterEngine::new();
        let dest = tmp.path().join("out.avif");
        let image = RasterImage::from_pixels(DynamicImage::new_rgb8(64, 48));
        engine.save(&image, &dest, OutputFormat::Avif, Quality::new(85)).unwrap();

        let reopened = engine.open(&dest).unwrap();
        assert_eq!((reopened.width(), reopened.height()), (64, 48));
        assert!(!reopened.has_icc_profile());
        assert_eq!(engine.verify(&reopened), None);
    }
}
