//! Synthetic image fixtures for unit and integration tests.
//!
//! Every fixture is encoded at test time with the `image` crate's own
//! encoders, so the test suite carries no binary files.

use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;

/// A gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 90);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// An RGBA PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 200])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// An animated GIF with one solid-colour frame per delay (milliseconds).
///
/// GIF stores delays in centiseconds, so pass multiples of 10.
pub fn create_animated_gif(path: &Path, width: u32, height: u32, delays_ms: &[u32]) {
    let frames = delays_ms.iter().enumerate().map(|(i, &ms)| {
        let shade = (i * 60 % 256) as u8;
        let img = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255]));
        Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(ms, 1))
    });
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.encode_frames(frames).unwrap();
}
