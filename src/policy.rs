//! Per-format decisions.
//!
//! Pure functions keyed by [`FormatExtension`]. No I/O happens here; the
//! inputs are facts gathered elsewhere (container probe, raster engine,
//! video engine) and the outputs are what [`MediaImage`](crate::MediaImage)
//! does with them.
//!
//! ## Which engine to trust
//!
//! The raster engine and the video engine measure animations independently
//! and regularly disagree. ffmpeg's duration is wrong for some GIF and WebP
//! files, so for those two formats the per-frame delays from the raster
//! engine win. Everything else animated (APNG, AVIF sequences) goes to the
//! video engine.

use crate::format::FormatExtension;
use crate::metadata::ProbeMetadata;

/// Delays at or below this are treated as [`MIN_FRAME_DELAY_MS`] by browsers.
pub const NEAR_ZERO_DELAY_MS: u32 = 10;
pub const MIN_FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// Sum of the raster engine's per-frame delays.
    Raster,
    /// Container duration reported by the video engine.
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountSource {
    /// The raster engine's page count.
    RasterPages,
    /// The PNG `acTL` frame count tag, 1 when absent.
    AnimationFramesTag,
    /// The video engine's frame count.
    Video,
}

/// Whether a file of this format can be accepted.
///
/// AVIF is only accepted as a plain still image: rotated, cropped, grid and
/// animated AVIFs render inconsistently across browsers. Mirrored AVIFs
/// should be rejected too, but the probe can't see the mirror flag, so they
/// slip through (see [`metadata`](crate::metadata)).
///
/// Animated WebP is rejected outright.
pub fn is_supported(ext: FormatExtension, probe: &ProbeMetadata, is_animated: bool) -> bool {
    match ext {
        FormatExtension::Avif => {
            !probe.is_rotated && !probe.is_cropped && !probe.is_grid_image && !probe.is_animated_avif
        }
        FormatExtension::Webp => !is_animated,
        FormatExtension::Jpeg | FormatExtension::Png | FormatExtension::Gif | FormatExtension::Other => {
            true
        }
    }
}

pub fn duration_source(ext: FormatExtension) -> DurationSource {
    match ext {
        FormatExtension::Gif | FormatExtension::Webp => DurationSource::Raster,
        FormatExtension::Jpeg | FormatExtension::Png | FormatExtension::Avif | FormatExtension::Other => {
            DurationSource::Video
        }
    }
}

/// `None` for formats with no notion of frames.
pub fn frame_count_source(ext: FormatExtension) -> Option<FrameCountSource> {
    match ext {
        FormatExtension::Gif | FormatExtension::Webp => Some(FrameCountSource::RasterPages),
        FormatExtension::Png => Some(FrameCountSource::AnimationFramesTag),
        FormatExtension::Avif => Some(FrameCountSource::Video),
        FormatExtension::Jpeg | FormatExtension::Other => None,
    }
}

/// Total animation time in seconds from per-frame delays in milliseconds.
///
/// Delays of 10ms or less are raised to 100ms, matching browser playback.
pub fn duration_from_delays(delays: &[u32]) -> f64 {
    let total_ms: u64 = delays
        .iter()
        .map(|&d| if d <= NEAR_ZERO_DELAY_MS { MIN_FRAME_DELAY_MS } else { d })
        .map(u64::from)
        .sum();
    total_ms as f64 / 1000.0
}

/// Frames per second, or `None` unless the animation is well-defined.
pub fn frame_rate(is_animated: bool, frame_count: Option<u64>, duration: Option<f64>) -> Option<f64> {
    if !is_animated {
        return None;
    }
    let frames = frame_count?;
    let duration = duration?;
    if frames <= 1 || duration == 0.0 || !duration.is_finite() {
        return None;
    }
    Some(frames as f64 / duration)
}
