//! # mediafile
//!
//! Introspection and preview generation for uploaded image files.
//!
//! Given an arbitrary JPEG, PNG/APNG, GIF, WebP or AVIF upload, answer:
//!
//! - Is the format acceptable? ([`MediaImage::is_supported`])
//! - Is the file intact? ([`MediaImage::error`])
//! - How big is it, what colour model, is there an ICC profile?
//! - Is it animated, and if so how many frames over how long?
//!
//! and produce scaled previews of it ([`MediaImage::preview`]).
//!
//! # Two Measurement Sources
//!
//! A still-image **raster engine** ([`imaging::RasterEngine`]) and a
//! **video engine** ([`video::VideoEngine`], ffprobe/ffmpeg) both report on
//! animations, and they disagree. [`policy`] settles who is trusted for
//! what: GIF and WebP timing comes from per-frame delays, everything else
//! from the container duration. A header-level [`container`] parser fills
//! the gaps neither engine covers (AVIF transform flags, APNG frame counts)
//! and supplies dimensions when the raster engine can't open a file.
//!
//! ```text
//! MediaSource ──▶ MediaImage ──┬──▶ RasterEngine   (pixels, delays, pages)
//!                              ├──▶ container      (header facts)
//!                              ├──▶ VideoEngine    (duration, frame count)
//!                              └──▶ policy         (which answer wins)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`media_image`] | Orchestration, memoisation, resize/preview, resource ownership |
//! | [`policy`] | Pure per-format rules: support, duration/frame-count source, timing math |
//! | [`imaging`] | Raster engine trait, pure-Rust implementation, scaling math, output params |
//! | [`video`] | Video engine trait, ffprobe/ffmpeg implementation, subprocess runner |
//! | [`container`] | Byte-level header probe for PNG, GIF, JPEG, WebP and AVIF |
//! | [`metadata`] | Typed probe results and the flat tag bag |
//! | [`format`] | Format detection by magic bytes and file name |
//! | [`config`] | `mediafile.toml` loading, validation and merging |
//! | [`report`] | Serialisable per-file summary and its text rendering |
//!
//! # Design Decisions
//!
//! ## Absence Over Failure
//!
//! Queries degrade instead of failing: an unreadable file has no channels,
//! a still image has no frame rate, a missing ffprobe means no container
//! duration. Only [`MediaImage::error`] reports a failure, and it returns
//! the message as data.
//!
//! ## Pure-Rust Imaging
//!
//! The raster engine is the `image` crate plus `rav1d` for AVIF decoding and
//! `rav1e` for AVIF encoding, all statically linked. The only external
//! tools are ffprobe and ffmpeg, and they are optional.

pub mod config;
pub mod container;
pub mod format;
pub mod imaging;
pub mod media_image;
pub mod metadata;
pub mod policy;
pub mod report;
pub mod video;

pub use format::FormatExtension;
pub use media_image::{Engines, MediaError, MediaImage, MediaSource, PreviewFrame};

#[cfg(test)]
pub(crate) mod test_helpers;
