//! Video/container engine.
//!
//! Animated formats that the raster engine can't time (APNG, AVIF image
//! sequences) are measured by an external tool instead. The
//! [`VideoEngine`] trait is that boundary. It never fails: every tool
//! problem is logged and reported as an absent value, because a missing
//! duration is a normal outcome for a still image.

mod command;
mod ffprobe;

pub use command::{ToolCommand, ToolError, ToolOutput};
pub use ffprobe::FfmpegEngine;

use serde::Serialize;
use std::path::Path;
use tempfile::TempPath;

/// What the video engine could measure about a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VideoProbe {
    /// Container duration in seconds.
    pub duration: Option<f64>,
    pub frame_count: Option<u64>,
}

pub trait VideoEngine: Send + Sync {
    fn probe(&self, path: &Path) -> VideoProbe;

    /// Extract a representative frame of an animation as a PNG in
    /// `temp_dir`. The file is deleted when the returned path is dropped.
    fn smart_preview(&self, path: &Path, temp_dir: &Path) -> Option<TempPath>;
}

/// Engine used when no video tooling is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVideoEngine;

impl VideoEngine for NoVideoEngine {
    fn probe(&self, _path: &Path) -> VideoProbe {
        VideoProbe::default()
    }

    fn smart_preview(&self, _path: &Path, _temp_dir: &Path) -> Option<TempPath> {
        None
    }
}
