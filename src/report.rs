//! Summary of one [`MediaImage`] for the CLI.
//!
//! [`MediaReport::from_image`] collects every derived property once;
//! [`format_report`] renders it as indented text and the CLI prints the
//! same struct as JSON with `--json`.
//!
//! ```text
//! animation.gif
//!     Format: gif (supported)
//!     Size: 320x240
//!     Checksum: 3f2a…
//!     Color: RGBA, 4 channels
//!     Animation: 12 frames, 1.2s, 10.00 fps
//!     Tags:
//!         File:FileType = "gif"
//!         File:ImageHeight = 240
//! ```
//!
//! Format functions are pure and return `Vec<String>`; `print_report` wraps
//! them for stdout.

use serde::Serialize;
use std::path::PathBuf;

use crate::format::FormatExtension;
use crate::imaging::Dimensions;
use crate::media_image::MediaImage;
use crate::metadata::MetadataBag;

#[derive(Debug, Clone, Serialize)]
pub struct MediaReport {
    pub path: PathBuf,
    pub checksum: String,
    pub format: FormatExtension,
    pub supported: bool,
    pub corrupt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub channels: Option<u8>,
    pub colorspace: Option<&'static str>,
    pub embedded_profile: bool,
    pub animated: bool,
    pub frame_count: Option<u64>,
    pub duration: Option<f64>,
    pub frame_rate: Option<f64>,
    pub metadata: MetadataBag,
}

impl MediaReport {
    pub fn from_image(image: &MediaImage) -> Self {
        Self {
            path: image.path().to_path_buf(),
            checksum: image.checksum().to_string(),
            format: image.file_ext(),
            supported: image.is_supported(),
            corrupt: image.is_corrupt(),
            error: image.error().map(str::to_string),
            dimensions: image.dimensions(),
            channels: image.channels(),
            colorspace: image.colorspace(),
            embedded_profile: image.has_embedded_profile(),
            animated: image.is_animated(),
            frame_count: image.frame_count(),
            duration: image.duration(),
            frame_rate: image.frame_rate(),
            metadata: image.metadata().clone(),
        }
    }
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

pub fn format_report(report: &MediaReport) -> Vec<String> {
    let mut lines = Vec::new();
    let name = report
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.path.display().to_string());
    lines.push(name);

    let support = if report.supported { "supported" } else { "unsupported" };
    lines.push(format!("    Format: {} ({})", report.format, support));

    lines.push(match report.dimensions {
        Some(d) => format!("    Size: {}x{}", d.width, d.height),
        None => "    Size: unknown".to_string(),
    });
    lines.push(format!("    Checksum: {}", report.checksum));

    match (report.colorspace, report.channels) {
        (Some(mode), Some(n)) => lines.push(format!("    Color: {mode}, {n} channels")),
        (None, None) => {}
        (mode, n) => lines.push(format!("    Color: {}, {} channels", or_unknown(mode), or_unknown(n))),
    }
    if report.embedded_profile {
        lines.push("    ICC profile: embedded".to_string());
    }

    if report.animated {
        let frames = or_unknown(report.frame_count);
        let duration = report
            .duration
            .map_or_else(|| "unknown".to_string(), |d| format!("{d}s"));
        let rate = report
            .frame_rate
            .map_or_else(|| "unknown".to_string(), |r| format!("{r:.2} fps"));
        lines.push(format!("    Animation: {frames} frames, {duration}, {rate}"));
    }

    if let Some(error) = &report.error {
        lines.push(format!("    Corrupt: {error}"));
    }

    if !report.metadata.is_empty() {
        lines.push("    Tags:".to_string());
        for (key, value) in report.metadata.iter() {
            lines.push(format!("        {key} = {value}"));
        }
    }
    lines
}

pub fn print_report(report: &MediaReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}
