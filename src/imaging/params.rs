//! Parameter types for derivative images.
//!
//! These describe *what* to produce. The [`backend`](super::backend) decides
//! how, so the orchestration in [`MediaImage`](crate::MediaImage) can be
//! exercised against a mock engine.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`OutputFormat`]: encoder for the derivative file.
//! - [`ResizeOptions`]: format + quality pair passed to `resize`/`preview`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Encoder used for derivative files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    /// Lossless only; quality is ignored.
    Webp,
    Avif,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Encoding choices for `resize` and `preview`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeOptions {
    pub format: OutputFormat,
    pub quality: Quality,
}
