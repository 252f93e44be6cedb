//! File format identification.
//!
//! Every per-format decision in the crate branches on [`FormatExtension`]
//! with an exhaustive `match`, never on extension strings.
//!
//! Detection looks at the leading bytes first and only falls back to the
//! file name when the content is not recognised. Uploads routinely arrive
//! with the wrong extension (a GIF saved as `.jpg`), and the magic bytes are
//! what the decoders actually see.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Number of leading bytes needed by [`FormatExtension::sniff`].
pub const SNIFF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatExtension {
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Png,
    Gif,
    Webp,
    Avif,
    Other,
}

impl FormatExtension {
    /// Identify a format from its magic bytes.
    ///
    /// Returns `None` for anything that isn't one of the specially handled
    /// formats, so callers can decide whether to trust the file name instead.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF] {
            return Some(Self::Jpeg);
        }
        if data.len() >= 8 && data[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
            return Some(Self::Png);
        }
        if data.len() >= 6 && (&data[..6] == b"GIF87a" || &data[..6] == b"GIF89a") {
            return Some(Self::Gif);
        }
        if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        if data.len() >= 12
            && &data[4..8] == b"ftyp"
            && (&data[8..12] == b"avif" || &data[8..12] == b"avis")
        {
            return Some(Self::Avif);
        }
        None
    }

    /// Map a file name extension (case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => Self::Jpeg,
            "png" | "apng" => Self::Png,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "avif" => Self::Avif,
            _ => Self::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Other)
    }

    /// Detect from content, falling back to the path's extension.
    pub fn detect(path: &Path, head: &[u8]) -> Self {
        Self::sniff(head).unwrap_or_else(|| Self::from_path(path))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FormatExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
