//! File metadata gathered without decoding pixels.
//!
//! Two layers live here:
//!
//! - [`ProbeMetadata`]: typed facts read from the container headers by
//!   [`container::probe`](crate::container::probe): dimensions, PNG
//!   animation frame count, WebP animation flag, AVIF transform flags.
//! - [`MetadataBag`]: the flat `Group:Tag → value` map exposed to callers.
//!   It is built from [`ProbeMetadata`] and then merged with synthetic
//!   entries such as [`RASTER_ERROR`].
//!
//! ## Known limitation: mirrored AVIFs
//!
//! AVIF images can carry an `imir` (mirror) property. Browsers disagree on
//! how to apply it, so mirrored AVIFs ought to be rejected like rotated ones.
//! The probe does not currently surface the mirror flag, which means mirrored
//! AVIFs are reported as supported.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::format::FormatExtension;

pub const FILE_TYPE: &str = "File:FileType";
pub const IMAGE_WIDTH: &str = "File:ImageWidth";
pub const IMAGE_HEIGHT: &str = "File:ImageHeight";
pub const PNG_ANIMATION_FRAMES: &str = "PNG:AnimationFrames";
pub const WEBP_ANIMATED: &str = "WebP:Animated";
pub const AVIF_ROTATED: &str = "AVIF:Rotated";
pub const AVIF_CROPPED: &str = "AVIF:Cropped";
pub const AVIF_GRID: &str = "AVIF:GridImage";
pub const AVIF_SEQUENCE: &str = "AVIF:ImageSequence";

/// Synthetic key carrying the raster engine's verification failure.
pub const RASTER_ERROR: &str = "Raster:Error";

/// Tag name → value map. Keys are unique; insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataBag(BTreeMap<String, Value>);

impl MetadataBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` on top of `self`; keys in `other` win.
    pub fn merge(mut self, other: MetadataBag) -> Self {
        self.0.extend(other.0);
        self
    }
}

impl FromIterator<(String, Value)> for MetadataBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Header-level facts about a file.
///
/// Every field is best-effort: a truncated or unknown file yields the
/// default (all `None` / `false`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `num_frames` from a PNG `acTL` chunk.
    pub animation_frames: Option<u32>,
    /// VP8X animation flag.
    pub is_animated_webp: bool,
    /// A non-zero `irot` property is attached.
    pub is_rotated: bool,
    /// A `clap` (clean aperture) property is attached.
    pub is_cropped: bool,
    /// The primary item is a `grid` derived image.
    pub is_grid_image: bool,
    /// The file is an AVIF image sequence (`avis` brand).
    pub is_animated_avif: bool,
    /// A `colr` property of type `prof` or `rICC` is attached.
    pub has_icc_profile: bool,
}

impl ProbeMetadata {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    /// Flatten into tags. Format-specific tags are only emitted for their format.
    pub fn to_bag(&self, ext: FormatExtension) -> MetadataBag {
        let mut bag = MetadataBag::new();
        bag.insert(FILE_TYPE, ext.as_str());
        if let Some(w) = self.width {
            bag.insert(IMAGE_WIDTH, w);
        }
        if let Some(h) = self.height {
            bag.insert(IMAGE_HEIGHT, h);
        }

        match ext {
            FormatExtension::Png => {
                if let Some(frames) = self.animation_frames {
                    bag.insert(PNG_ANIMATION_FRAMES, frames);
                }
            }
            FormatExtension::Webp => bag.insert(WEBP_ANIMATED, self.is_animated_webp),
            FormatExtension::Avif => {
                bag.insert(AVIF_ROTATED, self.is_rotated);
                bag.insert(AVIF_CROPPED, self.is_cropped);
                bag.insert(AVIF_GRID, self.is_grid_image);
                bag.insert(AVIF_SEQUENCE, self.is_animated_avif);
            }
            FormatExtension::Jpeg | FormatExtension::Gif | FormatExtension::Other => {}
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut base = MetadataBag::new();
        base.insert(IMAGE_WIDTH, 10);
        base.insert(RASTER_ERROR, "old");

        let mut overlay = MetadataBag::new();
        overlay.insert(RASTER_ERROR, "new");

        let merged = base.merge(overlay);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_str(RASTER_ERROR), Some("new"));
        assert_eq!(merged.get_u64(IMAGE_WIDTH), Some(10));
    }

    #[test]
    fn bag_serializes_as_flat_object() {
        let mut bag = MetadataBag::new();
        bag.insert(PNG_ANIMATION_FRAMES, 4);
        let json = serde_json::to_string(&bag).unwrap();
        assert_eq!(json, r#"{"PNG:AnimationFrames":4}"#);
    }

    #[test]
    fn png_tags_include_animation_frames() {
        let meta = ProbeMetadata {
            width: Some(32),
            height: Some(16),
            animation_frames: Some(3),
            ..Default::default()
        };
        let bag = meta.to_bag(FormatExtension::Png);
        assert_eq!(bag.get_str(FILE_TYPE), Some("png"));
        assert_eq!(bag.get_u64(IMAGE_WIDTH), Some(32));
        assert_eq!(bag.get_u64(PNG_ANIMATION_FRAMES), Some(3));
        assert!(!bag.contains_key(AVIF_ROTATED));
    }

    #[test]
    fn avif_tags_always_report_flags() {
        let meta = ProbeMetadata {
            is_rotated: true,
            ..Default::default()
        };
        let bag = meta.to_bag(FormatExtension::Avif);
        assert_eq!(bag.get(AVIF_ROTATED), Some(&Value::Bool(true)));
        assert_eq!(bag.get(AVIF_GRID), Some(&Value::Bool(false)));
        assert!(!bag.contains_key(IMAGE_WIDTH));
    }

    #[test]
    fn dimensions_require_both_axes() {
        let meta = ProbeMetadata {
            width: Some(5),
            ..Default::default()
        };
        assert_eq!(meta.dimensions(), None);
    }
}
