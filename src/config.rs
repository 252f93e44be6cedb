//! Configuration module.
//!
//! Handles loading, validating, and merging a `mediafile.toml` file over the
//! stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! temp_dir = "/tmp"         # Where previews are written (default: OS temp dir)
//!
//! [preview]
//! format = "jpeg"           # jpeg | png | webp | avif
//! quality = 85              # Lossy quality (1-100)
//! max_width = 150           # Bounding box for previews
//! max_height = 150
//!
//! [video]
//! ffprobe = "/usr/bin/ffprobe"  # Explicit tool paths (default: found on PATH)
//! ffmpeg = "/usr/bin/ffmpeg"
//! timeout_secs = 30         # Child processes are killed after this long
//! enabled = true            # false skips video probing entirely
//! ```
//!
//! Config files are sparse; override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality, ResizeOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory for derivative files. `None` means the OS temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    pub preview: PreviewConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub format: OutputFormat,
    pub quality: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: Quality::default().value(),
            max_width: 150,
            max_height: 150,
        }
    }
}

impl PreviewConfig {
    pub fn resize_options(&self) -> ResizeOptions {
        ResizeOptions {
            format: self.format,
            quality: Quality::new(self.quality),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<PathBuf>,
    pub timeout_secs: u64,
    pub enabled: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffprobe: None,
            ffmpeg: None,
            timeout_secs: 30,
            enabled: true,
        }
    }
}

impl MediaConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.preview.quality) {
            return Err(ConfigError::Validation(
                "preview.quality must be 1-100".into(),
            ));
        }
        if self.preview.max_width == 0 || self.preview.max_height == 0 {
            return Err(ConfigError::Validation(
                "preview.max_width and preview.max_height must be non-zero".into(),
            ));
        }
        if self.video.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "video.timeout_secs must be non-zero".into(),
            ));
        }
        if let Some(dir) = self.temp_dir.as_ref().filter(|d| !d.is_dir()) {
            return Err(ConfigError::Validation(format!(
                "temp_dir {} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MediaConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MediaConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MediaConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an optional file.
///
/// `None` yields the validated stock defaults. A given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<MediaConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mediafile configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Directory where preview files are written.
# Defaults to the OS temp directory.
# temp_dir = "/tmp"

# ---------------------------------------------------------------------------
# Preview output
# ---------------------------------------------------------------------------
[preview]
# Encoder for preview files: "jpeg", "png", "webp" (lossless) or "avif".
format = "jpeg"

# Lossy encoding quality (1-100). Ignored by png and webp.
quality = 85

# Previews fit inside this box. Smaller images are never upscaled.
max_width = 150
max_height = 150

# ---------------------------------------------------------------------------
# Video/container probing (ffprobe + ffmpeg)
# ---------------------------------------------------------------------------
[video]
# Explicit tool paths. When unset, both are looked up on PATH.
# ffprobe = "/usr/bin/ffprobe"
# ffmpeg = "/usr/bin/ffmpeg"

# Seconds before a probe is killed and treated as absent.
timeout_secs = 30

# Set to false to skip video probing entirely. Durations of APNG and
# AVIF sequences are then unknown.
enabled = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = MediaConfig::default();
        assert_eq!(config.preview.format, OutputFormat::Jpeg);
        assert_eq!(config.preview.quality, 85);
        assert_eq!((config.preview.max_width, config.preview.max_height), (150, 150));
        assert_eq!(config.video.timeout_secs, 30);
        assert!(config.video.enabled);
        assert!(config.temp_dir.is_none());
    }

    #[test]
    fn load_config_without_file_is_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.preview.quality, 85);
        assert_eq!(config.temp_dir(), std::env::temp_dir());
    }

    #[test]
    fn load_config_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mediafile.toml");
        fs::write(
            &path,
            r#"
[preview]
format = "webp"
max_width = 300
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.preview.format, OutputFormat::Webp);
        assert_eq!(config.preview.max_width, 300);
        // Unspecified values should be defaults
        assert_eq!(config.preview.max_height, 150);
        assert_eq!(config.video.timeout_secs, 30);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let result = load_config(Some(Path::new("/nonexistent/mediafile.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mediafile.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn temp_dir_override() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mediafile.toml");
        fs::write(&path, format!("temp_dir = {:?}\n", tmp.path().to_str().unwrap())).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.temp_dir(), tmp.path());
    }

    #[test]
    fn resize_options_from_preview_config() {
        let preview = PreviewConfig {
            format: OutputFormat::Avif,
            quality: 60,
            ..PreviewConfig::default()
        };
        let options = preview.resize_options();
        assert_eq!(options.format, OutputFormat::Avif);
        assert_eq!(options.quality.value(), 60);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[video]
timeout_secs = 30
enabled = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[video]
enabled = false
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let video = merged.get("video").unwrap();
        assert_eq!(video.get("enabled").unwrap().as_bool(), Some(false));
        // timeout preserved from base
        assert_eq!(video.get("timeout_secs").unwrap().as_integer(), Some(30));
    }

    // =========================================================================
    // Unknown key rejection and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[preview]
qualty = 90
"#;
        let result: Result<MediaConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<MediaConfig, _> = toml::from_str("[previews]\nquality = 90\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<MediaConfig, _> = toml::from_str("[preview]\nformat = \"bmp\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = MediaConfig::default();
        config.preview.quality = 100;
        assert!(config.validate().is_ok());
        config.preview.quality = 1;
        assert!(config.validate().is_ok());
        config.preview.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.preview.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_box_rejected() {
        let mut config = MediaConfig::default();
        config.preview.max_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_timeout_rejected() {
        let mut config = MediaConfig::default();
        config.video.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_missing_temp_dir_rejected() {
        let config = MediaConfig {
            temp_dir: Some(PathBuf::from("/nonexistent/previews")),
            ..MediaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mediafile.toml");
        fs::write(&path, "[preview]\nquality = 200\n").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: MediaConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = MediaConfig::default();
        assert_eq!(config.preview.format, defaults.preview.format);
        assert_eq!(config.preview.quality, defaults.preview.quality);
        assert_eq!(config.preview.max_width, defaults.preview.max_width);
        assert_eq!(config.video.timeout_secs, defaults.video.timeout_secs);
        assert_eq!(config.video.enabled, defaults.video.enabled);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        assert!(table.contains_key("preview"));
        assert!(table.contains_key("video"));
        assert!(!table.contains_key("temp_dir"));
    }
}
