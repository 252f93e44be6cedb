//! [`VideoEngine`] backed by the `ffprobe` and `ffmpeg` CLIs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tempfile::TempPath;
use tokio::runtime::RuntimeFlavor;

use super::command::{ToolCommand, ToolError};
use super::{VideoEngine, VideoProbe};
use crate::config::VideoConfig;

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(ffprobe: PathBuf, ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe,
            ffmpeg,
            timeout,
        }
    }

    /// Resolve both tools from the config, falling back to `PATH`.
    ///
    /// Returns `None` when video probing is disabled or either tool is
    /// missing.
    pub fn from_config(config: &VideoConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let ffprobe = locate("ffprobe", config.ffprobe.as_deref())?;
        let ffmpeg = locate("ffmpeg", config.ffmpeg.as_deref())?;
        Some(Self::new(
            ffprobe,
            ffmpeg,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    async fn probe_async(&self, path: &Path) -> Result<VideoProbe, ToolError> {
        let output = ToolCommand::new(self.ffprobe.clone())
            .args([
                "-v",
                "error",
                "-count_packets",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await?;
        parse_probe_output(&output.stdout)
    }

    async fn smart_preview_async(&self, path: &Path, temp_dir: &Path) -> Result<TempPath, ToolError> {
        let spawn_error = |source| ToolError::Spawn {
            tool: "ffmpeg".into(),
            source,
        };
        let frame = tempfile::Builder::new()
            .prefix("media-frame-")
            .suffix(".png")
            .tempfile_in(temp_dir)
            .map_err(spawn_error)?
            .into_temp_path();

        ToolCommand::new(self.ffmpeg.clone())
            .args(["-y", "-v", "error", "-i"])
            .arg(path.to_string_lossy())
            .args(["-vf", "thumbnail", "-frames:v", "1"])
            .arg(frame.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await?;

        // ffmpeg exits 0 without writing anything when no frame decodes
        let written = std::fs::metadata(&frame).map_err(spawn_error)?.len();
        if written == 0 {
            return Err(ToolError::Parse {
                tool: "ffmpeg".into(),
                message: "no frame written".into(),
            });
        }
        Ok(frame)
    }
}

fn locate(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => which::which(p).or_else(|_| which::which(name)).ok(),
        None => which::which(name).ok(),
    }
}

/// Drive an async tool call from synchronous code.
///
/// A multi-thread runtime is reused through `block_in_place`. A
/// current-thread runtime can't block its only worker, so the call runs on
/// a scoped thread with its own runtime instead.
fn block_on<F>(future: F) -> Result<F::Output, std::io::Error>
where
    F: Future + Send,
    F::Output: Send,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_on_fresh_runtime(future))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        }),
        Err(_) => run_on_fresh_runtime(future),
    }
}

fn run_on_fresh_runtime<F: Future>(future: F) -> Result<F::Output, std::io::Error> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(future))
}

impl VideoEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> VideoProbe {
        let result = block_on(self.probe_async(path));
        match result {
            Ok(Ok(probe)) => probe,
            Ok(Err(e)) => {
                tracing::warn!("video probe failed for {}: {e}", path.display());
                VideoProbe::default()
            }
            Err(e) => {
                tracing::warn!("could not start tokio runtime: {e}");
                VideoProbe::default()
            }
        }
    }

    fn smart_preview(&self, path: &Path, temp_dir: &Path) -> Option<TempPath> {
        match block_on(self.smart_preview_async(path, temp_dir)) {
            Ok(Ok(frame)) => Some(frame),
            Ok(Err(e)) => {
                tracing::warn!("preview frame extraction failed for {}: {e}", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("could not start tokio runtime: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
}

fn parse_seconds(s: Option<&str>) -> Option<f64> {
    s.and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn parse_probe_output(stdout: &str) -> Result<VideoProbe, ToolError> {
    let output: FfprobeOutput = serde_json::from_str(stdout).map_err(|e| ToolError::Parse {
        tool: "ffprobe".into(),
        message: e.to_string(),
    })?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration = parse_seconds(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .or_else(|| parse_seconds(video.and_then(|s| s.duration.as_deref())));

    let frame_count = video.and_then(|s| {
        s.nb_read_packets
            .as_deref()
            .or(s.nb_frames.as_deref())
            .and_then(|n| n.parse::<u64>().ok())
    });

    Ok(VideoProbe {
        duration,
        frame_count,
    })
}
