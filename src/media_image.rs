//! One uploaded image file and everything derived from it.
//!
//! [`MediaImage`] ties together the three measurement sources:
//!
//! - the **raster engine** ([`RasterEngine`]) for pixels, colour, frame
//!   delays and page counts,
//! - the **container probe** ([`container::probe`]) for header facts the
//!   raster engine can't see (AVIF transforms, APNG frame counts), and the
//!   fallback dimensions when the raster engine can't open the file,
//! - the **video engine** ([`VideoEngine`]) for container durations.
//!
//! [`policy`] decides which source wins for each format.
//!
//! ## Lifecycle
//!
//! ```text
//! Unopened ──first raster read──▶ Open | Unavailable
//!     │                               │
//!     └────────────── close() ────────┴──▶ Closed
//! ```
//!
//! The raster handle is opened leniently on first use and held until
//! [`MediaImage::close`]. After close, raster-backed reads return `None`.
//! [`MediaImage::error`] never touches the held handle; it opens its own,
//! strictly, and drops it before returning.
//!
//! ## Caching
//!
//! The video probe, dimensions, error, metadata, container probe and the
//! animated GIF/PNG/WebP predicates are computed once. Everything else is
//! recomputed per call from the already-open handle.
//!
//! `MediaImage` is `Send` but not `Sync`.

use std::cell::{OnceCell, Ref, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempPath;
use thiserror::Error;

use crate::config::MediaConfig;
use crate::container;
use crate::format::{FormatExtension, SNIFF_LEN};
use crate::imaging::{
    Dimensions, EngineError, RasterEngine, RasterImage, ResizeOptions, RustRasterEngine,
    open_image, scale_dimensions,
};
use crate::metadata::{MetadataBag, ProbeMetadata, RASTER_ERROR};
use crate::policy::{self, DurationSource, FrameCountSource};
use crate::video::{FfmpegEngine, NoVideoEngine, VideoEngine, VideoProbe};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("raster engine cannot open {}", .0.display())]
    Unreadable(PathBuf),
    #[error("dimensions of {} are unknown", .0.display())]
    UnknownDimensions(PathBuf),
}

/// A file as handed over by the upload layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub path: PathBuf,
    /// SHA-256 of the contents, lowercase hex.
    pub checksum: String,
    pub extension: FormatExtension,
}

impl MediaSource {
    /// Hash the file and detect its format from content, then name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, MediaError> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        let head = &bytes[..bytes.len().min(SNIFF_LEN)];
        let extension = FormatExtension::detect(&path, head);
        Ok(Self {
            path,
            checksum,
            extension,
        })
    }
}

/// The engines and scratch directory shared by a family of images.
#[derive(Clone)]
pub struct Engines {
    pub raster: Arc<dyn RasterEngine>,
    pub video: Arc<dyn VideoEngine>,
    pub temp_dir: PathBuf,
}

impl Engines {
    pub fn new(
        raster: Arc<dyn RasterEngine>,
        video: Arc<dyn VideoEngine>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            raster,
            video,
            temp_dir: temp_dir.into(),
        }
    }

    /// Production engines. Video probing falls back to [`NoVideoEngine`]
    /// when it's disabled or ffprobe/ffmpeg can't be found.
    pub fn from_config(config: &MediaConfig) -> Self {
        let video: Arc<dyn VideoEngine> = match FfmpegEngine::from_config(&config.video) {
            Some(engine) => Arc::new(engine),
            None => {
                if config.video.enabled {
                    tracing::warn!("ffprobe/ffmpeg not found, animation timing will be limited");
                }
                Arc::new(NoVideoEngine)
            }
        };
        Self::new(Arc::new(RustRasterEngine::new()), video, config.temp_dir())
    }
}

enum RasterSlot {
    Unopened,
    Open(RasterImage),
    /// The lenient open failed; don't retry.
    Unavailable,
    Closed,
}

/// The image used to generate previews.
pub enum PreviewFrame {
    /// Static image: the parent previews itself.
    SameAsParent,
    /// One frame extracted from an animation. Owned by the parent.
    Extracted(Box<MediaImage>),
}

pub struct MediaImage {
    source: MediaSource,
    engines: Engines,
    raster: RefCell<RasterSlot>,
    preview_frame: OnceCell<PreviewFrame>,
    video: OnceCell<VideoProbe>,
    dimensions: OnceCell<Option<Dimensions>>,
    error: OnceCell<Option<String>>,
    is_corrupt: OnceCell<bool>,
    metadata: OnceCell<MetadataBag>,
    probe: OnceCell<ProbeMetadata>,
    animated_gif: OnceCell<bool>,
    animated_png: OnceCell<bool>,
    animated_webp: OnceCell<bool>,
    /// Deleted when the image is dropped.
    backing_file: Option<TempPath>,
}

impl fmt::Debug for MediaImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaImage")
            .field("path", &self.source.path)
            .field("checksum", &self.source.checksum)
            .field("extension", &self.source.extension)
            .finish_non_exhaustive()
    }
}

impl MediaImage {
    pub fn new(source: MediaSource, engines: Engines) -> Self {
        Self {
            source,
            engines,
            raster: RefCell::new(RasterSlot::Unopened),
            preview_frame: OnceCell::new(),
            video: OnceCell::new(),
            dimensions: OnceCell::new(),
            error: OnceCell::new(),
            is_corrupt: OnceCell::new(),
            metadata: OnceCell::new(),
            probe: OnceCell::new(),
            animated_gif: OnceCell::new(),
            animated_png: OnceCell::new(),
            animated_webp: OnceCell::new(),
            backing_file: None,
        }
    }

    /// Hash and wrap a file on disk.
    pub fn open(path: impl Into<PathBuf>, engines: Engines) -> Result<Self, MediaError> {
        Ok(Self::new(MediaSource::from_path(path)?, engines))
    }

    /// Wrap a temp file that lives as long as the returned image.
    fn from_temp(file: TempPath, engines: Engines) -> Result<Self, MediaError> {
        let mut image = Self::open(file.to_path_buf(), engines)?;
        image.backing_file = Some(file);
        Ok(image)
    }

    pub fn path(&self) -> &Path {
        &self.source.path
    }

    pub fn checksum(&self) -> &str {
        &self.source.checksum
    }

    pub fn file_ext(&self) -> FormatExtension {
        self.source.extension
    }

    // -------------------------------------------------------------------------
    // Raster handle
    // -------------------------------------------------------------------------

    /// The held raster handle, opened leniently on first use.
    fn image(&self) -> Option<Ref<'_, RasterImage>> {
        {
            let mut slot = self.raster.borrow_mut();
            if matches!(*slot, RasterSlot::Unopened) {
                // Lenient opens never return Err
                *slot = match open_image(self.engines.raster.as_ref(), self.path(), false) {
                    Ok(Some(image)) => RasterSlot::Open(image),
                    Ok(None) | Err(_) => RasterSlot::Unavailable,
                };
            }
        }
        Ref::filter_map(self.raster.borrow(), |slot| match slot {
            RasterSlot::Open(image) => Some(image),
            RasterSlot::Unopened | RasterSlot::Unavailable | RasterSlot::Closed => None,
        })
        .ok()
    }

    fn probe(&self) -> &ProbeMetadata {
        self.probe
            .get_or_init(|| container::probe(self.path(), self.file_ext()))
    }

    fn video(&self) -> VideoProbe {
        *self
            .video
            .get_or_init(|| self.engines.video.probe(self.path()))
    }

    // -------------------------------------------------------------------------
    // Identity and validity
    // -------------------------------------------------------------------------

    /// Raster engine dimensions, else the container header's, else `None`.
    pub fn dimensions(&self) -> Option<Dimensions> {
        *self.dimensions.get_or_init(|| {
            self.image().map(|image| image.dimensions()).or_else(|| {
                self.probe()
                    .dimensions()
                    .map(|(width, height)| Dimensions { width, height })
            })
        })
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions().map(|d| d.width)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions().map(|d| d.height)
    }

    /// Whether the format and its flags are acceptable. Not the same as
    /// being intact; see [`is_corrupt`](Self::is_corrupt).
    pub fn is_supported(&self) -> bool {
        policy::is_supported(self.file_ext(), self.probe(), self.is_animated())
    }

    pub fn is_corrupt(&self) -> bool {
        *self.is_corrupt.get_or_init(|| self.error().is_some())
    }

    /// Why the raster engine rejects this file, if it does.
    pub fn error(&self) -> Option<&str> {
        self.error
            .get_or_init(|| {
                let message = match open_image(self.engines.raster.as_ref(), self.path(), true) {
                    Ok(Some(image)) => {
                        let result = self.engines.raster.verify(&image);
                        drop(image);
                        result
                    }
                    Ok(None) => None,
                    Err(e) => Some(e.to_string()),
                };
                message.filter(|m| !m.is_empty())
            })
            .as_deref()
    }

    /// Container tags plus [`RASTER_ERROR`] when the file is corrupt.
    pub fn metadata(&self) -> &MetadataBag {
        self.metadata.get_or_init(|| {
            let mut extra = MetadataBag::new();
            if let Some(error) = self.error() {
                extra.insert(RASTER_ERROR, error);
            }
            self.probe().to_bag(self.file_ext()).merge(extra)
        })
    }

    // -------------------------------------------------------------------------
    // Animation
    // -------------------------------------------------------------------------

    /// Page count from the raster engine (GIF frames, WebP frames).
    pub fn n_pages(&self) -> Option<u32> {
        self.image().and_then(|image| image.page_count())
    }

    /// Sum of the raster engine's frame delays, in seconds.
    pub fn raster_duration(&self) -> Option<f64> {
        self.image()
            .and_then(|image| image.delays().map(policy::duration_from_delays))
    }

    /// Container duration from the video engine, in seconds.
    pub fn video_duration(&self) -> Option<f64> {
        self.video().duration
    }

    pub fn frame_count(&self) -> Option<u64> {
        match policy::frame_count_source(self.file_ext())? {
            FrameCountSource::RasterPages => self.n_pages().map(u64::from),
            FrameCountSource::AnimationFramesTag => {
                Some(u64::from(self.probe().animation_frames.unwrap_or(1)))
            }
            FrameCountSource::Video => self.video().frame_count,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count().unwrap_or(0) > 1
    }

    /// Animation length in seconds; `None` for still images.
    pub fn duration(&self) -> Option<f64> {
        if !self.is_animated() {
            return None;
        }
        match policy::duration_source(self.file_ext()) {
            DurationSource::Raster => self.raster_duration(),
            DurationSource::Video => self.video_duration(),
        }
    }

    pub fn frame_rate(&self) -> Option<f64> {
        policy::frame_rate(self.is_animated(), self.frame_count(), self.duration())
    }

    pub fn is_animated_gif(&self) -> bool {
        *self
            .animated_gif
            .get_or_init(|| self.file_ext() == FormatExtension::Gif && self.is_animated())
    }

    pub fn is_animated_png(&self) -> bool {
        *self
            .animated_png
            .get_or_init(|| self.file_ext() == FormatExtension::Png && self.is_animated())
    }

    pub fn is_animated_webp(&self) -> bool {
        *self
            .animated_webp
            .get_or_init(|| self.file_ext() == FormatExtension::Webp && self.is_animated())
    }

    pub fn is_animated_avif(&self) -> bool {
        self.file_ext() == FormatExtension::Avif && self.is_animated()
    }

    // -------------------------------------------------------------------------
    // Pixels
    // -------------------------------------------------------------------------

    pub fn channels(&self) -> Option<u8> {
        self.image().and_then(|image| image.bands())
    }

    /// PIL-style mode, e.g. `RGB` or `LA`.
    pub fn colorspace(&self) -> Option<&'static str> {
        self.image().and_then(|image| image.mode())
    }

    pub fn has_embedded_profile(&self) -> bool {
        self.image().is_some_and(|image| image.has_icc_profile())
    }

    /// Stable identity of the file contents.
    pub fn pixel_hash(&self) -> &str {
        self.checksum()
    }

    // -------------------------------------------------------------------------
    // Derivatives
    // -------------------------------------------------------------------------

    /// Write an RGB copy scaled to fit `max_width` x `max_height`.
    ///
    /// The file lands in the temp dir as
    /// `media-preview-<checksum>-<random>.<ext>`. It is removed if encoding
    /// fails; on success it belongs to the caller, who deletes it when done.
    pub fn resize(
        &self,
        max_width: u32,
        max_height: u32,
        options: &ResizeOptions,
    ) -> Result<MediaImage, MediaError> {
        let engine = self.engines.raster.as_ref();
        let thumbnail = {
            let image = self
                .image()
                .ok_or_else(|| MediaError::Unreadable(self.path().to_path_buf()))?;
            engine.thumbnail(&image, max_width, max_height)?
        };

        let output = tempfile::Builder::new()
            .prefix(&format!("media-preview-{}-", self.checksum()))
            .suffix(&format!(".{}", options.format.extension()))
            .tempfile_in(&self.engines.temp_dir)?;
        engine.save(&thumbnail, output.path(), options.format, options.quality)?;
        drop(thumbnail);

        let (_, path) = output.keep().map_err(|e| MediaError::Io(e.error))?;
        tracing::info!(
            "wrote {} preview {} ({}x{})",
            options.format,
            path.display(),
            max_width,
            max_height
        );
        MediaImage::open(path, self.engines.clone())
    }

    /// Resize the representative frame to fit the box, keeping this image's
    /// aspect ratio. A closed image has no frame to resize.
    pub fn preview(
        &self,
        max_width: u32,
        max_height: u32,
        options: &ResizeOptions,
    ) -> Result<MediaImage, MediaError> {
        if self.is_closed() {
            return Err(MediaError::Unreadable(self.path().to_path_buf()));
        }
        let dims = self
            .dimensions()
            .ok_or_else(|| MediaError::UnknownDimensions(self.path().to_path_buf()))?;
        let (w, h) = scale_dimensions(dims.width, dims.height, max_width, max_height);
        match self.preview_frame() {
            PreviewFrame::SameAsParent => self.resize(w, h, options),
            PreviewFrame::Extracted(frame) => frame.resize(w, h, options),
        }
    }

    /// Still images preview themselves. Animations use the video engine's
    /// pick of a representative frame, or themselves if that fails.
    ///
    /// Nothing is extracted once the image is closed.
    pub fn preview_frame(&self) -> &PreviewFrame {
        self.preview_frame.get_or_init(|| {
            if self.is_closed() || !self.is_animated() {
                return PreviewFrame::SameAsParent;
            }
            let Some(frame) = self
                .engines
                .video
                .smart_preview(self.path(), &self.engines.temp_dir)
            else {
                tracing::debug!("no preview frame for {}, using first frame", self.path().display());
                return PreviewFrame::SameAsParent;
            };
            match MediaImage::from_temp(frame, self.engines.clone()) {
                Ok(image) => PreviewFrame::Extracted(Box::new(image)),
                Err(e) => {
                    tracing::warn!("extracted preview frame unusable: {e}");
                    PreviewFrame::SameAsParent
                }
            }
        })
    }

    /// Release the preview frame and the raster handle. Safe to call more
    /// than once, or on an image that was never opened.
    pub fn close(&mut self) {
        if let Some(PreviewFrame::Extracted(mut frame)) = self.preview_frame.take() {
            frame.close();
        }
        *self.raster.get_mut() = RasterSlot::Closed;
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.raster.borrow(), RasterSlot::Closed)
    }
}
