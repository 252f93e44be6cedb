//! Still-image engine, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Open** | `image::ImageReader` / `avif-parse` |
//! | **Verify** | full decode, `rav1d` for AVIF |
//! | **Thumbnail** | `to_rgb8` + Lanczos3 `resize` |
//! | **Save** | jpeg / png / lossless webp / rav1e avif |
//!
//! The module is split into:
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: output format and quality
//! - **Backend**: [`RasterEngine`] trait + [`RasterImage`] handle
//! - **Rust backend**: [`RustRasterEngine`], the production engine

mod avif_decoder;
pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, EngineError, RasterEngine, RasterImage, open_image};
pub use calculations::scale_dimensions;
pub use params::{OutputFormat, Quality, ResizeOptions};
pub use rust_backend::RustRasterEngine;
