//! AVIF pixel decoding via `avif-parse` and `rav1d`.
//!
//! The `image` crate's `avif` feature only covers encoding; its decoder
//! links the C dav1d library. `rav1d` is the pure Rust port with the same
//! C-style API, so every resource it hands out is wrapped in a [`Release`]
//! guard that runs the matching free call on every exit path.

use super::backend::EngineError;
use image::{DynamicImage, Rgb, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Owns a decoder resource and releases it on drop.
struct Release<T, F: FnMut(&mut T)> {
    value: T,
    release: F,
}

impl<T, F: FnMut(&mut T)> Release<T, F> {
    fn new(value: T, release: F) -> Self {
        Self { value, release }
    }
}

impl<T, F: FnMut(&mut T)> Deref for Release<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T, F: FnMut(&mut T)> DerefMut for Release<T, F> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T, F: FnMut(&mut T)> Drop for Release<T, F> {
    fn drop(&mut self) {
        (self.release)(&mut self.value);
    }
}

fn failed(message: String) -> EngineError {
    EngineError::Decode(message)
}

/// Decode the primary item of an AVIF file to RGB8.
pub fn decode(file_data: &[u8]) -> Result<DynamicImage, EngineError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(file_data))
        .map_err(|e| failed(format!("Failed to parse AVIF: {e:?}")))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed(format!("rav1d open failed ({})", rc.0)));
    }
    let ctx = Release::new(ctx, |c| unsafe { dav1d::dav1d_close(NonNull::new(c)) });

    let mut data = Dav1dData::default();
    let buf_ptr = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        return Err(failed("rav1d data_create failed".into()));
    }
    let mut data = Release::new(data, |d| unsafe { dav1d::dav1d_data_unref(NonNull::new(d)) });
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(*ctx, NonNull::new(&mut *data)) };
    if rc.0 != 0 {
        return Err(failed(format!("rav1d send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(*ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        return Err(failed(format!("rav1d get_picture failed ({})", rc.0)));
    }
    let pic = Release::new(pic, |p| unsafe { dav1d::dav1d_picture_unref(NonNull::new(p)) });

    let layout = pic.p.layout;
    let subsampling = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => None,
        DAV1D_PIXEL_LAYOUT_I420 => Some((true, true)),
        DAV1D_PIXEL_LAYOUT_I422 => Some((true, false)),
        DAV1D_PIXEL_LAYOUT_I444 => Some((false, false)),
        _ => return Err(failed(format!("Unsupported AVIF pixel layout: {layout}"))),
    };

    let plane = |index: usize, stride: isize| {
        pic.data[index]
            .map(|ptr| Plane {
                ptr: ptr.as_ptr() as *const u8,
                stride,
            })
            .ok_or_else(|| failed(format!("rav1d picture is missing plane {index}")))
    };

    let y = plane(0, pic.stride[0])?;
    let chroma = match subsampling {
        None => None,
        Some((ss_x, ss_y)) => Some(Chroma {
            u: plane(1, pic.stride[1])?,
            v: plane(2, pic.stride[1])?,
            ss_x,
            ss_y,
        }),
    };

    let frame = Frame {
        y,
        chroma,
        bpc: pic.p.bpc as u32,
    };
    let rgb = RgbImage::from_fn(pic.p.w as u32, pic.p.h as u32, |col, row| frame.rgb_at(col, row));
    Ok(DynamicImage::ImageRgb8(rgb))
}

#[derive(Clone, Copy)]
struct Plane {
    ptr: *const u8,
    stride: isize,
}

impl Plane {
    /// Sample at `(x, y)`. Depths above 8 bits are stored as u16.
    #[inline]
    fn sample(&self, x: u32, y: u32, bpc: u32) -> f32 {
        let row = y as isize * self.stride;
        if bpc <= 8 {
            (unsafe { *self.ptr.offset(row + x as isize) }) as f32
        } else {
            let offset = row + x as isize * 2;
            (unsafe { (self.ptr.offset(offset) as *const u16).read_unaligned() }) as f32
        }
    }
}

struct Chroma {
    u: Plane,
    v: Plane,
    ss_x: bool,
    ss_y: bool,
}

struct Frame {
    y: Plane,
    chroma: Option<Chroma>,
    bpc: u32,
}

impl Frame {
    /// BT.601 YCbCr to RGB, scaled down to 8 bits.
    fn rgb_at(&self, col: u32, row: u32) -> Rgb<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let luma = self.y.sample(col, row, self.bpc);
        let Some(chroma) = &self.chroma else {
            let v = to_u8(luma);
            return Rgb([v, v, v]);
        };

        let cx = if chroma.ss_x { col / 2 } else { col };
        let cy = if chroma.ss_y { row / 2 } else { row };
        let cb = chroma.u.sample(cx, cy, self.bpc) - center;
        let cr = chroma.v.sample(cx, cy, self.bpc) - center;

        Rgb([
            to_u8(luma + 1.402 * cr),
            to_u8(luma - 0.344136 * cb - 0.714136 * cr),
            to_u8(luma + 1.772 * cb),
        ])
    }
}
