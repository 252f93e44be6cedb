//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `(width, height)` down to fit inside a bounding box.
///
/// Images already inside the box are returned unchanged (no upscaling).
/// Otherwise both axes are multiplied by the same factor, chosen so the
/// limiting axis lands exactly on its bound; the other axis is rounded and
/// never drops below 1px.
///
/// # Examples
/// ```
/// # use mediafile::imaging::scale_dimensions;
/// assert_eq!(scale_dimensions(4000, 3000, 200, 200), (200, 150));
/// assert_eq!(scale_dimensions(100, 50, 200, 200), (100, 50));
/// ```
pub fn scale_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let scale_w = max_width as f64 / width as f64;
    let scale_h = max_height as f64 / height as f64;

    if scale_w <= scale_h {
        // Width is the limiting edge
        let h = (height as f64 * scale_w).round().max(1.0) as u32;
        (max_width.max(1), h)
    } else {
        let w = (width as f64 * scale_h).round().max(1.0) as u32;
        (w, max_height.max(1))
    }
}
