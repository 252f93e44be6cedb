//! Header-level container parser.
//!
//! Reads just enough of each format to answer the questions the raster
//! engine can't (or can't be trusted to) answer without a full decode:
//!
//! | Format | Chunks / boxes read | Facts |
//! |---|---|---|
//! | PNG | `IHDR`, `acTL` | dimensions, animation frame count |
//! | GIF | logical screen descriptor | dimensions |
//! | JPEG | first `SOFn` segment | dimensions |
//! | WebP | `VP8X`, `VP8 `, `VP8L` | canvas dimensions, animation flag |
//! | AVIF | `ftyp`, `moov`, `meta` → `pitm`/`iinf`/`iprp` | dimensions, `irot`, `clap`, ICC `colr`, grid, image sequence |
//!
//! Never fails: anything truncated or malformed just leaves the remaining
//! fields at their defaults. These values are the fallback when the raster
//! engine cannot open the file at all, so they must survive damaged input.

use std::path::Path;

use crate::format::FormatExtension;
use crate::metadata::ProbeMetadata;

/// Probe a file on disk. Unreadable files yield empty metadata.
pub fn probe(path: &Path, ext: FormatExtension) -> ProbeMetadata {
    match std::fs::read(path) {
        Ok(data) => probe_bytes(&data, ext),
        Err(e) => {
            tracing::debug!("container probe could not read {}: {e}", path.display());
            ProbeMetadata::default()
        }
    }
}

pub fn probe_bytes(data: &[u8], ext: FormatExtension) -> ProbeMetadata {
    match ext {
        FormatExtension::Png => probe_png(data),
        FormatExtension::Gif => probe_gif(data),
        FormatExtension::Jpeg => probe_jpeg(data),
        FormatExtension::Webp => probe_webp(data),
        FormatExtension::Avif => probe_avif(data),
        FormatExtension::Other => ProbeMetadata::default(),
    }
}

// ---------------------------------------------------------------------------
// Byte helpers
// ---------------------------------------------------------------------------

fn be_u16(data: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(pos..pos + 2)?.try_into().ok()?))
}

fn be_u32(data: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(pos..pos + 4)?.try_into().ok()?))
}

fn be_u64(data: &[u8], pos: usize) -> Option<u64> {
    Some(u64::from_be_bytes(data.get(pos..pos + 8)?.try_into().ok()?))
}

fn le_u16(data: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(pos..pos + 2)?.try_into().ok()?))
}

fn le_u24(data: &[u8], pos: usize) -> Option<u32> {
    let b = data.get(pos..pos + 3)?;
    Some(u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
}

fn le_u32(data: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(pos..pos + 4)?.try_into().ok()?))
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Walk chunks up to the first `IDAT`. `acTL` is required to precede image
/// data, so nothing after that point is relevant.
fn probe_png(data: &[u8]) -> ProbeMetadata {
    let mut meta = ProbeMetadata::default();
    if data.get(..8) != Some(&PNG_SIGNATURE[..]) {
        return meta;
    }

    let mut pos = 8;
    while let Some(len) = be_u32(data, pos) {
        let Some(kind) = data.get(pos + 4..pos + 8) else {
            break;
        };
        let body_start = pos + 8;
        let Some(body) = data.get(body_start..body_start + len as usize) else {
            break;
        };

        match kind {
            b"IHDR" => {
                meta.width = be_u32(body, 0);
                meta.height = be_u32(body, 4);
            }
            b"acTL" => meta.animation_frames = be_u32(body, 0),
            b"IDAT" | b"IEND" => break,
            _ => {}
        }

        // chunk data + CRC
        pos = body_start + len as usize + 4;
    }
    meta
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

fn probe_gif(data: &[u8]) -> ProbeMetadata {
    if data.len() < 10 || &data[..3] != b"GIF" {
        return ProbeMetadata::default();
    }
    ProbeMetadata {
        width: le_u16(data, 6).map(u32::from),
        height: le_u16(data, 8).map(u32::from),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

/// SOF0..SOF15 minus DHT (C4), JPG (C8) and DAC (CC).
fn is_sof_marker(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn probe_jpeg(data: &[u8]) -> ProbeMetadata {
    let mut meta = ProbeMetadata::default();
    if data.get(..2) != Some(&[0xFF, 0xD8][..]) {
        return meta;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // Markers without a length field
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        // EOI or start of scan: no SOF before entropy-coded data means no dimensions
        if marker == 0xD9 || marker == 0xDA {
            break;
        }

        let Some(seg_len) = be_u16(data, pos + 2) else {
            break;
        };
        if is_sof_marker(marker) {
            // length(2) precision(1) height(2) width(2)
            meta.height = be_u16(data, pos + 5).map(u32::from);
            meta.width = be_u16(data, pos + 7).map(u32::from);
            break;
        }
        pos += 2 + seg_len as usize;
    }
    meta
}

// ---------------------------------------------------------------------------
// WebP
// ---------------------------------------------------------------------------

const VP8X_ANIMATION_FLAG: u8 = 0x02;

fn probe_webp(data: &[u8]) -> ProbeMetadata {
    let mut meta = ProbeMetadata::default();
    if data.len() < 12 || &data[..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return meta;
    }

    let mut pos = 12;
    while let Some(size) = le_u32(data, pos + 4) {
        let kind = &data[pos..pos + 4];
        let body_start = pos + 8;
        let body_end = (body_start + size as usize).min(data.len());
        let body = &data[body_start..body_end];

        match kind {
            b"VP8X" => {
                meta.is_animated_webp = body.first().is_some_and(|f| f & VP8X_ANIMATION_FLAG != 0);
                meta.width = le_u24(body, 4).map(|w| w + 1);
                meta.height = le_u24(body, 7).map(|h| h + 1);
                return meta;
            }
            b"VP8 " => {
                // frame tag(3) start code 9d 01 2a, then 14-bit width/height
                if body.get(3..6) == Some(&[0x9D, 0x01, 0x2A][..]) {
                    meta.width = le_u16(body, 6).map(|w| u32::from(w & 0x3FFF));
                    meta.height = le_u16(body, 8).map(|h| u32::from(h & 0x3FFF));
                }
                return meta;
            }
            b"VP8L" => {
                if body.first() == Some(&0x2F) {
                    if let Some(bits) = le_u32(body, 1) {
                        meta.width = Some((bits & 0x3FFF) + 1);
                        meta.height = Some(((bits >> 14) & 0x3FFF) + 1);
                    }
                }
                return meta;
            }
            _ => {}
        }

        // RIFF chunks are padded to an even length
        pos = body_start + size as usize + (size as usize & 1);
    }
    meta
}

// ---------------------------------------------------------------------------
// AVIF (ISO-BMFF / HEIF)
// ---------------------------------------------------------------------------

struct IsoBox<'a> {
    kind: [u8; 4],
    body: &'a [u8],
}

/// Iterator over sibling boxes in a byte range. Stops at the first box whose
/// declared size doesn't fit.
struct Boxes<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Boxes<'a> {
    type Item = IsoBox<'a>;

    fn next(&mut self) -> Option<IsoBox<'a>> {
        let size = be_u32(self.data, 0)? as u64;
        let kind: [u8; 4] = self.data.get(4..8)?.try_into().ok()?;
        let (header, size) = match size {
            0 => (8, self.data.len() as u64),
            1 => (16, be_u64(self.data, 8)?),
            n => (8, n),
        };
        if size < header as u64 || size > self.data.len() as u64 {
            self.data = &[];
            return None;
        }
        let size = size as usize;
        let body = &self.data[header..size];
        self.data = &self.data[size..];
        Some(IsoBox { kind, body })
    }
}

fn boxes(data: &[u8]) -> Boxes<'_> {
    Boxes { data }
}

/// Body of a full box, past its version(1) + flags(3) header.
fn full_box_payload(body: &[u8]) -> &[u8] {
    body.get(4..).unwrap_or(&[])
}

#[derive(Default)]
struct HeifMeta<'a> {
    primary_item: Option<u32>,
    item_types: Vec<(u32, [u8; 4])>,
    properties: Vec<IsoBox<'a>>,
    associations: Vec<(u32, Vec<u16>)>,
}

impl HeifMeta<'_> {
    fn primary_type(&self) -> Option<[u8; 4]> {
        let primary = self.primary_item?;
        self.item_types
            .iter()
            .find(|(id, _)| *id == primary)
            .map(|(_, t)| *t)
    }

    /// Properties associated with the primary item, or every property when
    /// the association table is missing or doesn't mention it.
    fn primary_properties(&self) -> Vec<&IsoBox<'_>> {
        let indices = self.primary_item.and_then(|primary| {
            self.associations
                .iter()
                .find(|(id, _)| *id == primary)
                .map(|(_, idx)| idx)
        });
        match indices {
            Some(indices) => indices
                .iter()
                .filter_map(|&i| (i as usize).checked_sub(1))
                .filter_map(|i| self.properties.get(i))
                .collect(),
            None => self.properties.iter().collect(),
        }
    }
}

fn probe_avif(data: &[u8]) -> ProbeMetadata {
    let mut meta = ProbeMetadata::default();
    let mut heif = HeifMeta::default();

    for top in boxes(data) {
        match &top.kind {
            b"ftyp" => {
                let major = top.body.get(..4);
                let compatible = top.body.get(8..).unwrap_or(&[]);
                meta.is_animated_avif |= major == Some(&b"avis"[..])
                    || compatible.chunks_exact(4).any(|brand| brand == b"avis");
            }
            // Image sequences carry a movie box alongside the still item
            b"moov" => meta.is_animated_avif = true,
            b"meta" => heif = parse_meta(full_box_payload(top.body)),
            _ => {}
        }
    }

    meta.is_grid_image = heif.primary_type() == Some(*b"grid");

    let mut largest_ispe: Option<(u32, u32)> = None;
    for prop in &heif.properties {
        if &prop.kind == b"ispe" {
            if let Some(dims) = parse_ispe(prop.body) {
                let area = |(w, h): (u32, u32)| u64::from(w) * u64::from(h);
                if largest_ispe.is_none_or(|l| area(dims) > area(l)) {
                    largest_ispe = Some(dims);
                }
            }
        }
    }

    let mut primary_ispe = None;
    for prop in heif.primary_properties() {
        match &prop.kind {
            b"irot" => meta.is_rotated |= prop.body.first().is_some_and(|a| a & 0x03 != 0),
            b"clap" => meta.is_cropped = true,
            b"colr" => {
                meta.has_icc_profile |= prop
                    .body
                    .get(..4)
                    .is_some_and(|kind| kind == b"prof" || kind == b"rICC");
            }
            b"ispe" => primary_ispe = primary_ispe.or(parse_ispe(prop.body)),
            _ => {}
        }
    }

    if let Some((w, h)) = primary_ispe.or(largest_ispe) {
        meta.width = Some(w);
        meta.height = Some(h);
    }
    meta
}

fn parse_ispe(body: &[u8]) -> Option<(u32, u32)> {
    let payload = full_box_payload(body);
    Some((be_u32(payload, 0)?, be_u32(payload, 4)?))
}

fn parse_meta(data: &[u8]) -> HeifMeta<'_> {
    let mut heif = HeifMeta::default();
    for child in boxes(data) {
        match &child.kind {
            b"pitm" => {
                let version = child.body.first().copied().unwrap_or(0);
                heif.primary_item = if version == 0 {
                    be_u16(child.body, 4).map(u32::from)
                } else {
                    be_u32(child.body, 4)
                };
            }
            b"iinf" => heif.item_types = parse_iinf(child.body),
            b"iprp" => {
                for prop in boxes(child.body) {
                    match &prop.kind {
                        b"ipco" => heif.properties = boxes(prop.body).collect(),
                        b"ipma" => heif.associations = parse_ipma(prop.body),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    heif
}

fn parse_iinf(body: &[u8]) -> Vec<(u32, [u8; 4])> {
    let version = body.first().copied().unwrap_or(0);
    let entries_start = if version == 0 { 6 } else { 8 };
    let Some(entries) = body.get(entries_start..) else {
        return Vec::new();
    };

    boxes(entries)
        .filter(|b| &b.kind == b"infe")
        .filter_map(|infe| {
            let version = *infe.body.first()?;
            // Only versions 2 and 3 carry an item_type
            let (id, type_pos) = match version {
                2 => (u32::from(be_u16(infe.body, 4)?), 8),
                3 => (be_u32(infe.body, 4)?, 10),
                _ => return None,
            };
            let item_type: [u8; 4] = infe.body.get(type_pos..type_pos + 4)?.try_into().ok()?;
            Some((id, item_type))
        })
        .collect()
}

fn parse_ipma(body: &[u8]) -> Vec<(u32, Vec<u16>)> {
    let version = body.first().copied().unwrap_or(0);
    let large_index = body.get(3).is_some_and(|flags| flags & 1 != 0);
    let Some(entry_count) = be_u32(body, 4) else {
        return Vec::new();
    };

    let mut pos = 8;
    let mut result = Vec::new();
    for _ in 0..entry_count {
        let item_id = if version < 1 {
            let Some(id) = be_u16(body, pos) else { break };
            pos += 2;
            u32::from(id)
        } else {
            let Some(id) = be_u32(body, pos) else { break };
            pos += 4;
            id
        };
        let Some(&count) = body.get(pos) else { break };
        pos += 1;

        let mut indices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            // High bit is the "essential" flag
            let index = if large_index {
                let Some(v) = be_u16(body, pos) else { break };
                pos += 2;
                v & 0x7FFF
            } else {
                let Some(&v) = body.get(pos) else { break };
                pos += 1;
                u16::from(v & 0x7F)
            };
            indices.push(index);
        }
        result.push((item_id, indices));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Fixture builders
    // =========================================================================

    fn png_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]); // CRC is not checked
        out
    }

    fn png_with(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        data
    }

    fn ihdr(width: u32, height: u32) -> Vec<u8> {
        let mut body = width.to_be_bytes().to_vec();
        body.extend_from_slice(&height.to_be_bytes());
        body.extend_from_slice(&[8, 6, 0, 0, 0]);
        png_chunk(b"IHDR", &body)
    }

    fn iso_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn full_box(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![version];
        payload.extend_from_slice(&flags.to_be_bytes()[1..]);
        payload.extend_from_slice(body);
        iso_box(kind, &payload)
    }

    fn ispe(width: u32, height: u32) -> Vec<u8> {
        let mut body = width.to_be_bytes().to_vec();
        body.extend_from_slice(&height.to_be_bytes());
        full_box(b"ispe", 0, 0, &body)
    }

    fn infe(id: u16, item_type: &[u8; 4]) -> Vec<u8> {
        let mut body = id.to_be_bytes().to_vec();
        body.extend_from_slice(&[0, 0]); // protection index
        body.extend_from_slice(item_type);
        body.push(0); // empty item name
        full_box(b"infe", 2, 0, &body)
    }

    /// Minimal AVIF: ftyp + meta(pitm, iinf, iprp(ipco, ipma)).
    fn avif_with(brand: &[u8; 4], primary_type: &[u8; 4], props: &[Vec<u8>]) -> Vec<u8> {
        let mut ftyp = brand.to_vec();
        ftyp.extend_from_slice(&[0, 0, 0, 0]);
        ftyp.extend_from_slice(b"mif1");

        let pitm = full_box(b"pitm", 0, 0, &1u16.to_be_bytes());

        let mut iinf_body = 1u16.to_be_bytes().to_vec();
        iinf_body.extend_from_slice(&infe(1, primary_type));
        let iinf = full_box(b"iinf", 0, 0, &iinf_body);

        let ipco = iso_box(b"ipco", &props.concat());
        let mut ipma_body = 1u32.to_be_bytes().to_vec();
        ipma_body.extend_from_slice(&1u16.to_be_bytes());
        ipma_body.push(props.len() as u8);
        for i in 1..=props.len() as u8 {
            ipma_body.push(0x80 | i);
        }
        let ipma = full_box(b"ipma", 0, 0, &ipma_body);
        let iprp = iso_box(b"iprp", &[ipco, ipma].concat());

        let meta = full_box(b"meta", 0, 0, &[pitm, iinf, iprp].concat());
        [iso_box(b"ftyp", &ftyp), meta].concat()
    }

    // =========================================================================
    // PNG
    // =========================================================================

    #[test]
    fn png_static_has_no_animation_frames() {
        let data = png_with(&[ihdr(640, 480), png_chunk(b"IDAT", &[0; 4])]);
        let meta = probe_bytes(&data, FormatExtension::Png);
        assert_eq!(meta.dimensions(), Some((640, 480)));
        assert_eq!(meta.animation_frames, None);
    }

    #[test]
    fn png_actl_reports_frame_count() {
        let mut actl = 12u32.to_be_bytes().to_vec();
        actl.extend_from_slice(&0u32.to_be_bytes());
        let data = png_with(&[ihdr(10, 10), png_chunk(b"acTL", &actl)]);
        assert_eq!(probe_bytes(&data, FormatExtension::Png).animation_frames, Some(12));
    }

    #[test]
    fn png_actl_after_idat_is_ignored() {
        let mut actl = 5u32.to_be_bytes().to_vec();
        actl.extend_from_slice(&0u32.to_be_bytes());
        let data = png_with(&[
            ihdr(10, 10),
            png_chunk(b"IDAT", &[0; 4]),
            png_chunk(b"acTL", &actl),
        ]);
        assert_eq!(probe_bytes(&data, FormatExtension::Png).animation_frames, None);
    }

    #[test]
    fn png_truncated_chunk_keeps_earlier_fields() {
        let mut data = png_with(&[ihdr(7, 9)]);
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(b"acTL");
        let meta = probe_bytes(&data, FormatExtension::Png);
        assert_eq!(meta.dimensions(), Some((7, 9)));
        assert_eq!(meta.animation_frames, None);
    }

    // =========================================================================
    // GIF / JPEG
    // =========================================================================

    #[test]
    fn gif_logical_screen_dimensions() {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&300u16.to_le_bytes());
        data.extend_from_slice(&200u16.to_le_bytes());
        assert_eq!(
            probe_bytes(&data, FormatExtension::Gif).dimensions(),
            Some((300, 200))
        );
    }

    #[test]
    fn jpeg_sof_after_app_segments() {
        let mut data = vec![0xFF, 0xD8];
        // APP0 with 14 bytes of payload
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(&[0; 14]);
        // SOF0: len, precision, height=600, width=800
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x02, 0x58, 0x03, 0x20]);
        let meta = probe_bytes(&data, FormatExtension::Jpeg);
        assert_eq!(meta.dimensions(), Some((800, 600)));
    }

    #[test]
    fn jpeg_without_sof_has_no_dimensions() {
        let data = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(probe_bytes(&data, FormatExtension::Jpeg).dimensions(), None);
    }

    #[test]
    fn real_jpeg_matches_encoder_dimensions() {
        use image::ImageEncoder;
        let img = image::RgbImage::new(37, 21);
        let mut buf = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), 37, 21, image::ExtendedColorType::Rgb8)
            .unwrap();
        assert_eq!(
            probe_bytes(&buf, FormatExtension::Jpeg).dimensions(),
            Some((37, 21))
        );
    }

    // =========================================================================
    // WebP
    // =========================================================================

    fn riff_webp(chunk: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&((body.len() + 12) as u32).to_le_bytes());
        data.extend_from_slice(b"WEBP");
        data.extend_from_slice(chunk);
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn webp_vp8x_animation_flag() {
        let mut body = vec![VP8X_ANIMATION_FLAG, 0, 0, 0];
        body.extend_from_slice(&[99, 0, 0]); // width - 1
        body.extend_from_slice(&[49, 0, 0]); // height - 1
        let meta = probe_bytes(&riff_webp(b"VP8X", &body), FormatExtension::Webp);
        assert!(meta.is_animated_webp);
        assert_eq!(meta.dimensions(), Some((100, 50)));
    }

    #[test]
    fn webp_vp8x_still() {
        let body = [0x10, 0, 0, 0, 9, 0, 0, 9, 0, 0];
        let meta = probe_bytes(&riff_webp(b"VP8X", &body), FormatExtension::Webp);
        assert!(!meta.is_animated_webp);
        assert_eq!(meta.dimensions(), Some((10, 10)));
    }

    #[test]
    fn webp_lossless_header() {
        let bits: u32 = (64 - 1) | ((32 - 1) << 14);
        let mut body = vec![0x2F];
        body.extend_from_slice(&bits.to_le_bytes());
        let meta = probe_bytes(&riff_webp(b"VP8L", &body), FormatExtension::Webp);
        assert_eq!(meta.dimensions(), Some((64, 32)));
        assert!(!meta.is_animated_webp);
    }

    // =========================================================================
    // AVIF
    // =========================================================================

    #[test]
    fn avif_plain_still_image() {
        let data = avif_with(b"avif", b"av01", &[ispe(1920, 1080)]);
        let meta = probe_bytes(&data, FormatExtension::Avif);
        assert_eq!(meta.dimensions(), Some((1920, 1080)));
        assert!(!meta.is_rotated);
        assert!(!meta.is_cropped);
        assert!(!meta.is_grid_image);
        assert!(!meta.is_animated_avif);
    }

    #[test]
    fn avif_rotation_property() {
        let irot = iso_box(b"irot", &[1]);
        let data = avif_with(b"avif", b"av01", &[ispe(10, 20), irot]);
        assert!(probe_bytes(&data, FormatExtension::Avif).is_rotated);
    }

    #[test]
    fn avif_zero_rotation_is_not_rotated() {
        let irot = iso_box(b"irot", &[0]);
        let data = avif_with(b"avif", b"av01", &[ispe(10, 20), irot]);
        assert!(!probe_bytes(&data, FormatExtension::Avif).is_rotated);
    }

    #[test]
    fn avif_clean_aperture_marks_cropped() {
        let clap = iso_box(b"clap", &[0; 32]);
        let data = avif_with(b"avif", b"av01", &[ispe(10, 20), clap]);
        assert!(probe_bytes(&data, FormatExtension::Avif).is_cropped);
    }

    #[test]
    fn avif_icc_colour_property() {
        let mut body = b"prof".to_vec();
        body.extend_from_slice(&[0; 16]);
        let colr = iso_box(b"colr", &body);
        let data = avif_with(b"avif", b"av01", &[ispe(10, 20), colr]);
        assert!(probe_bytes(&data, FormatExtension::Avif).has_icc_profile);
    }

    #[test]
    fn avif_nclx_colour_is_not_a_profile() {
        let colr = iso_box(b"colr", b"nclx\x00\x01\x00\x0d\x00\x06\x80");
        let data = avif_with(b"avif", b"av01", &[ispe(10, 20), colr]);
        assert!(!probe_bytes(&data, FormatExtension::Avif).has_icc_profile);
    }

    #[test]
    fn avif_grid_primary_item() {
        let data = avif_with(b"avif", b"grid", &[ispe(4096, 4096)]);
        let meta = probe_bytes(&data, FormatExtension::Avif);
        assert!(meta.is_grid_image);
        assert_eq!(meta.dimensions(), Some((4096, 4096)));
    }

    #[test]
    fn avif_sequence_brand() {
        let data = avif_with(b"avis", b"av01", &[ispe(10, 10)]);
        assert!(probe_bytes(&data, FormatExtension::Avif).is_animated_avif);
    }

    #[test]
    fn avif_mirror_is_not_detected() {
        let imir = iso_box(b"imir", &[1]);
        let data = avif_with(b"avif", b"av01", &[ispe(10, 10), imir]);
        let meta = probe_bytes(&data, FormatExtension::Avif);
        assert!(!meta.is_rotated && !meta.is_cropped);
    }

    #[test]
    fn avif_garbage_yields_defaults() {
        let meta = probe_bytes(&[0xFF; 64], FormatExtension::Avif);
        assert_eq!(meta, ProbeMetadata::default());
    }

    #[test]
    fn unreadable_file_yields_defaults() {
        let meta = probe(Path::new("/nonexistent/file.png"), FormatExtension::Png);
        assert_eq!(meta, ProbeMetadata::default());
    }
}
