//! Pure pixel-format conversion from raw capture buffers to RGB.
//!
//! Every path is total: input that is too short, oddly sized or in an
//! encoding we do not know falls back to a grayscale rendering of the
//! first plane, so each dequeued buffer yields a displayable image of
//! exactly `width * height * 3` bytes.

use crate::format::PixelEncoding;
use crate::frame::RgbFrame;

/// Integer YUV to RGB transform with saturation.
///
/// R = (298c + 409e + 128) >> 8
/// G = (298c - 100d - 208e + 128) >> 8
/// B = (298c + 516d + 128) >> 8
/// with c = Y - 16, d = U - 128, e = V - 128.
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;
    (clamp255(r), clamp255(g), clamp255(b))
}

#[inline]
fn clamp255(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Decode one captured buffer into an RGB frame.
///
/// `planes` holds the mapped plane contents for the buffer: a single
/// slice for single-plane sessions, one slice per plane for
/// multi-planar sessions. For a single-plane semi-planar buffer the
/// chroma plane starts `width * height` bytes in.
pub fn decode(
    encoding: PixelEncoding,
    planes: &[&[u8]],
    width: u32,
    height: u32,
) -> RgbFrame {
    let w = width as usize;
    let h = height as usize;
    let luma_len = w * h;
    let first = planes.first().copied().unwrap_or(&[]);

    let data = match encoding {
        PixelEncoding::Nv12 | PixelEncoding::Nv21 => {
            let swap_uv = encoding == PixelEncoding::Nv21;
            let (luma, chroma) = if planes.len() >= 2 {
                (first, planes[1])
            } else if first.len() >= luma_len {
                first.split_at(luma_len)
            } else {
                (first, &[][..])
            };
            // Shared chroma rows: ceil(h / 2) full-width rows of pairs.
            // Each pair spans two columns, so decode needs an even
            // width just like the packed orders.
            let chroma_len = w * ((h + 1) / 2);
            if w % 2 == 0 && luma.len() >= luma_len && chroma.len() >= chroma_len {
                decode_semi_planar(luma, chroma, w, h, swap_uv)
            } else {
                decode_grayscale(luma, w, h)
            }
        }
        PixelEncoding::Uyvy | PixelEncoding::Yuyv => {
            let luma_first = encoding == PixelEncoding::Yuyv;
            if w % 2 == 0 && first.len() >= w * h * 2 {
                decode_packed(first, w, h, luma_first)
            } else {
                decode_grayscale(first, w, h)
            }
        }
        PixelEncoding::Unknown(_) => decode_grayscale(first, w, h),
    };

    RgbFrame::new(width, height, data)
}

/// NV12/NV21: full-resolution luma plus half-height interleaved
/// chroma; one chroma pair covers a 2x2 luma block.
fn decode_semi_planar(luma: &[u8], chroma: &[u8], w: usize, h: usize, swap_uv: bool) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let y_row = row * w;
        let uv_row = (row / 2) * w;
        for col in 0..w {
            let y = luma[y_row + col];
            let uv_index = uv_row + (col & !1);
            let (u, v) = if swap_uv {
                (chroma[uv_index + 1], chroma[uv_index])
            } else {
                (chroma[uv_index], chroma[uv_index + 1])
            };
            let (r, g, b) = yuv_to_rgb(y, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

/// UYVY/YUYV: 4-byte groups encode 2 horizontal pixels with distinct
/// luma and one shared chroma pair.
fn decode_packed(data: &[u8], w: usize, h: usize, luma_first: bool) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_bytes = &data[row * w * 2..(row + 1) * w * 2];
        for group in row_bytes.chunks_exact(4) {
            let (y0, u, y1, v) = if luma_first {
                (group[0], group[1], group[2], group[3])
            } else {
                (group[1], group[0], group[3], group[2])
            };
            let (r, g, b) = yuv_to_rgb(y0, u, v);
            rgb.extend_from_slice(&[r, g, b]);
            let (r, g, b) = yuv_to_rgb(y1, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

/// Fallback: replicate the first plane's bytes into all three
/// channels. Missing bytes render black.
fn decode_grayscale(luma: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(w * h * 3);
    for idx in 0..w * h {
        let y = luma.get(idx).copied().unwrap_or(0);
        rgb.extend_from_slice(&[y, y, y]);
    }
    rgb
}
