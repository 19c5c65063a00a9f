//! Direct-color bit packing per pixel format.
//!
//! Converts between the canonical RGBA8 working form and each platform's
//! packed texel layout. Indexed formats are handled by the palettizer and
//! the YIQ format by its own table quantizer; both are rejected here.
//!
//! 16-bit layouts, low bit to high bit:
//! ```text
//! GS 16      [r:5][g:5][b:5][a:1]
//! R5G6B5     [b:5][g:6][r:5]
//! A1R5G5B5   [b:5][g:5][r:5][a:1]
//! A4R4G4B4   [b:4][g:4][r:4][a:4]
//! GC RGB5A3  a set: [b:5][g:5][r:5][1]; a clear: [b:4][g:4][r:4][a:3][0]
//! GC IA8     [i:8][a:8]
//! ```

use super::format::PixelFormat;
use super::palette::{alpha_from_half_range, alpha_to_half_range};
use crate::error::{CodecError, Result};

/// Pack RGBA8 pixels into `format`'s texel layout.
pub fn pack_direct(rgba: &[u8], format: PixelFormat) -> Result<Vec<u8>> {
    use PixelFormat::*;
    debug_assert!(rgba.len() % 4 == 0);
    let px = rgba.chunks_exact(4);
    let out = match format {
        Rgba8888 => rgba.to_vec(),
        Rgb888 => px.flat_map(|p| [p[0], p[1], p[2]]).collect(),
        // GS stores alpha in the 0x80-centered range
        Psmct32 => px
            .flat_map(|p| [p[0], p[1], p[2], alpha_to_half_range(p[3])])
            .collect(),
        Psmct24 => px.flat_map(|p| [p[0], p[1], p[2], 0]).collect(),
        Psmct16 | Psmct16s => words(px, |p| {
            let a = (p[3] >= 128) as u16;
            c5(p[0]) | c5(p[1]) << 5 | c5(p[2]) << 10 | a << 15
        }),
        XboxA8R8G8B8 => px.flat_map(|p| [p[2], p[1], p[0], p[3]]).collect(),
        XboxX8R8G8B8 => px.flat_map(|p| [p[2], p[1], p[0], 0xFF]).collect(),
        XboxR5G6B5 | GcRgb565 | DcRgb565 => {
            words(px, |p| c5(p[2]) | c6(p[1]) << 5 | c5(p[0]) << 11)
        }
        XboxA1R5G5B5 | DcArgb1555 => words(px, |p| {
            let a = (p[3] >= 128) as u16;
            c5(p[2]) | c5(p[1]) << 5 | c5(p[0]) << 10 | a << 15
        }),
        XboxA4R4G4B4 | DcArgb4444 => words(px, |p| {
            c4(p[2]) | c4(p[1]) << 4 | c4(p[0]) << 8 | c4(p[3]) << 12
        }),
        GcRgba8 => rgba.to_vec(),
        GcRgb5A3 => words(px, |p| {
            if p[3] >= 0xE0 {
                c5(p[2]) | c5(p[1]) << 5 | c5(p[0]) << 10 | 0x8000
            } else {
                c4(p[2]) | c4(p[1]) << 4 | c4(p[0]) << 8 | (p[3] >> 5) as u16 * 0x1000
            }
        }),
        GcI8 => px.map(luma).collect(),
        GcI4 => nibble_pairs(px.map(|p| luma(p) >> 4).collect()),
        GcIa4 => px.map(|p| luma(p) >> 4 | (p[3] & 0xF0)).collect(),
        GcIa8 => words(px, |p| luma(p) as u16 | (p[3] as u16) << 8),
        _ => {
            return Err(CodecError::format(format!(
                "{format} is not a direct-color layout"
            )));
        }
    };
    Ok(out)
}

/// Unpack `pixel_count` texels of `format` back to RGBA8.
pub fn unpack_direct(data: &[u8], format: PixelFormat, pixel_count: usize) -> Result<Vec<u8>> {
    use PixelFormat::*;
    let needed = (pixel_count * format.bits_per_pixel()).div_ceil(8);
    if data.len() < needed {
        return Err(CodecError::truncated(needed, data.len()));
    }
    let data = &data[..needed];
    let out: Vec<u8> = match format {
        Rgba8888 | GcRgba8 => data.to_vec(),
        Rgb888 => data
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Psmct32 => data
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2], alpha_from_half_range(p[3])])
            .collect(),
        Psmct24 => data
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Psmct16 | Psmct16s => unwords(data, |w| {
            [
                x5(w), x5(w >> 5), x5(w >> 10),
                if w & 0x8000 != 0 { 255 } else { 0 },
            ]
        }),
        XboxA8R8G8B8 => data
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
        XboxX8R8G8B8 => data
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], 255])
            .collect(),
        XboxR5G6B5 | GcRgb565 | DcRgb565 => {
            unwords(data, |w| [x5(w >> 11), x6(w >> 5), x5(w), 255])
        }
        XboxA1R5G5B5 | DcArgb1555 => unwords(data, |w| {
            [
                x5(w >> 10), x5(w >> 5), x5(w),
                if w & 0x8000 != 0 { 255 } else { 0 },
            ]
        }),
        XboxA4R4G4B4 | DcArgb4444 => unwords(data, |w| {
            [x4(w >> 8), x4(w >> 4), x4(w), x4(w >> 12)]
        }),
        GcRgb5A3 => unwords(data, |w| {
            if w & 0x8000 != 0 {
                [x5(w >> 10), x5(w >> 5), x5(w), 255]
            } else {
                [x4(w >> 8), x4(w >> 4), x4(w), x3(w >> 12)]
            }
        }),
        GcI8 => data.iter().flat_map(|&i| [i, i, i, 255]).collect(),
        GcI4 => {
            let mut out = Vec::with_capacity(pixel_count * 4);
            for &b in data {
                for nib in [b & 0xF, b >> 4] {
                    let i = nib << 4 | nib;
                    out.extend_from_slice(&[i, i, i, 255]);
                }
            }
            out.truncate(pixel_count * 4);
            out
        }
        GcIa4 => data
            .iter()
            .flat_map(|&b| {
                let i = (b & 0xF) << 4 | (b & 0xF);
                let a = (b & 0xF0) | b >> 4;
                [i, i, i, a]
            })
            .collect(),
        GcIa8 => unwords(data, |w| {
            let i = w as u8;
            [i, i, i, (w >> 8) as u8]
        }),
        _ => {
            return Err(CodecError::format(format!(
                "{format} is not a direct-color layout"
            )));
        }
    };
    Ok(out)
}

fn words<'a>(px: impl Iterator<Item = &'a [u8]>, f: impl Fn(&[u8]) -> u16) -> Vec<u8> {
    px.flat_map(|p| f(p).to_le_bytes()).collect()
}

fn unwords(data: &[u8], f: impl Fn(u16) -> [u8; 4]) -> Vec<u8> {
    data.chunks_exact(2)
        .flat_map(|b| f(u16::from_le_bytes([b[0], b[1]])))
        .collect()
}

fn nibble_pairs(nibbles: Vec<u8>) -> Vec<u8> {
    nibbles
        .chunks(2)
        .map(|pair| pair[0] | pair.get(1).copied().unwrap_or(0) << 4)
        .collect()
}

fn luma(p: &[u8]) -> u8 {
    ((p[0] as u32 * 77 + p[1] as u32 * 151 + p[2] as u32 * 28) >> 8) as u8
}

#[inline]
fn c5(v: u8) -> u16 {
    (v >> 3) as u16
}
#[inline]
fn c6(v: u8) -> u16 {
    (v >> 2) as u16
}
#[inline]
fn c4(v: u8) -> u16 {
    (v >> 4) as u16
}
#[inline]
fn x5(w: u16) -> u8 {
    let v = (w & 0x1F) as u8;
    v << 3 | v >> 2
}
#[inline]
fn x6(w: u16) -> u8 {
    let v = (w & 0x3F) as u8;
    v << 2 | v >> 4
}
#[inline]
fn x4(w: u16) -> u8 {
    let v = (w & 0xF) as u8;
    v << 4 | v
}
#[inline]
fn x3(w: u16) -> u8 {
    let v = (w & 0x7) as u8;
    v << 5 | v << 2 | v >> 1
}
